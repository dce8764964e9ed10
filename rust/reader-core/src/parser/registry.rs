// rust/reader-core/src/parser/registry.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ReaderError, Result};

use super::formats::{CsvParser, LibFfmParser, LibSvmParser};
use super::traits::{FileFormat, FormatParser};

/// Builds a parser for a source, given whether its rows carry a label.
pub type ParserFactory = Arc<dyn Fn(bool) -> Arc<dyn FormatParser> + Send + Sync>;

/// Explicit mapping from file format to parser factory.
///
/// Built once at startup and shared with readers as `Arc<ParserRegistry>`.
/// `ParserRegistry::default()` knows all three built-in encodings; a custom
/// factory can replace any of them.
#[derive(Clone)]
pub struct ParserRegistry {
    factories: HashMap<FileFormat, ParserFactory>,
}

impl ParserRegistry {
    /// Creates a registry with no formats registered.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers (or replaces) the factory for `format`.
    pub fn register(&mut self, format: FileFormat, factory: ParserFactory) -> &mut Self {
        self.factories.insert(format, factory);
        self
    }

    pub fn contains(&self, format: FileFormat) -> bool {
        self.factories.contains_key(&format)
    }

    /// Creates a parser for `format`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no factory is registered for `format`.
    pub fn create(&self, format: FileFormat, has_label: bool) -> Result<Arc<dyn FormatParser>> {
        let factory = self.factories.get(&format).ok_or_else(|| {
            ReaderError::config(format!("no parser registered for format '{format}'"))
        })?;
        Ok(factory(has_label))
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register(
                FileFormat::LibSvm,
                Arc::new(|has_label| Arc::new(LibSvmParser::new(has_label)) as Arc<dyn FormatParser>),
            )
            .register(
                FileFormat::LibFfm,
                Arc::new(|has_label| Arc::new(LibFfmParser::new(has_label)) as Arc<dyn FormatParser>),
            )
            .register(
                FileFormat::Csv,
                Arc::new(|has_label| Arc::new(CsvParser::new(has_label)) as Arc<dyn FormatParser>),
            );
        registry
    }
}

impl fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut formats: Vec<_> = self.factories.keys().map(FileFormat::name).collect();
        formats.sort_unstable();
        f.debug_struct("ParserRegistry")
            .field("formats", &formats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SampleBatch;

    #[test]
    fn test_default_registers_all_formats() {
        let registry = ParserRegistry::default();
        for format in FileFormat::ALL {
            assert!(registry.contains(format));
            let parser = registry.create(format, true).unwrap();
            assert_eq!(parser.format(), format);
            assert!(parser.has_label());
        }
    }

    #[test]
    fn test_empty_registry_rejects() {
        let registry = ParserRegistry::empty();
        let err = registry.create(FileFormat::LibSvm, true).err().unwrap();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("libsvm"));
    }

    #[test]
    fn test_register_overrides() {
        struct Uppercase;

        impl FormatParser for Uppercase {
            fn format(&self) -> FileFormat {
                FileFormat::Csv
            }
            fn has_label(&self) -> bool {
                false
            }
            fn parse(&self, _block: &[u8], out: &mut SampleBatch) -> Result<usize> {
                out.push(Default::default());
                Ok(1)
            }
        }

        let mut registry = ParserRegistry::default();
        registry.register(FileFormat::Csv, Arc::new(|_| Arc::new(Uppercase) as Arc<dyn FormatParser>));

        let parser = registry.create(FileFormat::Csv, true).unwrap();
        assert!(!parser.has_label());

        let mut batch = SampleBatch::new(false);
        assert_eq!(parser.parse(b"anything", &mut batch).unwrap(), 1);
    }

    #[test]
    fn test_debug_lists_formats() {
        let text = format!("{:?}", ParserRegistry::default());
        assert!(text.contains("csv"));
        assert!(text.contains("libffm"));
        assert!(text.contains("libsvm"));
    }
}
