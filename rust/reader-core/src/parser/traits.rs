// rust/reader-core/src/parser/traits.rs

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::SampleBatch;
use crate::error::{ReaderError, Result};

/// The supported sparse text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileFormat {
    LibSvm,
    LibFfm,
    Csv,
}

impl FileFormat {
    pub const ALL: [FileFormat; 3] = [FileFormat::LibSvm, FileFormat::LibFfm, FileFormat::Csv];

    pub fn name(&self) -> &'static str {
        match self {
            FileFormat::LibSvm => "libsvm",
            FileFormat::LibFfm => "libffm",
            FileFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Turns a block of raw text into sparse rows.
///
/// A block always holds whole lines; the on-disk reader cuts blocks at line
/// breaks before handing them over.
pub trait FormatParser: Send + Sync {
    /// Which encoding this parser reads.
    fn format(&self) -> FileFormat;

    /// Whether parsed rows carry a leading label.
    fn has_label(&self) -> bool;

    /// Appends one row per non-blank line of `block` to `out`.
    ///
    /// Returns the number of rows appended.
    ///
    /// # Errors
    ///
    /// Returns a parse error naming the 1-based line within the block if a
    /// line is not valid for this encoding, or if the block is not UTF-8.
    fn parse(&self, block: &[u8], out: &mut SampleBatch) -> Result<usize>;
}

/// Calls `f` with every non-blank line of `block` and its 1-based line number.
///
/// Handles both `\n` and `\r\n` line endings.
pub(crate) fn for_each_line<F>(format: FileFormat, block: &[u8], mut f: F) -> Result<usize>
where
    F: FnMut(usize, &str) -> Result<()>,
{
    let text = std::str::from_utf8(block).map_err(|e| {
        let line = block[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count() + 1;
        ReaderError::parse(format.name(), line, "invalid UTF-8")
    })?;

    let mut rows = 0;
    for (i, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line).trim();
        if line.is_empty() {
            continue;
        }
        f(i + 1, line)?;
        rows += 1;
    }

    Ok(rows)
}

pub(crate) fn parse_label(format: FileFormat, line: usize, token: &str) -> Result<f32> {
    token.parse::<f32>().map_err(|_| {
        ReaderError::parse(format.name(), line, format!("invalid label '{token}'"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() {
        assert_eq!(FileFormat::LibSvm.name(), "libsvm");
        assert_eq!(FileFormat::LibFfm.name(), "libffm");
        assert_eq!(FileFormat::Csv.to_string(), "csv");
    }

    #[test]
    fn test_for_each_line_skips_blank_and_crlf() {
        let mut seen = vec![];
        let rows = for_each_line(FileFormat::LibSvm, b"a\r\n\n  \nb\n", |n, l| {
            seen.push((n, l.to_string()));
            Ok(())
        })
        .unwrap();

        assert_eq!(rows, 2);
        assert_eq!(seen, vec![(1, "a".to_string()), (4, "b".to_string())]);
    }

    #[test]
    fn test_for_each_line_without_trailing_newline() {
        let rows = for_each_line(FileFormat::Csv, b"1,2\n3,4", |_, _| Ok(())).unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_for_each_line_invalid_utf8() {
        let err = for_each_line(FileFormat::LibSvm, b"ok\n\xff\xfe\n", |_, _| Ok(())).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
