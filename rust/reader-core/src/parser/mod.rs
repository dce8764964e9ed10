// rust/reader-core/src/parser/mod.rs

//! Text-format parsing for sparse training data.
//!
//! Three encodings are supported, each behind the [`FormatParser`] trait:
//!
//! ```text
//! libsvm:  <label> <index>:<value> <index>:<value> ...
//! libffm:  <label> <field>:<index>:<value> ...
//! csv:     <label>,<value>,<value>,...
//! ```
//!
//! The label is optional for libsvm and libffm and is detected from the
//! first record; CSV label presence comes from configuration. Parsers are
//! created through an explicit [`ParserRegistry`] that is built once and
//! handed to the readers.
//!
//! # Example
//!
//! ```ignore
//! use reader_core::parser::{detect_format, ParserRegistry};
//!
//! let info = detect_format(&storage, Path::new("train.ffm"), &config.detect)?;
//! let parser = ParserRegistry::default().create(info.format, info.has_label)?;
//!
//! let mut batch = SampleBatch::new(info.has_label);
//! parser.parse(b"1 0:3:0.5 1:9:1\n", &mut batch)?;
//! ```

mod detect;
mod formats;
mod registry;
mod traits;

pub use detect::{classify, detect_format, FormatInfo};
pub use formats::{CsvParser, LibFfmParser, LibSvmParser};
pub use registry::{ParserFactory, ParserRegistry};
pub use traits::{FileFormat, FormatParser};
