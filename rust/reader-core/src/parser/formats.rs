// rust/reader-core/src/parser/formats.rs

use crate::data::{Feature, SampleBatch, SparseRow};
use crate::error::{ReaderError, Result};

use super::traits::{for_each_line, parse_label, FileFormat, FormatParser};

/// libsvm rows: `[label] index:value ...`
#[derive(Debug, Clone)]
pub struct LibSvmParser {
    pub has_label: bool,
}

impl LibSvmParser {
    pub fn new(has_label: bool) -> Self {
        Self { has_label }
    }
}

impl FormatParser for LibSvmParser {
    fn format(&self) -> FileFormat {
        FileFormat::LibSvm
    }

    fn has_label(&self) -> bool {
        self.has_label
    }

    fn parse(&self, block: &[u8], out: &mut SampleBatch) -> Result<usize> {
        let format = self.format();
        for_each_line(format, block, |line, text| {
            let mut tokens = text.split_whitespace();
            let mut row = SparseRow::new(None);

            if self.has_label {
                // for_each_line never yields blank lines
                let token = tokens.next().unwrap_or_default();
                row.label = Some(parse_label(format, line, token)?);
            }

            for token in tokens {
                let (index, value) = token
                    .split_once(':')
                    .ok_or_else(|| bad_token(format, line, token))?;
                row.push(Feature::new(
                    0,
                    parse_index(format, line, token, index)?,
                    parse_value(format, line, token, value)?,
                ));
            }

            out.push(row);
            Ok(())
        })
    }
}

/// libffm rows: `[label] field:index:value ...`
#[derive(Debug, Clone)]
pub struct LibFfmParser {
    pub has_label: bool,
}

impl LibFfmParser {
    pub fn new(has_label: bool) -> Self {
        Self { has_label }
    }
}

impl FormatParser for LibFfmParser {
    fn format(&self) -> FileFormat {
        FileFormat::LibFfm
    }

    fn has_label(&self) -> bool {
        self.has_label
    }

    fn parse(&self, block: &[u8], out: &mut SampleBatch) -> Result<usize> {
        let format = self.format();
        for_each_line(format, block, |line, text| {
            let mut tokens = text.split_whitespace();
            let mut row = SparseRow::new(None);

            if self.has_label {
                let token = tokens.next().unwrap_or_default();
                row.label = Some(parse_label(format, line, token)?);
            }

            for token in tokens {
                let mut parts = token.splitn(3, ':');
                let (field, index, value) = match (parts.next(), parts.next(), parts.next()) {
                    (Some(f), Some(i), Some(v)) => (f, i, v),
                    _ => return Err(bad_token(format, line, token)),
                };
                row.push(Feature::new(
                    parse_index(format, line, token, field)?,
                    parse_index(format, line, token, index)?,
                    parse_value(format, line, token, value)?,
                ));
            }

            out.push(row);
            Ok(())
        })
    }
}

/// Dense comma-separated rows: `[label],value,value,...`
///
/// Column `j` after the label becomes feature index `j` in field 0. Zero
/// cells are dropped so rows stay sparse.
#[derive(Debug, Clone)]
pub struct CsvParser {
    pub has_label: bool,
}

impl CsvParser {
    pub fn new(has_label: bool) -> Self {
        Self { has_label }
    }
}

impl FormatParser for CsvParser {
    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }

    fn has_label(&self) -> bool {
        self.has_label
    }

    fn parse(&self, block: &[u8], out: &mut SampleBatch) -> Result<usize> {
        let format = self.format();
        for_each_line(format, block, |line, text| {
            let mut cells = text.split(',').map(str::trim);
            let mut row = SparseRow::new(None);

            if self.has_label {
                let cell = cells.next().unwrap_or_default();
                row.label = Some(parse_label(format, line, cell)?);
            }

            for (column, cell) in cells.enumerate() {
                let value = parse_value(format, line, cell, cell)?;
                if value != 0.0 {
                    row.push(Feature::new(0, column as u32, value));
                }
            }

            out.push(row);
            Ok(())
        })
    }
}

fn bad_token(format: FileFormat, line: usize, token: &str) -> ReaderError {
    ReaderError::parse(format.name(), line, format!("malformed feature '{token}'"))
}

fn parse_index(format: FileFormat, line: usize, token: &str, part: &str) -> Result<u32> {
    part.parse::<u32>().map_err(|_| {
        ReaderError::parse(format.name(), line, format!("invalid index in '{token}'"))
    })
}

fn parse_value(format: FileFormat, line: usize, token: &str, part: &str) -> Result<f32> {
    part.parse::<f32>().map_err(|_| {
        ReaderError::parse(format.name(), line, format!("invalid value in '{token}'"))
    })
}
