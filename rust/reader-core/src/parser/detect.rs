// rust/reader-core/src/parser/detect.rs

//! Source format sniffing.
//!
//! Only a bounded prefix of the file is read. The first non-blank line is
//! classified by its delimiters and by how many `:` separators its feature
//! tokens carry.

use std::path::Path;

use crate::config::DetectConfig;
use crate::error::{ReaderError, Result};
use crate::storage::StorageBackend;

use super::traits::FileFormat;

/// Result of sniffing a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    pub format: FileFormat,
    pub has_label: bool,
}

/// Reads the head of `path` and classifies its encoding.
///
/// # Errors
///
/// Returns a storage error if the file cannot be opened or read, and an
/// unknown-format error if it is empty or matches none of the encodings.
pub fn detect_format(
    storage: &dyn StorageBackend,
    path: &Path,
    config: &DetectConfig,
) -> Result<FormatInfo> {
    let mut reader = storage.open_read(path)?;
    let prefix = reader.read_range(0, config.prefix_bytes)?;
    let truncated = prefix.len() == config.prefix_bytes && (reader.size() as usize) > prefix.len();

    classify(&prefix, truncated, config.csv_has_label)
        .map_err(|message| ReaderError::unknown_format(path, message))
}

/// Classifies the first non-blank line of `prefix`.
///
/// `truncated` means the prefix was cut by the read limit, so a line without
/// a terminating newline may end in a partial token.
pub fn classify(
    prefix: &[u8],
    truncated: bool,
    csv_has_label: bool,
) -> std::result::Result<FormatInfo, String> {
    let text = match std::str::from_utf8(prefix) {
        Ok(text) => text,
        // A multi-byte character may straddle the prefix boundary
        Err(e) if truncated && e.error_len().is_none() => {
            std::str::from_utf8(&prefix[..e.valid_up_to()]).unwrap_or_default()
        }
        Err(_) => return Err("source is not valid UTF-8 text".to_string()),
    };

    let mut lines = text.split('\n').peekable();
    let line = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => continue,
            Some(line) => {
                let complete = lines.peek().is_some() || !truncated;
                break (line.trim(), complete);
            }
            None => return Err("source contains no records".to_string()),
        }
    };
    let (line, complete) = line;

    if line.contains(',') && !line.contains(':') {
        return Ok(FormatInfo {
            format: FileFormat::Csv,
            has_label: csv_has_label,
        });
    }

    let mut tokens: Vec<&str> = line.split_whitespace().collect();
    if !complete && tokens.len() > 1 {
        tokens.pop();
    }

    let has_label = tokens.first().map_or(false, |t| !t.contains(':'));

    let mut colons = None;
    for token in tokens.iter().filter(|t| t.contains(':')) {
        let count = token.matches(':').count();
        match colons {
            None => colons = Some(count),
            Some(seen) if seen != count => {
                return Err(format!("mixed feature token shapes in first record: '{line}'"));
            }
            Some(_) => {}
        }
    }

    let format = match colons {
        Some(1) => FileFormat::LibSvm,
        Some(2) => FileFormat::LibFfm,
        Some(n) => return Err(format!("feature tokens with {n} ':' separators")),
        None => return Err(format!("no feature tokens in first record: '{line}'")),
    };

    Ok(FormatInfo { format, has_label })
}
