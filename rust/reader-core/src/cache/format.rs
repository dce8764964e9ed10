// rust/reader-core/src/cache/format.rs

use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

use crate::error::Result;
use crate::parser::FileFormat;
use crate::storage::StorageBackend;

/// Identity of a source file at the time its cache was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    /// Source size in bytes.
    pub size: u64,
    /// Modification time in nanoseconds since the Unix epoch, if known.
    pub modified_nanos: Option<u64>,
    /// XXHash64 of the leading bytes of the source.
    pub prefix_hash: u64,
}

impl SourceFingerprint {
    /// Fingerprints `path`, hashing at most `prefix_bytes` leading bytes.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the source cannot be inspected.
    pub fn compute(
        storage: &dyn StorageBackend,
        path: &Path,
        prefix_bytes: usize,
    ) -> Result<Self> {
        let meta = storage.metadata(path)?;
        let modified_nanos = meta
            .modified
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64);

        let mut reader = storage.open_read(path)?;
        let prefix = reader.read_range(0, prefix_bytes)?;

        Ok(Self {
            size: meta.size,
            modified_nanos,
            prefix_hash: checksum(&prefix),
        })
    }
}

/// Header of a cache file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheHeader {
    /// Magic bytes identifying a row cache ("SPRC")
    pub magic: [u8; 4],
    pub version: u32,
    /// Encoding of the source the rows were parsed from
    pub format: FileFormat,
    pub has_label: bool,
    pub row_count: u64,
    /// Length of the bincode payload following the header
    pub payload_len: u64,
    /// XXHash64 of the payload
    pub checksum: u64,
    pub source: SourceFingerprint,
}

impl CacheHeader {
    pub const MAGIC: [u8; 4] = *b"SPRC";

    pub const VERSION: u32 = 1;

    pub fn new(
        format: FileFormat,
        has_label: bool,
        row_count: u64,
        payload: &[u8],
        source: SourceFingerprint,
    ) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            format,
            has_label,
            row_count,
            payload_len: payload.len() as u64,
            checksum: checksum(payload),
            source,
        }
    }

    pub fn validate_magic(&self) -> bool {
        self.magic == Self::MAGIC
    }

    pub fn validate_version(&self) -> bool {
        self.version == Self::VERSION
    }
}

/// Location of the cache for `source`: the source path plus `.{extension}`.
pub fn cache_path(source: &Path, extension: &str) -> PathBuf {
    let mut name = source.as_os_str().to_owned();
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

/// XXHash64 with seed 0.
pub(crate) fn checksum(data: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(data);
    hasher.finish()
}
