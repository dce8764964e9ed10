// rust/reader-core/src/cache/reader.rs

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::config::CacheConfig;
use crate::data::SparseRow;
use crate::error::{ReaderError, Result};
use crate::parser::FileFormat;
use crate::storage::StorageBackend;

use super::format::{cache_path, checksum, CacheHeader, SourceFingerprint};

/// Rows restored from a valid cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedRows {
    pub format: FileFormat,
    pub has_label: bool,
    pub rows: Vec<SparseRow>,
}

/// Loads and verifies cache files.
///
/// Every failure is reported as a [`ReaderError::Cache`]; callers treat any
/// error from [`CacheReader::load`] as a cache miss.
pub struct CacheReader {
    storage: Arc<dyn StorageBackend>,
    config: CacheConfig,
}

impl CacheReader {
    pub fn new(storage: Arc<dyn StorageBackend>, config: CacheConfig) -> Self {
        Self { storage, config }
    }

    /// Loads the cache of `source` if it matches `fingerprint`.
    ///
    /// # Errors
    ///
    /// Returns a cache error if:
    /// - No cache file exists or it cannot be read
    /// - The header is truncated, has the wrong magic bytes or version
    /// - The source fingerprint differs (stale cache)
    /// - The payload length, checksum or row count disagree with the header
    pub fn load(&self, source: &Path, fingerprint: &SourceFingerprint) -> Result<CachedRows> {
        let path = cache_path(source, &self.config.extension);
        if !self.storage.exists(&path)? {
            return Err(ReaderError::cache(format!("no cache at {}", path.display())));
        }

        let mut reader = self
            .storage
            .open_read(&path)
            .map_err(|e| ReaderError::cache_with_source("failed to open cache", e))?;
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| ReaderError::cache_with_source("failed to read cache", e))?;

        let (header, payload) = split(&data)?;

        if header.source != *fingerprint {
            return Err(ReaderError::cache("cache is stale for the current source"));
        }

        if payload.len() as u64 != header.payload_len {
            return Err(ReaderError::cache(format!(
                "payload truncated: expected {} bytes, got {}",
                header.payload_len,
                payload.len()
            )));
        }

        let computed = checksum(payload);
        if computed != header.checksum {
            return Err(ReaderError::cache(format!(
                "checksum mismatch: expected {}, got {}",
                header.checksum, computed
            )));
        }

        let rows: Vec<SparseRow> = bincode::deserialize(payload)
            .map_err(|e| ReaderError::cache(format!("failed to decode rows: {e}")))?;

        if rows.len() as u64 != header.row_count {
            return Err(ReaderError::cache(format!(
                "row count mismatch: expected {}, got {}",
                header.row_count,
                rows.len()
            )));
        }

        Ok(CachedRows {
            format: header.format,
            has_label: header.has_label,
            rows,
        })
    }
}

fn split(data: &[u8]) -> Result<(CacheHeader, &[u8])> {
    let len_bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| ReaderError::cache("cache file too small"))?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;

    let header_end = 4usize
        .checked_add(header_len)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| ReaderError::cache("cache file truncated: header incomplete"))?;

    let header = decode_header(&data[4..header_end])?;
    Ok((header, &data[header_end..]))
}

fn decode_header(bytes: &[u8]) -> Result<CacheHeader> {
    let header: CacheHeader = bincode::deserialize(bytes)
        .map_err(|e| ReaderError::cache(format!("failed to decode cache header: {e}")))?;

    if !header.validate_magic() {
        return Err(ReaderError::cache(format!(
            "invalid magic bytes: expected {:?}, got {:?}",
            CacheHeader::MAGIC,
            header.magic
        )));
    }

    if !header.validate_version() {
        return Err(ReaderError::cache(format!(
            "unsupported version: expected {}, got {}",
            CacheHeader::VERSION,
            header.version
        )));
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheWriter;
    use crate::config::StorageConfig;
    use crate::data::Feature;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    struct Setup {
        writer: CacheWriter,
        reader: CacheReader,
        temp: TempDir,
    }

    fn setup() -> Setup {
        let temp = TempDir::new().unwrap();
        let storage_config = StorageConfig {
            base_path: temp.path().to_path_buf(),
            ..Default::default()
        };
        let storage: Arc<dyn StorageBackend> =
            Arc::new(LocalStorage::new(&storage_config).unwrap());
        let config = CacheConfig::default();

        Setup {
            writer: CacheWriter::new(storage.clone(), config.clone()),
            reader: CacheReader::new(storage, config),
            temp,
        }
    }

    fn fingerprint(size: u64) -> SourceFingerprint {
        SourceFingerprint {
            size,
            modified_nanos: Some(5),
            prefix_hash: 99,
        }
    }

    fn rows() -> Vec<SparseRow> {
        vec![
            SparseRow {
                label: Some(1.0),
                features: vec![Feature::new(1, 3, 0.5), Feature::new(2, 4, 1.0)],
            },
            SparseRow {
                label: Some(0.0),
                features: vec![],
            },
        ]
    }

    fn cache_file(setup: &Setup) -> std::path::PathBuf {
        setup.temp.path().join("train.ffm.bin")
    }

    #[test]
    fn test_write_load_roundtrip() {
        let s = setup();
        let source = Path::new("train.ffm");
        s.writer
            .write(source, &fingerprint(10), FileFormat::LibFfm, true, &rows())
            .unwrap();

        let cached = s.reader.load(source, &fingerprint(10)).unwrap();
        assert_eq!(cached.format, FileFormat::LibFfm);
        assert!(cached.has_label);
        assert_eq!(cached.rows, rows());

        let bytes = std::fs::read(cache_file(&s)).unwrap();
        let (header, _) = split(&bytes).unwrap();
        assert_eq!(header.row_count, 2);
    }

    #[test]
    fn test_missing_cache() {
        let s = setup();
        let err = s.reader.load(Path::new("train.ffm"), &fingerprint(10)).unwrap_err();
        assert!(matches!(err, ReaderError::Cache { .. }));
    }

    #[test]
    fn test_stale_fingerprint() {
        let s = setup();
        let source = Path::new("train.ffm");
        s.writer
            .write(source, &fingerprint(10), FileFormat::LibFfm, true, &rows())
            .unwrap();

        let err = s.reader.load(source, &fingerprint(11)).unwrap_err();
        assert!(err.to_string().contains("stale"));
    }

    #[test]
    fn test_corrupt_payload() {
        let s = setup();
        let source = Path::new("train.ffm");
        s.writer
            .write(source, &fingerprint(10), FileFormat::LibFfm, true, &rows())
            .unwrap();

        let mut bytes = std::fs::read(cache_file(&s)).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(cache_file(&s), &bytes).unwrap();

        let err = s.reader.load(source, &fingerprint(10)).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_truncated_cache() {
        let s = setup();
        let source = Path::new("train.ffm");
        s.writer
            .write(source, &fingerprint(10), FileFormat::LibFfm, true, &rows())
            .unwrap();

        let bytes = std::fs::read(cache_file(&s)).unwrap();

        std::fs::write(cache_file(&s), &bytes[..bytes.len() - 3]).unwrap();
        let err = s.reader.load(source, &fingerprint(10)).unwrap_err();
        assert!(err.to_string().contains("payload truncated"));

        std::fs::write(cache_file(&s), &bytes[..6]).unwrap();
        let err = s.reader.load(source, &fingerprint(10)).unwrap_err();
        assert!(err.to_string().contains("header incomplete"));

        std::fs::write(cache_file(&s), &bytes[..2]).unwrap();
        assert!(s.reader.load(source, &fingerprint(10)).is_err());
    }

    #[test]
    fn test_foreign_file_rejected() {
        let s = setup();
        std::fs::write(cache_file(&s), b"1 0:1:1\n0 0:2:1\n").unwrap();
        assert!(s.reader.load(Path::new("train.ffm"), &fingerprint(10)).is_err());
    }
}
