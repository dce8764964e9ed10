// rust/reader-core/src/cache/writer.rs

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::config::CacheConfig;
use crate::data::SparseRow;
use crate::error::{ReaderError, Result};
use crate::parser::FileFormat;
use crate::storage::StorageBackend;

use super::format::{cache_path, CacheHeader, SourceFingerprint};

/// Writes parsed rows to a source's cache file.
///
/// With `atomic_writes` the file is first written under a hidden temporary
/// name in the same directory and then renamed into place, so a reader
/// never observes a half-written cache.
pub struct CacheWriter {
    storage: Arc<dyn StorageBackend>,
    config: CacheConfig,
}

impl CacheWriter {
    pub fn new(storage: Arc<dyn StorageBackend>, config: CacheConfig) -> Self {
        Self { storage, config }
    }

    /// Writes the cache for `source` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the rows cannot be encoded, or a
    /// storage error if the file cannot be written.
    pub fn write(
        &self,
        source: &Path,
        fingerprint: &SourceFingerprint,
        format: FileFormat,
        has_label: bool,
        rows: &[SparseRow],
    ) -> Result<PathBuf> {
        let payload = bincode::serialize(rows)
            .map_err(|e| ReaderError::serialization(format!("failed to encode rows: {e}")))?;

        let header = CacheHeader::new(format, has_label, rows.len() as u64, &payload, *fingerprint);
        let header_bytes = bincode::serialize(&header)
            .map_err(|e| ReaderError::serialization(format!("failed to encode cache header: {e}")))?;

        let header_len = u32::try_from(header_bytes.len())
            .map_err(|_| ReaderError::serialization("cache header too large"))?;
        let mut data = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        data.extend_from_slice(&header_len.to_le_bytes());
        data.extend_from_slice(&header_bytes);
        data.extend_from_slice(&payload);

        let final_path = cache_path(source, &self.config.extension);

        if self.config.atomic_writes {
            let temp_path = temp_path_for(&final_path);
            self.write_to_path(&temp_path, &data)?;

            if let Err(e) = self.storage.rename(&temp_path, &final_path) {
                let _ = self.storage.delete(&temp_path);
                return Err(e);
            }
        } else {
            self.write_to_path(&final_path, &data)?;
        }

        debug!(
            path = %final_path.display(),
            rows = rows.len(),
            bytes = data.len(),
            "wrote row cache"
        );

        Ok(final_path)
    }

    fn write_to_path(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut writer = self.storage.open_write(path)?;
        writer.write_all(data).map_err(|e| {
            ReaderError::storage_with_source(path, "failed to write cache data", e)
        })?;
        writer.finish()
    }
}

/// `<dir>/.<name>.tmp` next to `path`.
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::data::Feature;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn setup(atomic_writes: bool) -> (CacheWriter, Arc<dyn StorageBackend>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage_config = StorageConfig {
            base_path: temp_dir.path().to_path_buf(),
            ..Default::default()
        };
        let storage: Arc<dyn StorageBackend> =
            Arc::new(LocalStorage::new(&storage_config).unwrap());
        let config = CacheConfig {
            atomic_writes,
            ..Default::default()
        };
        (CacheWriter::new(storage.clone(), config), storage, temp_dir)
    }

    fn fingerprint() -> SourceFingerprint {
        SourceFingerprint {
            size: 0,
            modified_nanos: None,
            prefix_hash: 0,
        }
    }

    fn rows() -> Vec<SparseRow> {
        vec![SparseRow {
            label: Some(1.0),
            features: vec![Feature::new(0, 3, 0.5)],
        }]
    }

    #[test]
    fn test_write_creates_cache_next_to_source() {
        let (writer, storage, temp) = setup(true);

        let path = writer
            .write(Path::new("train.txt"), &fingerprint(), FileFormat::LibSvm, true, &rows())
            .unwrap();

        assert_eq!(path, PathBuf::from("train.txt.bin"));
        assert!(storage.exists(&path).unwrap());
        assert!(!temp.path().join(".train.txt.bin.tmp").exists());
    }

    #[test]
    fn test_write_layout() {
        let (writer, _, temp) = setup(false);
        writer
            .write(Path::new("train.txt"), &fingerprint(), FileFormat::LibSvm, true, &rows())
            .unwrap();

        let bytes = std::fs::read(temp.path().join("train.txt.bin")).unwrap();
        let header_len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        let header: CacheHeader = bincode::deserialize(&bytes[4..4 + header_len]).unwrap();

        assert_eq!(header.row_count, 1);
        assert_eq!(header.payload_len as usize, bytes.len() - 4 - header_len);

        let payload: Vec<SparseRow> = bincode::deserialize(&bytes[4 + header_len..]).unwrap();
        assert_eq!(payload, rows());
    }

    #[test]
    fn test_write_overwrites_existing_cache() {
        let (writer, _, temp) = setup(true);
        let source = Path::new("train.txt");

        writer
            .write(source, &fingerprint(), FileFormat::LibSvm, true, &rows())
            .unwrap();
        let first = std::fs::metadata(temp.path().join("train.txt.bin")).unwrap().len();

        writer
            .write(source, &fingerprint(), FileFormat::LibSvm, true, &[])
            .unwrap();
        let second = std::fs::metadata(temp.path().join("train.txt.bin")).unwrap().len();

        assert!(second < first);
    }

    #[test]
    fn test_temp_path_for() {
        assert_eq!(
            temp_path_for(Path::new("/data/train.txt.bin")),
            PathBuf::from("/data/.train.txt.bin.tmp")
        );
    }
}
