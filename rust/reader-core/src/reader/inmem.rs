// rust/reader-core/src/reader/inmem.rs

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::cache::{cache_path, CacheReader, CacheWriter, SourceFingerprint};
use crate::config::{CacheConfig, DetectConfig};
use crate::data::{SampleBatch, SparseRow};
use crate::error::{ReaderError, Result};
use crate::parser::{detect_format, FileFormat, FormatInfo, FormatParser, ParserRegistry};
use crate::storage::StorageBackend;

use super::{Reader, SourceState};

const DEFAULT_BATCH_SIZE: usize = 256;

/// Serves batches from a fully materialized copy of the source.
///
/// Rows are kept in file order; a separate permutation `order` decides the
/// delivery sequence. Shuffling permutes `order` once when requested and the
/// permutation then survives every `reset`, so consecutive passes see the
/// same sequence until shuffling is toggled again.
pub struct InMemoryReader {
    storage: Arc<dyn StorageBackend>,
    registry: Arc<ParserRegistry>,
    detect: DetectConfig,
    cache: CacheConfig,
    source: SourceState,
    shuffle: bool,
    batch_size: usize,
    rows: Vec<SparseRow>,
    order: Vec<usize>,
    cursor: usize,
    batch: SampleBatch,
    rng: StdRng,
    loaded_from_cache: bool,
}

impl InMemoryReader {
    pub fn new(storage: Arc<dyn StorageBackend>, registry: Arc<ParserRegistry>) -> Self {
        Self {
            storage,
            registry,
            detect: DetectConfig::default(),
            cache: CacheConfig::default(),
            source: SourceState::default(),
            shuffle: false,
            batch_size: DEFAULT_BATCH_SIZE,
            rows: Vec::new(),
            order: Vec::new(),
            cursor: 0,
            batch: SampleBatch::default(),
            rng: StdRng::from_entropy(),
            loaded_from_cache: false,
        }
    }

    #[must_use]
    pub fn with_detect_config(mut self, detect: DetectConfig) -> Self {
        self.detect = detect;
        self
    }

    #[must_use]
    pub fn with_cache_config(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the number of rows returned per `sample`.
    ///
    /// # Errors
    ///
    /// Returns a precondition error if `batch_size` is 0.
    pub fn set_batch_size(&mut self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(ReaderError::precondition("batch size must be greater than 0"));
        }
        self.batch_size = batch_size;
        Ok(())
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Reseeds the shuffling RNG for reproducible permutations.
    pub fn set_seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Number of rows loaded from the source.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether the last `initialize` restored rows from the binary cache.
    pub fn loaded_from_cache(&self) -> bool {
        self.loaded_from_cache
    }

    /// Loads rows for `path`, preferring a valid cache over parsing.
    fn load(
        &self,
        path: &Path,
        info: FormatInfo,
        parser: &dyn FormatParser,
    ) -> Result<(Vec<SparseRow>, bool)> {
        if !self.cache.enabled {
            return Ok((self.parse_source(path, parser)?, false));
        }

        let fingerprint =
            SourceFingerprint::compute(self.storage.as_ref(), path, self.cache.fingerprint_bytes)?;

        if let Some(rows) = self.try_cache(path, &fingerprint, info) {
            return Ok((rows, true));
        }

        let rows = self.parse_source(path, parser)?;

        let writer = CacheWriter::new(self.storage.clone(), self.cache.clone());
        if let Err(e) = writer.write(path, &fingerprint, info.format, info.has_label, &rows) {
            warn!(path = %path.display(), error = %e, "failed to write row cache");
        }

        Ok((rows, false))
    }

    fn try_cache(
        &self,
        path: &Path,
        fingerprint: &SourceFingerprint,
        info: FormatInfo,
    ) -> Option<Vec<SparseRow>> {
        let cache_file = cache_path(path, &self.cache.extension);
        match self.storage.exists(&cache_file) {
            Ok(true) => {}
            _ => {
                debug!(cache = %cache_file.display(), "no row cache");
                return None;
            }
        }

        let reader = CacheReader::new(self.storage.clone(), self.cache.clone());
        match reader.load(path, fingerprint) {
            Ok(cached) if cached.format == info.format && cached.has_label == info.has_label => {
                Some(cached.rows)
            }
            Ok(cached) => {
                warn!(
                    cache = %cache_file.display(),
                    cached_format = %cached.format,
                    detected_format = %info.format,
                    "row cache describes a different encoding, ignoring it"
                );
                None
            }
            Err(e) => {
                warn!(cache = %cache_file.display(), reason = %e, "row cache miss");
                None
            }
        }
    }

    fn parse_source(&self, path: &Path, parser: &dyn FormatParser) -> Result<Vec<SparseRow>> {
        let mut source = self.storage.open_read(path)?;
        let mut text = Vec::with_capacity(source.size() as usize);
        source
            .read_to_end(&mut text)
            .map_err(|e| ReaderError::storage_with_source(path, "failed to read source", e))?;

        let mut batch = SampleBatch::new(parser.has_label());
        parser.parse(&text, &mut batch)?;
        Ok(batch.into_rows())
    }

    fn identity_order(&mut self) {
        self.order.clear();
        self.order.extend(0..self.rows.len());
    }
}

impl Reader for InMemoryReader {
    fn initialize(&mut self, path: &Path) -> Result<()> {
        self.source = SourceState::default();
        self.rows = Vec::new();
        self.order = Vec::new();
        self.cursor = 0;
        self.loaded_from_cache = false;
        self.batch.release();

        let info = detect_format(self.storage.as_ref(), path, &self.detect)?;
        let parser = self.registry.create(info.format, info.has_label)?;
        let (rows, from_cache) = self.load(path, info, parser.as_ref())?;

        self.rows = rows;
        self.loaded_from_cache = from_cache;
        self.identity_order();
        if self.shuffle {
            self.order.shuffle(&mut self.rng);
        }
        self.cursor = 0;
        self.batch = SampleBatch::with_capacity(info.has_label, self.batch_size);
        self.source = SourceState {
            filename: Some(path.to_path_buf()),
            format: Some(info.format),
            has_label: info.has_label,
        };

        info!(
            path = %path.display(),
            format = %info.format,
            has_label = info.has_label,
            rows = self.rows.len(),
            cache_hit = from_cache,
            "in-memory reader initialized"
        );

        Ok(())
    }

    fn sample(&mut self) -> Result<(&SampleBatch, usize)> {
        self.source.ensure_initialized()?;

        self.batch.clear();
        let end = (self.cursor + self.batch_size).min(self.order.len());
        for &i in &self.order[self.cursor..end] {
            self.batch.push(self.rows[i].clone());
        }

        let count = end - self.cursor;
        self.cursor = end;
        Ok((&self.batch, count))
    }

    fn reset(&mut self) -> Result<()> {
        self.source.ensure_initialized()?;
        self.cursor = 0;
        Ok(())
    }

    fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
        if shuffle {
            self.order.shuffle(&mut self.rng);
        } else {
            self.order.sort_unstable();
        }
    }

    fn shuffle(&self) -> bool {
        self.shuffle
    }

    fn has_label(&self) -> bool {
        self.source.has_label
    }

    fn filename(&self) -> Option<&Path> {
        self.source.filename.as_deref()
    }

    fn format(&self) -> Option<FileFormat> {
        self.source.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::reader::testing::{drain, init_tracing, libsvm_rows, write_source};
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn reader_in(dir: &Path) -> InMemoryReader {
        let storage_config = StorageConfig {
            base_path: dir.to_path_buf(),
            ..Default::default()
        };
        let storage: Arc<dyn StorageBackend> =
            Arc::new(LocalStorage::new(&storage_config).unwrap());
        InMemoryReader::new(storage, Arc::new(ParserRegistry::default()))
    }

    fn counts(reader: &mut InMemoryReader) -> Vec<usize> {
        let mut counts = Vec::new();
        loop {
            let (_, count) = reader.sample().unwrap();
            counts.push(count);
            if count == 0 {
                return counts;
            }
        }
    }

    #[test]
    fn test_four_rows_batch_of_two() {
        init_tracing();
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(4));

        let mut reader = reader_in(temp.path());
        reader.set_batch_size(2).unwrap();
        reader.initialize(Path::new("train.txt")).unwrap();

        assert_eq!(counts(&mut reader), vec![2, 2, 0]);
        reader.reset().unwrap();
        assert_eq!(counts(&mut reader), vec![2, 2, 0]);
    }

    #[test]
    fn test_batches_follow_file_order() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(7));

        let mut reader = reader_in(temp.path());
        reader.set_batch_size(3).unwrap();
        reader.initialize(Path::new("train.txt")).unwrap();

        let (batch, count) = reader.sample().unwrap();
        assert_eq!(count, 3);
        assert!(batch.has_label());
        assert_eq!(batch.row(1).unwrap().label, Some(1.0));

        reader.reset().unwrap();
        assert_eq!(drain(&mut reader), (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_exhausted_keeps_returning_zero() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(3));

        let mut reader = reader_in(temp.path());
        reader.initialize(Path::new("train.txt")).unwrap();

        assert_eq!(reader.sample().unwrap().1, 3);
        assert_eq!(reader.sample().unwrap().1, 0);
        assert_eq!(reader.sample().unwrap().1, 0);
        assert!(reader.sample().unwrap().0.is_empty());
    }

    #[test]
    fn test_shuffle_is_stable_across_reset() {
        init_tracing();
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(64));

        let mut reader = reader_in(temp.path());
        reader.set_seed(7);
        reader.set_batch_size(5).unwrap();
        reader.initialize(Path::new("train.txt")).unwrap();
        reader.set_shuffle(true);
        assert!(reader.shuffle());

        let first = drain(&mut reader);
        reader.reset().unwrap();
        let second = drain(&mut reader);

        assert_eq!(first, second);
        assert_ne!(first, (0..64).collect::<Vec<_>>());

        let mut sorted = first.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..64).collect::<Vec<_>>());
    }

    #[test]
    fn test_unshuffle_restores_file_order() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(32));

        let mut reader = reader_in(temp.path());
        reader.set_seed(3);
        reader.set_shuffle(true);
        reader.initialize(Path::new("train.txt")).unwrap();
        assert_ne!(drain(&mut reader), (0..32).collect::<Vec<_>>());

        reader.set_shuffle(false);
        reader.reset().unwrap();
        assert_eq!(drain(&mut reader), (0..32).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_permutation() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(40));

        let mut orders = Vec::new();
        for _ in 0..2 {
            let mut reader = reader_in(temp.path());
            reader.set_seed(11);
            reader.set_shuffle(true);
            reader.initialize(Path::new("train.txt")).unwrap();
            orders.push(drain(&mut reader));
        }
        assert_eq!(orders[0], orders[1]);
    }

    #[test]
    fn test_cache_written_then_used() {
        init_tracing();
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.ffm", "1 0:1:1 1:2:0.5\n0 2:3:1\n-1 0:4:2\n");

        let mut first = reader_in(temp.path());
        first.initialize(Path::new("train.ffm")).unwrap();
        assert!(!first.loaded_from_cache());
        assert!(temp.path().join("train.ffm.bin").exists());
        let (parsed, _) = first.sample().unwrap();
        let parsed = parsed.clone();

        let mut second = reader_in(temp.path());
        second.initialize(Path::new("train.ffm")).unwrap();
        assert!(second.loaded_from_cache());
        assert_eq!(second.format(), Some(FileFormat::LibFfm));
        assert!(second.has_label());

        let (cached, count) = second.sample().unwrap();
        assert_eq!(count, 3);
        assert_eq!(*cached, parsed);
    }

    #[test]
    fn test_stale_cache_is_rebuilt() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(3));

        let mut reader = reader_in(temp.path());
        reader.initialize(Path::new("train.txt")).unwrap();

        // Different size and content than the cached source
        write_source(temp.path(), "train.txt", &libsvm_rows(5));
        let mut reader = reader_in(temp.path());
        reader.initialize(Path::new("train.txt")).unwrap();
        assert!(!reader.loaded_from_cache());
        assert_eq!(reader.num_rows(), 5);

        let mut reader = reader_in(temp.path());
        reader.initialize(Path::new("train.txt")).unwrap();
        assert!(reader.loaded_from_cache());
        assert_eq!(reader.num_rows(), 5);
    }

    #[test]
    fn test_corrupt_cache_is_a_miss() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(4));

        let mut reader = reader_in(temp.path());
        reader.initialize(Path::new("train.txt")).unwrap();

        std::fs::write(temp.path().join("train.txt.bin"), b"garbage").unwrap();

        let mut reader = reader_in(temp.path());
        reader.initialize(Path::new("train.txt")).unwrap();
        assert!(!reader.loaded_from_cache());
        assert_eq!(drain(&mut reader), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_cache_disabled() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.txt", &libsvm_rows(2));

        let mut reader = reader_in(temp.path()).with_cache_config(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        reader.initialize(Path::new("train.txt")).unwrap();
        assert!(!temp.path().join("train.txt.bin").exists());
        assert_eq!(reader.num_rows(), 2);
    }

    #[test]
    fn test_csv_label_from_config() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "train.csv", "0.5,1,0\n2,0,3\n");

        let mut reader = reader_in(temp.path()).with_detect_config(DetectConfig {
            csv_has_label: false,
            ..Default::default()
        });
        reader.initialize(Path::new("train.csv")).unwrap();
        assert_eq!(reader.format(), Some(FileFormat::Csv));
        assert!(!reader.has_label());

        let (batch, count) = reader.sample().unwrap();
        assert_eq!(count, 2);
        assert_eq!(batch.row(0).unwrap().label, None);
        assert_eq!(batch.row(1).unwrap().features.len(), 2);
    }

    #[test]
    fn test_initialize_failures() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "empty.txt", "");
        write_source(temp.path(), "words.txt", "hello world\n");
        write_source(temp.path(), "broken.txt", "1 1:1\n0 2:x\n");

        let mut reader = reader_in(temp.path());

        let err = reader.initialize(Path::new("missing.txt")).unwrap_err();
        assert!(matches!(err, ReaderError::Storage { .. }));

        let err = reader.initialize(Path::new("empty.txt")).unwrap_err();
        assert!(err.is_precondition());

        let err = reader.initialize(Path::new("words.txt")).unwrap_err();
        assert!(matches!(err, ReaderError::UnknownFormat { .. }));

        let err = reader.initialize(Path::new("broken.txt")).unwrap_err();
        assert!(matches!(err, ReaderError::Parse { line: 2, .. }));

        assert!(reader.filename().is_none());
        assert!(reader.sample().unwrap_err().is_precondition());
    }

    #[test]
    fn test_failed_reinitialize_unbinds_previous_source() {
        let temp = TempDir::new().unwrap();
        write_source(temp.path(), "a.txt", &libsvm_rows(2));

        let mut reader = reader_in(temp.path());
        reader.initialize(Path::new("a.txt")).unwrap();
        assert_eq!(reader.sample().unwrap().1, 2);
        reader.reset().unwrap();

        assert!(reader.initialize(Path::new("missing.txt")).is_err());
        assert!(reader.filename().is_none());
        assert!(reader.format().is_none());
        assert_eq!(reader.num_rows(), 0);
        assert!(reader.sample().unwrap_err().is_precondition());
        assert!(reader.reset().unwrap_err().is_precondition());

        // The reader is usable again once a source loads
        reader.initialize(Path::new("a.txt")).unwrap();
        assert_eq!(reader.sample().unwrap().1, 2);
    }

    #[test]
    fn test_batch_size_zero_rejected() {
        let temp = TempDir::new().unwrap();
        let mut reader = reader_in(temp.path());
        assert!(reader.set_batch_size(0).is_err());
        assert_eq!(reader.batch_size(), DEFAULT_BATCH_SIZE);
    }
}
