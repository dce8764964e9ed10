// rust/reader-core/src/reader/mod.rs

//! Sample readers.
//!
//! A driver binds a reader to a source with [`Reader::initialize`], pulls
//! batches with [`Reader::sample`] until it returns a count of zero, then
//! calls [`Reader::reset`] to start the next pass.
//!
//! Two strategies implement the contract:
//! - [`InMemoryReader`] parses the whole source once (or restores it from
//!   the binary cache), then serves batches from memory, optionally shuffled.
//! - [`OnDiskReader`] streams the source block by block. A background
//!   producer reads and parses the next block while the consumer works on
//!   the current one.
//!
//! [`SampleReader`] wraps both and is built from a [`ReaderConfig`].
//!
//! # Example
//!
//! ```no_run
//! use reader_core::config::ReaderConfig;
//! use reader_core::parser::ParserRegistry;
//! use reader_core::reader::{Reader, SampleReader};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = ReaderConfig::default();
//! let mut reader =
//!     SampleReader::from_config(&config, Arc::new(ParserRegistry::default()), None).unwrap();
//! reader.initialize(Path::new("train.libsvm")).unwrap();
//!
//! for _epoch in 0..3 {
//!     loop {
//!         let (batch, count) = reader.sample().unwrap();
//!         if count == 0 {
//!             break;
//!         }
//!         // Feed batch to the optimizer
//!         let _ = batch.num_features();
//!     }
//!     reader.reset().unwrap();
//! }
//! ```

mod inmem;
mod ondisk;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{ReaderConfig, ReaderKind};
use crate::data::SampleBatch;
use crate::error::{ReaderError, Result};
use crate::parser::{FileFormat, ParserRegistry};
use crate::pool::ThreadPool;
use crate::storage::{LocalStorage, StorageBackend};

pub use inmem::InMemoryReader;
pub use ondisk::{Block, OnDiskReader};

/// The sampling contract shared by every reader.
pub trait Reader {
    /// Binds the reader to `path`, detecting its format.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened, its format cannot be
    /// classified, or a strategy precondition is not met. The reader is left
    /// uninitialized in that case.
    fn initialize(&mut self, path: &Path) -> Result<()>;

    /// Returns the next batch and its row count.
    ///
    /// A count of zero marks the end of the current pass. Calling `sample`
    /// again before [`Reader::reset`] keeps returning zero.
    ///
    /// # Errors
    ///
    /// Returns a precondition error before `initialize`, and any read or
    /// parse error raised while producing the batch.
    fn sample(&mut self) -> Result<(&SampleBatch, usize)>;

    /// Rewinds to the beginning of the source.
    ///
    /// Leaves `has_label`, `shuffle` and configuration unchanged.
    fn reset(&mut self) -> Result<()>;

    /// Requests shuffled or file-order delivery.
    fn set_shuffle(&mut self, shuffle: bool);

    fn shuffle(&self) -> bool;

    /// Whether rows of the bound source carry a label.
    fn has_label(&self) -> bool;

    /// The bound source, once initialized.
    fn filename(&self) -> Option<&Path>;

    /// The detected source encoding, once initialized.
    fn format(&self) -> Option<FileFormat>;
}

/// A reader selected at construction time.
pub enum SampleReader {
    InMemory(InMemoryReader),
    OnDisk(OnDiskReader),
}

impl SampleReader {
    /// Builds the reader named by `config.reader.kind`.
    ///
    /// On-disk readers use `pool` when given; otherwise a private pool of
    /// `config.on_disk.pool_threads` workers is created.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the storage
    /// backend or pool cannot be created.
    pub fn from_config(
        config: &ReaderConfig,
        registry: Arc<ParserRegistry>,
        pool: Option<Arc<ThreadPool>>,
    ) -> Result<Self> {
        config.validate()?;

        let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(&config.storage)?);

        let mut reader = match config.reader.kind {
            ReaderKind::InMemory => {
                let mut reader = InMemoryReader::new(storage, registry)
                    .with_detect_config(config.detect.clone())
                    .with_cache_config(config.cache.clone());
                reader.set_batch_size(config.reader.batch_size)?;
                if let Some(seed) = config.reader.seed {
                    reader.set_seed(seed);
                }
                Self::InMemory(reader)
            }
            ReaderKind::OnDisk => {
                let pool = match pool {
                    Some(pool) => pool,
                    None => Arc::new(ThreadPool::new(config.on_disk.pool_threads)?),
                };
                let mut reader = OnDiskReader::new(storage, registry)
                    .with_detect_config(config.detect.clone());
                reader.set_block_size(config.on_disk.block_size);
                reader.set_thread_pool(pool);
                Self::OnDisk(reader)
            }
        };

        if config.reader.shuffle {
            reader.set_shuffle(true);
        }

        Ok(reader)
    }

    /// Loads a TOML configuration file, applies `SPR_*` environment
    /// overrides and builds the reader it names.
    pub fn from_config_file(
        path: impl AsRef<Path>,
        registry: Arc<ParserRegistry>,
        pool: Option<Arc<ThreadPool>>,
    ) -> Result<Self> {
        let config = ReaderConfig::from_file(path)?.with_env_overrides();
        Self::from_config(&config, registry, pool)
    }

    pub fn kind(&self) -> ReaderKind {
        match self {
            Self::InMemory(_) => ReaderKind::InMemory,
            Self::OnDisk(_) => ReaderKind::OnDisk,
        }
    }

    pub fn as_in_memory(&self) -> Option<&InMemoryReader> {
        match self {
            Self::InMemory(reader) => Some(reader),
            Self::OnDisk(_) => None,
        }
    }

    pub fn as_on_disk(&self) -> Option<&OnDiskReader> {
        match self {
            Self::OnDisk(reader) => Some(reader),
            Self::InMemory(_) => None,
        }
    }
}

impl Reader for SampleReader {
    fn initialize(&mut self, path: &Path) -> Result<()> {
        match self {
            Self::InMemory(r) => r.initialize(path),
            Self::OnDisk(r) => r.initialize(path),
        }
    }

    fn sample(&mut self) -> Result<(&SampleBatch, usize)> {
        match self {
            Self::InMemory(r) => r.sample(),
            Self::OnDisk(r) => r.sample(),
        }
    }

    fn reset(&mut self) -> Result<()> {
        match self {
            Self::InMemory(r) => r.reset(),
            Self::OnDisk(r) => r.reset(),
        }
    }

    fn set_shuffle(&mut self, shuffle: bool) {
        match self {
            Self::InMemory(r) => r.set_shuffle(shuffle),
            Self::OnDisk(r) => r.set_shuffle(shuffle),
        }
    }

    fn shuffle(&self) -> bool {
        match self {
            Self::InMemory(r) => r.shuffle(),
            Self::OnDisk(r) => r.shuffle(),
        }
    }

    fn has_label(&self) -> bool {
        match self {
            Self::InMemory(r) => r.has_label(),
            Self::OnDisk(r) => r.has_label(),
        }
    }

    fn filename(&self) -> Option<&Path> {
        match self {
            Self::InMemory(r) => r.filename(),
            Self::OnDisk(r) => r.filename(),
        }
    }

    fn format(&self) -> Option<FileFormat> {
        match self {
            Self::InMemory(r) => r.format(),
            Self::OnDisk(r) => r.format(),
        }
    }
}

/// State every reader keeps about its bound source.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceState {
    pub(crate) filename: Option<PathBuf>,
    pub(crate) format: Option<FileFormat>,
    pub(crate) has_label: bool,
}

impl SourceState {
    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.filename.is_none() {
            return Err(ReaderError::precondition(
                "reader is not initialized; call initialize first",
            ));
        }
        Ok(())
    }
}
