// rust/reader-core/src/reader/ondisk/mod.rs

//! Streaming reader for sources that do not fit in memory.
//!
//! # Pipeline
//!
//! ```text
//!   pool worker                              driver thread
//!  +-------------+     +---------------+     +-------------+
//!  |  Producer   | --> |  slot (1 item)| --> |  sample()   |
//!  | read, split |     |  generation   |     |  reset()    |
//!  |   parse     | <-- |  not_full /   | <-- |             |
//!  +-------------+     |  not_empty    |     +-------------+
//!                      +---------------+
//! ```
//!
//! Each item is a block of whole lines plus the rows parsed from it. Blocks
//! are delivered in file order and, concatenated, reproduce the file exactly
//! once per pass. Shuffling is not supported.

mod producer;

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::DetectConfig;
use crate::data::SampleBatch;
use crate::error::{ReaderError, Result};
use crate::parser::{detect_format, FileFormat, ParserRegistry};
use crate::pool::{TaskHandle, ThreadPool};
use crate::storage::StorageBackend;

use self::producer::{Handoff, Pipeline, Producer};
use super::{Reader, SourceState};

/// Raw bytes of one read from the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub data: Vec<u8>,
    /// Byte offset of `data` within the source.
    pub offset: u64,
    /// Position of the block within its pass.
    pub index: u64,
}

/// Reads a source block by block on a pool worker.
///
/// `set_block_size` and `set_thread_pool` must be called before
/// `initialize`. The producer occupies one pool worker for as long as the
/// reader is initialized, so a pool shared by several on-disk readers needs
/// at least one worker per reader.
pub struct OnDiskReader {
    storage: Arc<dyn StorageBackend>,
    registry: Arc<ParserRegistry>,
    detect: DetectConfig,
    source: SourceState,
    block_size: usize,
    pool: Option<Arc<ThreadPool>>,
    pipeline: Option<Arc<Pipeline>>,
    task: Option<TaskHandle>,
    batch: SampleBatch,
    block: Block,
    exhausted: bool,
}

impl OnDiskReader {
    pub fn new(storage: Arc<dyn StorageBackend>, registry: Arc<ParserRegistry>) -> Self {
        Self {
            storage,
            registry,
            detect: DetectConfig::default(),
            source: SourceState::default(),
            block_size: 0,
            pool: None,
            pipeline: None,
            task: None,
            batch: SampleBatch::default(),
            block: Block::default(),
            exhausted: false,
        }
    }

    #[must_use]
    pub fn with_detect_config(mut self, detect: DetectConfig) -> Self {
        self.detect = detect;
        self
    }

    /// Sets the number of bytes read per block. Takes effect at the next
    /// `initialize`.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Attaches the pool that hosts the background producer.
    pub fn set_thread_pool(&mut self, pool: Arc<ThreadPool>) {
        self.pool = Some(pool);
    }

    /// The raw block behind the last batch returned by `sample`.
    ///
    /// Empty before the first batch of a pass and after exhaustion.
    pub fn current_block(&self) -> &Block {
        &self.block
    }

    /// Whether the current pass has been fully delivered.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Stops the producer and waits for it to release the source.
    fn shutdown_pipeline(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.shutdown();
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.join() {
                warn!(error = %e, "background reader did not finish cleanly");
            }
        }
        self.batch.release();
        self.block = Block::default();
        self.exhausted = false;
    }
}

impl Reader for OnDiskReader {
    fn initialize(&mut self, path: &Path) -> Result<()> {
        if self.block_size == 0 {
            return Err(ReaderError::precondition(
                "block size must be set to a value greater than 0 before initialize",
            ));
        }
        let pool = self.pool.clone().ok_or_else(|| {
            ReaderError::precondition("a thread pool must be attached before initialize")
        })?;

        self.shutdown_pipeline();
        self.source = SourceState::default();

        let info = detect_format(self.storage.as_ref(), path, &self.detect)?;
        let parser = self.registry.create(info.format, info.has_label)?;
        let source = self.storage.open_read(path)?;

        let pipeline = Arc::new(Pipeline::new());
        let producer = Producer::new(
            pipeline.clone(),
            source,
            parser,
            self.block_size,
            path.to_path_buf(),
        );
        let task = pool.schedule(move || producer.run())?;

        self.pipeline = Some(pipeline);
        self.task = Some(task);
        self.batch = SampleBatch::new(info.has_label);
        self.source = SourceState {
            filename: Some(path.to_path_buf()),
            format: Some(info.format),
            has_label: info.has_label,
        };

        info!(
            path = %path.display(),
            format = %info.format,
            has_label = info.has_label,
            block_size = self.block_size,
            "on-disk reader initialized"
        );

        Ok(())
    }

    fn sample(&mut self) -> Result<(&SampleBatch, usize)> {
        self.source.ensure_initialized()?;
        let pipeline = self
            .pipeline
            .clone()
            .ok_or_else(|| ReaderError::pipeline("background reader is not running"))?;

        if self.exhausted {
            return Ok((&self.batch, 0));
        }

        loop {
            match pipeline.take()? {
                // A block of blank lines carries no rows; it must not look like the end
                Handoff::Chunk { block, samples } if samples.is_empty() => {
                    debug!(
                        index = block.index,
                        offset = block.offset,
                        bytes = block.data.len(),
                        "skipping block without rows"
                    );
                }
                Handoff::Chunk { block, samples } => {
                    self.block = block;
                    self.batch = samples;
                    let count = self.batch.len();
                    return Ok((&self.batch, count));
                }
                Handoff::End => {
                    self.exhausted = true;
                    self.batch.clear();
                    self.block = Block::default();
                    return Ok((&self.batch, 0));
                }
                Handoff::Failed(e) => {
                    self.exhausted = true;
                    self.batch.clear();
                    self.block = Block::default();
                    return Err(e);
                }
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.source.ensure_initialized()?;
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| ReaderError::pipeline("background reader is not running"))?;

        pipeline.restart()?;
        self.exhausted = false;
        self.batch.clear();
        self.block = Block::default();
        Ok(())
    }

    fn set_shuffle(&mut self, shuffle: bool) {
        if shuffle {
            error!("on-disk reader cannot shuffle; rows keep file order");
        }
    }

    fn shuffle(&self) -> bool {
        false
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

impl Drop for OnDiskReader {
    fn drop(&mut self) {
        self.shutdown_pipeline();
    }
}
