// rust/reader-core/src/reader/ondisk/producer.rs

//! Background half of the on-disk reader.
//!
//! The producer and the consumer share a [`Pipeline`]: one slot, a pass
//! generation and a shutdown flag behind a single mutex, plus two condition
//! variables. The producer only reads a new block once the slot is empty,
//! so at most two blocks exist at a time (one being consumed, one being
//! produced).

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use tracing::{debug, error};

use crate::data::SampleBatch;
use crate::error::{ReaderError, Result};
use crate::parser::FormatParser;
use crate::storage::StorageReader;

use super::Block;

/// Bytes read at a time when checking whether the source ends in blank lines.
const TAIL_LOOKAHEAD: usize = 256;

/// One item passed from producer to consumer.
#[derive(Debug)]
pub(super) enum Handoff {
    Chunk { block: Block, samples: SampleBatch },
    /// End of the current pass.
    End,
    Failed(ReaderError),
}

#[derive(Debug, Default)]
struct PipelineState {
    slot: Option<Handoff>,
    generation: u64,
    shutdown: bool,
    producer_exited: bool,
}

/// The single-slot handoff cell.
#[derive(Debug, Default)]
pub(super) struct Pipeline {
    state: Mutex<PipelineState>,
    /// Signalled when the slot empties, the generation changes or on shutdown.
    not_full: Condvar,
    /// Signalled when the slot fills or the producer goes away.
    not_empty: Condvar,
}

impl Pipeline {
    pub(super) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, PipelineState>> {
        self.state
            .lock()
            .map_err(|_| ReaderError::pipeline("pipeline state poisoned"))
    }

    /// Blocks until an item is installed, then takes it out of the slot.
    pub(super) fn take(&self) -> Result<Handoff> {
        let mut state = self.lock()?;
        loop {
            if let Some(item) = state.slot.take() {
                self.not_full.notify_one();
                return Ok(item);
            }
            if state.shutdown || state.producer_exited {
                return Err(ReaderError::pipeline("background reader is not running"));
            }
            state = self
                .not_empty
                .wait(state)
                .map_err(|_| ReaderError::pipeline("pipeline state poisoned"))?;
        }
    }

    /// Starts a new pass: drops any installed item and wakes the producer.
    pub(super) fn restart(&self) -> Result<()> {
        let mut state = self.lock()?;
        state.generation += 1;
        state.slot = None;
        self.not_full.notify_all();
        Ok(())
    }

    pub(super) fn shutdown(&self) {
        // A poisoned lock still carries a usable state
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.shutdown = true;
        state.slot = None;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Producer side: waits until there is something to do.
    ///
    /// Returns `None` on shutdown, otherwise the generation to work on. While
    /// `finished` is set the producer has already ended the pass and only a
    /// generation change wakes it.
    fn wait_for_work(&self, generation: u64, finished: bool) -> Result<Option<u64>> {
        let mut state = self.lock()?;
        loop {
            if state.shutdown {
                return Ok(None);
            }
            if state.generation != generation {
                return Ok(Some(state.generation));
            }
            if !finished && state.slot.is_none() {
                return Ok(Some(generation));
            }
            state = self
                .not_full
                .wait(state)
                .map_err(|_| ReaderError::pipeline("pipeline state poisoned"))?;
        }
    }

    /// Installs `item` unless a reset made it stale. Returns false on shutdown.
    fn install(&self, generation: u64, item: Handoff) -> Result<bool> {
        let mut state = self.lock()?;
        if state.shutdown {
            return Ok(false);
        }
        if state.generation == generation {
            state.slot = Some(item);
            self.not_empty.notify_one();
        }
        Ok(true)
    }

    fn mark_exited(&self) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.producer_exited = true;
        self.not_empty.notify_all();
    }
}

/// Wakes a waiting consumer if the producer returns or unwinds.
struct ExitGuard(Arc<Pipeline>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}

/// Reads, splits and parses blocks for one source.
pub(super) struct Producer {
    pipeline: Arc<Pipeline>,
    source: Box<dyn StorageReader>,
    parser: Arc<dyn FormatParser>,
    block_size: usize,
    path: PathBuf,
}

impl Producer {
    pub(super) fn new(
        pipeline: Arc<Pipeline>,
        source: Box<dyn StorageReader>,
        parser: Arc<dyn FormatParser>,
        block_size: usize,
        path: PathBuf,
    ) -> Self {
        Self {
            pipeline,
            source,
            parser,
            block_size,
            path,
        }
    }

    /// Runs until the pipeline shuts down. The source closes on return.
    pub(super) fn run(mut self) {
        let _guard = ExitGuard(self.pipeline.clone());
        if let Err(e) = self.stream() {
            error!(path = %self.path.display(), error = %e, "background reader stopped");
        }
        debug!(path = %self.path.display(), "background reader exiting");
    }

    fn stream(&mut self) -> Result<()> {
        let mut generation = 0;
        let mut finished = false;
        let mut offset = 0u64;
        let mut index = 0u64;

        while let Some(current) = self.pipeline.wait_for_work(generation, finished)? {
            if current != generation {
                generation = current;
                finished = false;
                offset = 0;
                index = 0;
                if let Err(e) = self.rewind() {
                    finished = true;
                    if !self.pipeline.install(generation, Handoff::Failed(e))? {
                        break;
                    }
                }
                continue;
            }

            let item = self.next_item(offset, index);
            match &item {
                Handoff::Chunk { block, .. } => {
                    offset += block.data.len() as u64;
                    index += 1;
                }
                Handoff::End | Handoff::Failed(_) => finished = true,
            }

            if !self.pipeline.install(generation, item)? {
                break;
            }
        }

        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        self.source.seek(SeekFrom::Start(0)).map_err(|e| {
            ReaderError::storage_with_source(&self.path, "failed to rewind source", e)
        })?;
        Ok(())
    }

    fn next_item(&mut self, offset: u64, index: u64) -> Handoff {
        let block = match self.read_block(offset, index) {
            Ok(Some(block)) => block,
            Ok(None) => return Handoff::End,
            Err(e) => return Handoff::Failed(e),
        };

        let mut samples = SampleBatch::new(self.parser.has_label());
        match self.parser.parse(&block.data, &mut samples) {
            Ok(rows) => {
                debug!(
                    index = block.index,
                    offset = block.offset,
                    bytes = block.data.len(),
                    rows,
                    "produced block"
                );
                Handoff::Chunk { block, samples }
            }
            Err(e) => {
                error!(
                    path = %self.path.display(),
                    offset = block.offset,
                    error = %e,
                    "failed to parse block"
                );
                Handoff::Failed(e)
            }
        }
    }

    /// Reads the next block from the current position.
    ///
    /// Returns `None` at end of file.
    fn read_block(&mut self, offset: u64, index: u64) -> Result<Option<Block>> {
        let mut data = Vec::with_capacity(self.block_size);
        let mut want = self.block_size;

        loop {
            let got = self.fill(&mut data, want)?;
            if got < want {
                // Short read: the rest of the file is in `data`
                break;
            }

            match split_point(&data) {
                Some(end) => {
                    let blank_tail = data[end..].iter().all(u8::is_ascii_whitespace);
                    let remainder = data.len() - end;
                    if remainder > 0 {
                        data.truncate(end);
                        self.seek_back(remainder)?;
                    }
                    if blank_tail {
                        self.absorb_blank_tail(&mut data)?;
                    }
                    break;
                }
                // No complete record yet: double the block
                None => want = data.len(),
            }
        }

        if data.is_empty() {
            return Ok(None);
        }

        Ok(Some(Block {
            data,
            offset,
            index,
        }))
    }

    /// Appends the rest of the source to `data` if it is only whitespace.
    ///
    /// Such a tail holds no rows and would otherwise become a block of its
    /// own. Anything else is left unread for the next block.
    fn absorb_blank_tail(&mut self, data: &mut Vec<u8>) -> Result<()> {
        let start = data.len();
        loop {
            let got = self.fill(data, TAIL_LOOKAHEAD)?;
            let fresh = &data[data.len() - got..];
            if fresh.iter().any(|b| !b.is_ascii_whitespace()) {
                let read = data.len() - start;
                data.truncate(start);
                return self.seek_back(read);
            }
            if got < TAIL_LOOKAHEAD {
                return Ok(());
            }
        }
    }

    fn seek_back(&mut self, len: usize) -> Result<()> {
        self.source
            .seek(SeekFrom::Current(-(len as i64)))
            .map_err(|e| {
                ReaderError::storage_with_source(&self.path, "failed to seek back to line start", e)
            })?;
        Ok(())
    }

    /// Appends up to `len` bytes to `buf`, returning how many were read.
    fn fill(&mut self, buf: &mut Vec<u8>, len: usize) -> Result<usize> {
        let read = self
            .source
            .by_ref()
            .take(len as u64)
            .read_to_end(buf)
            .map_err(|e| {
                ReaderError::storage_with_source(&self.path, "failed to read block", e)
            })?;
        Ok(read)
    }
}

/// Length of the longest prefix of `data` that ends at a line break and
/// holds at least one record.
fn split_point(data: &[u8]) -> Option<usize> {
    let end = data.iter().rposition(|&b| b == b'\n')? + 1;
    data[..end]
        .iter()
        .any(|b| !b.is_ascii_whitespace())
        .then_some(end)
}
