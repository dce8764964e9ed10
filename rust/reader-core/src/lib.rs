// rust/reader-core/src/lib.rs

//! Sparse Sample Reader - Core Library
//!
//! Turns libsvm, libffm and CSV training files into a stream of in-memory
//! sample batches. A consumer pulls batches until a pass is exhausted,
//! rewinds and repeats.
//!
//! Two strategies implement the [`Reader`] contract: [`InMemoryReader`]
//! (whole source in memory, optional shuffling, binary cache) and
//! [`OnDiskReader`] (block streaming with a background producer).

pub mod cache;
pub mod config;
pub mod data;
pub mod error;
pub mod parser;
pub mod pool;
pub mod reader;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{ReaderConfig, ReaderKind};
pub use data::{Feature, SampleBatch, SparseRow};
pub use error::{ReaderError, Result};
pub use parser::{FileFormat, FormatParser, ParserRegistry};
pub use pool::{TaskHandle, ThreadPool};
pub use reader::{Block, InMemoryReader, OnDiskReader, Reader, SampleReader};
pub use storage::{LocalStorage, ObjectMeta, StorageBackend, StorageReader, StorageWriter};
