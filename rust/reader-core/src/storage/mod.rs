// rust/reader-core/src/storage/mod.rs

//! File access for source and cache files.
//!
//! Readers never touch `std::fs` directly; they go through a
//! [`StorageBackend`] so tests can substitute an in-memory backend and so
//! large sources can be memory-mapped transparently.
//!
//! # Example
//!
//! ```no_run
//! use reader_core::config::StorageConfig;
//! use reader_core::storage::{LocalStorage, StorageBackend};
//! use std::io::Read;
//! use std::path::Path;
//!
//! let storage = LocalStorage::new(&StorageConfig::default()).unwrap();
//! let mut reader = storage.open_read(Path::new("train.libsvm")).unwrap();
//! let head = reader.read_range(0, 4096).unwrap();
//! ```

mod local;
mod traits;

pub use local::LocalStorage;
pub use traits::{ObjectMeta, StorageBackend, StorageReader, StorageWriter};
