// rust/reader-core/src/cache/mod.rs

//! Binary cache of parsed rows for the in-memory reader.
//!
//! Parsing a large text source is the slow part of loading it. After the
//! first successful parse the rows are written next to the source as
//! `<source>.<extension>` and later loads deserialize them directly.
//!
//! # Format
//!
//! ```text
//! +---------------------------+
//! | Header Length (4 bytes)   |  <- u32 little-endian
//! +---------------------------+
//! | Header (bincode)          |  <- CacheHeader
//! +---------------------------+
//! | Payload (bincode)         |  <- Vec<SparseRow>
//! +---------------------------+
//! ```
//!
//! The header records a [`SourceFingerprint`] (size, modification time and a
//! hash of the leading bytes). A cache is only trusted when the fingerprint
//! still matches the source; anything else is treated as a miss.
//!
//! # Example
//!
//! ```no_run
//! use reader_core::cache::{CacheReader, CacheWriter, SourceFingerprint};
//! use reader_core::config::CacheConfig;
//! use reader_core::parser::FileFormat;
//! use reader_core::storage::{LocalStorage, StorageBackend};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::default());
//! let config = CacheConfig::default();
//! let source = Path::new("train.libsvm");
//!
//! let fingerprint = SourceFingerprint::compute(storage.as_ref(), source, config.fingerprint_bytes).unwrap();
//! let writer = CacheWriter::new(storage.clone(), config.clone());
//! writer.write(source, &fingerprint, FileFormat::LibSvm, true, &[]).unwrap();
//!
//! let reader = CacheReader::new(storage, config);
//! let cached = reader.load(source, &fingerprint).unwrap();
//! assert!(cached.rows.is_empty());
//! ```

mod format;
mod reader;
mod writer;

pub use format::{cache_path, CacheHeader, SourceFingerprint};
pub use reader::{CacheReader, CachedRows};
pub use writer::CacheWriter;
