// rust/reader-core/src/storage/traits.rs

//! Storage abstraction traits used by the readers and the binary cache.

use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::Result;

/// Metadata about a stored file.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Size of the file in bytes.
    pub size: u64,
    /// Last modification time, if available.
    pub modified: Option<std::time::SystemTime>,
}

/// A handle for reading from storage.
///
/// The on-disk reader's producer owns one of these for the lifetime of the
/// pipeline and rewinds it with `Seek` on every reset.
pub trait StorageReader: Read + Seek + Send {
    /// Returns the total size of the file in bytes.
    fn size(&self) -> u64;

    /// Reads up to `length` bytes starting at `start`.
    ///
    /// The returned buffer is shorter than `length` only when the range runs
    /// past the end of the file. The cursor position afterwards is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking or reading fails.
    fn read_range(&mut self, start: u64, length: usize) -> Result<Vec<u8>>;
}

/// A handle for writing to storage.
pub trait StorageWriter: Write + Send {
    /// Finishes the write operation, ensuring all data is persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if flushing or syncing fails.
    fn finish(self: Box<Self>) -> Result<()>;
}

/// The storage backend trait.
///
/// This trait is object-safe and is shared as `Arc<dyn StorageBackend>`
/// between a reader and its background producer.
pub trait StorageBackend: Send + Sync {
    /// Checks if a file exists at the given path.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Retrieves metadata for a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or metadata cannot be read.
    fn metadata(&self, path: &Path) -> Result<ObjectMeta>;

    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist or cannot be opened.
    fn open_read(&self, path: &Path) -> Result<Box<dyn StorageReader>>;

    /// Opens a file for writing, truncating any existing content.
    fn open_write(&self, path: &Path) -> Result<Box<dyn StorageWriter>>;

    /// Deletes a file.
    fn delete(&self, path: &Path) -> Result<()>;

    /// Renames a file, replacing the destination if it exists.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;
}
