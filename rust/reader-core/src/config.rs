// rust/reader-core/src/config.rs

//! Configuration management for the sample readers.
//!
//! This module provides configuration parsing from TOML files, environment
//! variable overrides, and validation of configuration values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ReaderError, Result};

// Top-level reader configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub reader: ReaderSection,
    pub on_disk: OnDiskConfig,
    pub cache: CacheConfig,
    pub detect: DetectConfig,
    pub storage: StorageConfig,
}

/// Which sampling strategy to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderKind {
    /// Load the whole source into memory.
    #[default]
    InMemory,
    /// Stream the source from disk block by block.
    OnDisk,
}

/// Options shared by both reader kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSection {
    /// Strategy: "in_memory" or "on_disk".
    pub kind: ReaderKind,
    /// Rows per `sample` call (in-memory reader only).
    pub batch_size: usize,
    /// Whether to shuffle rows (rejected by the on-disk reader).
    pub shuffle: bool,
    /// Optional seed for reproducible shuffling.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

// On-disk streaming options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OnDiskConfig {
    // Bytes read from the source per block.
    pub block_size: usize,
    // Worker threads in the pool hosting the background reader.
    pub pool_threads: usize,
}

// Binary cache options (in-memory reader only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    // Whether to read and write the binary cache.
    pub enabled: bool,
    // Extension appended to the source file name.
    pub extension: String,
    // Number of leading source bytes hashed into the cache fingerprint.
    pub fingerprint_bytes: usize,
    // Whether to use atomic writes (write to temp then rename).
    pub atomic_writes: bool,
}

// Format detection options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    // Maximum number of bytes inspected to classify the source.
    pub prefix_bytes: usize,
    // CSV has no structural label cue, so label presence is configured.
    pub csv_has_label: bool,
}

// Storage configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    // Base path for relative source paths.
    pub base_path: PathBuf,
    // Buffer size in bytes for I/O operations.
    pub buffer_size: usize,
    // Whether to use memory-mapped I/O.
    pub use_mmap: bool,
    // File size threshold (bytes) above which to use mmap.
    pub mmap_threshold: u64,
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            kind: ReaderKind::InMemory,
            batch_size: 256,
            shuffle: false,
            seed: None,
        }
    }
}

impl Default for OnDiskConfig {
    fn default() -> Self {
        Self {
            block_size: 8 * 1024 * 1024, // 8 MB
            pool_threads: 1,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extension: "bin".to_string(),
            fingerprint_bytes: 1024 * 1024, // 1 MB
            atomic_writes: true,
        }
    }
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            prefix_bytes: 64 * 1024, // 64 KB
            csv_has_label: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("."),
            buffer_size: 64 * 1024, // 64 KB
            use_mmap: true,
            mmap_threshold: 1024 * 1024, // 1 MB
        }
    }
}

impl FromStr for ReaderConfig {
    type Err = ReaderError;

    /// Parse configuration from a TOML string.
    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| ReaderError::config_with_source("failed to parse TOML config", e))
    }
}

impl ReaderConfig {
    // Load configuration from a TOML file.
    //
    // # Errors
    //
    // Returns an error if the file cannot be read, parsed, or is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReaderError::storage_with_source(path, "failed to read config file", e)
        })?;
        let config: Self = content.parse()?;
        config.validate()?;
        Ok(config)
    }

    // Apply environment variable overrides.
    //
    // Environment variables are prefixed with `SPR_` and use underscores
    // to separate nested fields. For example:
    // - `SPR_READER_KIND` overrides `reader.kind` ("in_memory" or "on_disk")
    // - `SPR_READER_BATCH_SIZE` overrides `reader.batch_size`
    // - `SPR_ON_DISK_BLOCK_SIZE` overrides `on_disk.block_size`
    // - `SPR_CACHE_ENABLED` overrides `cache.enabled`
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        // Reader overrides
        if let Ok(val) = std::env::var("SPR_READER_KIND") {
            match val.to_lowercase().as_str() {
                "in_memory" | "inmem" => self.reader.kind = ReaderKind::InMemory,
                "on_disk" | "ondisk" => self.reader.kind = ReaderKind::OnDisk,
                _ => {} // ignore invalid values
            }
        }
        if let Ok(val) = std::env::var("SPR_READER_BATCH_SIZE") {
            if let Ok(v) = val.parse() {
                self.reader.batch_size = v;
            }
        }
        if let Ok(val) = std::env::var("SPR_READER_SHUFFLE") {
            if let Ok(v) = val.parse() {
                self.reader.shuffle = v;
            }
        }
        if let Ok(val) = std::env::var("SPR_READER_SEED") {
            if let Ok(v) = val.parse() {
                self.reader.seed = Some(v);
            }
        }

        // On-disk overrides
        if let Ok(val) = std::env::var("SPR_ON_DISK_BLOCK_SIZE") {
            if let Ok(v) = val.parse() {
                self.on_disk.block_size = v;
            }
        }
        if let Ok(val) = std::env::var("SPR_ON_DISK_POOL_THREADS") {
            if let Ok(v) = val.parse() {
                self.on_disk.pool_threads = v;
            }
        }

        // Cache overrides
        if let Ok(val) = std::env::var("SPR_CACHE_ENABLED") {
            if let Ok(v) = val.parse() {
                self.cache.enabled = v;
            }
        }
        if let Ok(val) = std::env::var("SPR_CACHE_EXTENSION") {
            self.cache.extension = val;
        }
        if let Ok(val) = std::env::var("SPR_CACHE_ATOMIC_WRITES") {
            if let Ok(v) = val.parse() {
                self.cache.atomic_writes = v;
            }
        }

        // Detection overrides
        if let Ok(val) = std::env::var("SPR_DETECT_PREFIX_BYTES") {
            if let Ok(v) = val.parse() {
                self.detect.prefix_bytes = v;
            }
        }
        if let Ok(val) = std::env::var("SPR_DETECT_CSV_HAS_LABEL") {
            if let Ok(v) = val.parse() {
                self.detect.csv_has_label = v;
            }
        }

        // Storage overrides
        if let Ok(val) = std::env::var("SPR_STORAGE_BASE_PATH") {
            self.storage.base_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SPR_STORAGE_USE_MMAP") {
            if let Ok(v) = val.parse() {
                self.storage.use_mmap = v;
            }
        }

        self
    }

    // Validate all configuration values.
    //
    // # Errors
    //
    // Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.reader.batch_size == 0 {
            return Err(ReaderError::config(
                "reader.batch_size must be greater than 0",
            ));
        }

        if self.on_disk.block_size == 0 {
            return Err(ReaderError::config(
                "on_disk.block_size must be greater than 0",
            ));
        }

        if self.on_disk.pool_threads == 0 {
            return Err(ReaderError::config(
                "on_disk.pool_threads must be greater than 0",
            ));
        }

        if self.cache.extension.is_empty() || self.cache.extension.contains('/') {
            return Err(ReaderError::config(
                "cache.extension must be a non-empty file extension",
            ));
        }

        if self.cache.fingerprint_bytes == 0 {
            return Err(ReaderError::config(
                "cache.fingerprint_bytes must be greater than 0",
            ));
        }

        if self.detect.prefix_bytes == 0 {
            return Err(ReaderError::config(
                "detect.prefix_bytes must be greater than 0",
            ));
        }

        if self.storage.buffer_size == 0 {
            return Err(ReaderError::config(
                "storage.buffer_size must be greater than 0",
            ));
        }

        Ok(())
    }
}
