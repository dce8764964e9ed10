// rust/reader-core/src/data/mod.rs

//! In-memory representation of parsed training rows.

mod sample;

pub use sample::{Feature, SampleBatch, SparseRow};
