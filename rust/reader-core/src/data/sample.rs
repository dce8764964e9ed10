// rust/reader-core/src/data/sample.rs

use serde::{Deserialize, Serialize};

/// One `(field, feature, value)` triple of a sparse row.
///
/// libsvm and CSV sources have no field concept and always use field `0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub field: u32,
    pub index: u32,
    pub value: f32,
}

impl Feature {
    pub fn new(field: u32, index: u32, value: f32) -> Self {
        Self { field, index, value }
    }
}

/// A labeled sparse row. Features keep the order they were parsed in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseRow {
    pub label: Option<f32>,
    pub features: Vec<Feature>,
}

impl SparseRow {
    pub fn new(label: Option<f32>) -> Self {
        Self {
            label,
            features: Vec::new(),
        }
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// An ordered sequence of sparse rows handed to the consumer per `sample`.
///
/// A batch is only ever mutated by the reader that owns it. Rows are
/// appended in source order and never reordered afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleBatch {
    rows: Vec<SparseRow>,
    has_label: bool,
}

impl SampleBatch {
    pub fn new(has_label: bool) -> Self {
        Self {
            rows: Vec::new(),
            has_label,
        }
    }

    pub fn with_capacity(has_label: bool, capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            has_label,
        }
    }

    pub fn has_label(&self) -> bool {
        self.has_label
    }

    pub fn set_has_label(&mut self, has_label: bool) {
        self.has_label = has_label;
    }

    /// Appends a parsed row.
    pub fn push(&mut self, row: SparseRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[SparseRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&SparseRow> {
        self.rows.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SparseRow> {
        self.rows.iter()
    }

    /// Total number of feature triples across all rows.
    pub fn num_features(&self) -> usize {
        self.rows.iter().map(SparseRow::len).sum()
    }

    /// Drops rows but keeps the allocation for reuse.
    pub fn clear(&mut self) {
        self.rows.clear();
    }

    /// Shrinks the batch to its first `len` rows.
    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    /// Drops rows and frees the allocation.
    pub fn release(&mut self) {
        self.rows = Vec::new();
    }

    pub(crate) fn into_rows(self) -> Vec<SparseRow> {
        self.rows
    }
}

impl<'a> IntoIterator for &'a SampleBatch {
    type Item = &'a SparseRow;
    type IntoIter = std::slice::Iter<'a, SparseRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: f32, features: &[(u32, u32, f32)]) -> SparseRow {
        SparseRow {
            label: Some(label),
            features: features
                .iter()
                .map(|&(f, i, v)| Feature::new(f, i, v))
                .collect(),
        }
    }

    #[test]
    fn test_push_preserves_order() {
        let mut batch = SampleBatch::new(true);
        batch.push(row(1.0, &[(0, 3, 0.5)]));
        batch.push(row(0.0, &[(0, 1, 1.0), (0, 7, 2.0)]));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.row(0).unwrap().label, Some(1.0));
        assert_eq!(batch.row(1).unwrap().features[1].index, 7);
        assert_eq!(batch.num_features(), 3);
    }

    #[test]
    fn test_truncate_and_release() {
        let mut batch = SampleBatch::with_capacity(false, 16);
        for i in 0..10 {
            batch.push(SparseRow {
                label: None,
                features: vec![Feature::new(0, i, 1.0)],
            });
        }

        batch.truncate(4);
        assert_eq!(batch.len(), 4);
        assert_eq!(batch.rows()[3].features[0].index, 3);

        batch.release();
        assert!(batch.is_empty());
        assert_eq!(batch.rows.capacity(), 0);
        assert!(!batch.has_label());
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut batch = SampleBatch::with_capacity(true, 8);
        batch.push(row(1.0, &[]));
        batch.clear();
        assert!(batch.is_empty());
        assert!(batch.rows.capacity() >= 8);
    }

    #[test]
    fn test_iteration() {
        let mut batch = SampleBatch::new(true);
        batch.push(row(1.0, &[(1, 2, 3.0)]));
        batch.push(row(-1.0, &[(4, 5, 6.0)]));

        let labels: Vec<_> = (&batch).into_iter().map(|r| r.label.unwrap()).collect();
        assert_eq!(labels, vec![1.0, -1.0]);
    }
}
