//! Stepped-histogram ranges built from bucket maps.
use crate::snapshot::BucketMap;

/// Distance between two rendered edges, in bucket keys.
pub const EDGE_STRIDE: i64 = 100;

/// Edges and aligned values for one stepped histogram.
///
/// `edges.len() == values.len() + 1`; `values[i]` spans `edges[i]..edges[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketRange {
    pub edges: Vec<i64>,
    pub values: Vec<i64>,
}

impl BucketRange {
    /// Placeholder range used while a side has no data yet.
    pub fn empty() -> Self {
        Self { edges: vec![0, 1], values: vec![0] }
    }

    /// Build the range for `buckets`.
    ///
    /// Edges run from the smallest key at [`EDGE_STRIDE`] while below
    /// `max_key + EDGE_STRIDE`, then close at `max_key + EDGE_STRIDE`. Each value
    /// is the map entry at its left edge, 0 when absent. When the key span is not
    /// a multiple of the stride the last step is shorter.
    pub fn from_buckets(buckets: &BucketMap) -> Self {
        let (Some((&min_key, _)), Some((&max_key, _))) =
            (buckets.first_key_value(), buckets.last_key_value())
        else {
            return Self::empty();
        };

        let close = max_key + EDGE_STRIDE;
        let mut edges: Vec<i64> = (min_key..close).step_by(EDGE_STRIDE as usize).collect();
        let values = edges.iter().map(|k| buckets.get(k).copied().unwrap_or(0)).collect();
        edges.push(close);
        Self { edges, values }
    }

    /// Largest value, 0 for an all-zero range.
    pub fn peak(&self) -> i64 {
        self.values.iter().copied().max().unwrap_or(0)
    }

    /// Points tracing the outline of the histogram, for line-based renderers.
    pub fn outline(&self) -> Vec<(f64, f64)> {
        let mut pts = Vec::with_capacity(self.values.len() * 2);
        for (i, v) in self.values.iter().enumerate() {
            pts.push((self.edges[i] as f64, *v as f64));
            pts.push((self.edges[i + 1] as f64, *v as f64));
        }
        pts
    }
}
