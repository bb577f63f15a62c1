//! Similarity index over chunk embeddings.

use std::collections::HashMap;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{VizError, VizResult};

/// How query and stored vectors are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl DistanceMetric {
    /// Similarity score; higher is nearer for every metric.
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        let a = ArrayView1::from(a);
        let b = ArrayView1::from(b);
        match self {
            DistanceMetric::DotProduct => a.dot(&b),
            DistanceMetric::Cosine => {
                let norm = a.dot(&a).sqrt() * b.dot(&b).sqrt();
                if norm < 1e-10 {
                    0.0
                } else {
                    a.dot(&b) / norm
                }
            }
            DistanceMetric::Euclidean => {
                let diff = &a - &b;
                -diff.dot(&diff).sqrt()
            }
        }
    }
}

/// One query hit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredId {
    pub doc_id: String,
    pub score: f32,
}

/// Stored vector together with its first-insertion sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub doc_id: String,
    pub seq: u64,
    pub vector: Vec<f32>,
}

/// A similarity index keyed by doc_id.
pub trait VectorIndex: Send + Sync {
    /// Inserts or replaces the vector for `doc_id`.
    fn upsert(&mut self, doc_id: &str, vector: Vec<f32>) -> VizResult<()>;

    /// Removes `doc_id`; returns whether it was present.
    fn remove(&mut self, doc_id: &str) -> bool;

    fn get(&self, doc_id: &str) -> Option<Vec<f32>>;

    /// The `k` nearest ids, best first.
    fn query(&self, vector: &[f32], k: usize) -> Vec<ScoredId>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dimension(&self) -> usize;

    fn metric(&self) -> DistanceMetric;

    /// All entries in insertion order.
    fn entries(&self) -> Vec<IndexEntry>;
}

/// Exact search over every stored vector.
///
/// Ties are broken by first-insertion sequence, earliest first. Re-upserting
/// an existing id keeps its original sequence.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    metric: DistanceMetric,
    entries: HashMap<String, IndexEntry>,
    next_seq: u64,
}

impl FlatIndex {
    pub fn new(dimension: usize, metric: DistanceMetric) -> Self {
        Self {
            dimension,
            metric,
            entries: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl VectorIndex for FlatIndex {
    fn upsert(&mut self, doc_id: &str, vector: Vec<f32>) -> VizResult<()> {
        if vector.len() != self.dimension {
            return Err(VizError::Ingestion {
                source_id: doc_id.to_string(),
                reason: format!(
                    "vector has dimension {}, index expects {}",
                    vector.len(),
                    self.dimension
                ),
            });
        }

        match self.entries.get_mut(doc_id) {
            Some(entry) => entry.vector = vector,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(
                    doc_id.to_string(),
                    IndexEntry {
                        doc_id: doc_id.to_string(),
                        seq,
                        vector,
                    },
                );
            }
        }
        Ok(())
    }

    fn remove(&mut self, doc_id: &str) -> bool {
        self.entries.remove(doc_id).is_some()
    }

    fn get(&self, doc_id: &str) -> Option<Vec<f32>> {
        self.entries.get(doc_id).map(|e| e.vector.clone())
    }

    fn query(&self, vector: &[f32], k: usize) -> Vec<ScoredId> {
        if k == 0 || vector.len() != self.dimension {
            return Vec::new();
        }

        let mut scored: Vec<(f32, u64, &str)> = self
            .entries
            .values()
            .map(|e| (self.metric.score(vector, &e.vector), e.seq, e.doc_id.as_str()))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        scored
            .into_iter()
            .take(k)
            .map(|(score, _, doc_id)| ScoredId {
                doc_id: doc_id.to_string(),
                score,
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn entries(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self.entries.values().cloned().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_scores() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((DistanceMetric::Cosine.score(&a, &a) - 1.0).abs() < 1e-6);
        assert!(DistanceMetric::Cosine.score(&a, &b).abs() < 1e-6);
        assert_eq!(DistanceMetric::Cosine.score(&a, &[0.0, 0.0]), 0.0);
        assert!((DistanceMetric::Euclidean.score(&a, &b) + 2f32.sqrt()).abs() < 1e-6);
        assert_eq!(DistanceMetric::DotProduct.score(&[2.0, 3.0], &[4.0, 5.0]), 23.0);
    }

    #[test]
    fn test_query_orders_by_score() {
        let mut index = FlatIndex::new(2, DistanceMetric::Cosine);
        index.upsert("x", vec![1.0, 0.0]).unwrap();
        index.upsert("y", vec![0.0, 1.0]).unwrap();
        index.upsert("xy", vec![1.0, 1.0]).unwrap();

        let hits = index.query(&[1.0, 0.1], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].doc_id, "x");
        assert_eq!(hits[1].doc_id, "xy");
    }

    #[test]
    fn test_ties_go_to_earliest_insertion() {
        let mut index = FlatIndex::new(2, DistanceMetric::Cosine);
        index.upsert("b", vec![1.0, 0.0]).unwrap();
        index.upsert("a", vec![1.0, 0.0]).unwrap();
        index.upsert("c", vec![1.0, 0.0]).unwrap();
        // Re-upserting keeps the original position.
        index.upsert("b", vec![2.0, 0.0]).unwrap();

        let ids: Vec<String> = index.query(&[1.0, 0.0], 3).into_iter().map(|h| h.doc_id).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(index.len(), 3);
        assert_eq!(index.entries()[0].vector, vec![2.0, 0.0]);
    }

    #[test]
    fn test_dimension_mismatch_is_ingestion_error() {
        let mut index = FlatIndex::new(3, DistanceMetric::Cosine);
        let err = index.upsert("bad", vec![1.0]).unwrap_err();
        assert!(matches!(err, VizError::Ingestion { .. }));
        assert!(index.is_empty());
        assert!(index.query(&[1.0], 1).is_empty());
    }

    #[test]
    fn test_metric_serde_names() {
        assert_eq!(serde_json::to_string(&DistanceMetric::Cosine).unwrap(), "\"cosine\"");
        let m: DistanceMetric = serde_json::from_str("\"dot_product\"").unwrap();
        assert_eq!(m, DistanceMetric::DotProduct);
    }
}
