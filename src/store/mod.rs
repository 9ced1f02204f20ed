// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector store adapters.
//!
//! A [`VectorStore`] keeps append-only embedding records and answers exact
//! nearest-neighbor queries by squared Euclidean distance. Two backends are
//! provided: [`MemoryStore`] for process-lifetime storage and [`SqliteStore`]
//! for a persistent database file.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use serde::Serialize;

use crate::config::{StoreBackend, StoreConfig};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Optional provenance of a stored text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordMetadata {
    /// Source file, for texts stored by ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Position of the chunk within its source file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_number: Option<u32>,
    /// Unix timestamp (seconds) when the record was stored.
    pub created_at: i64,
}

/// A stored text and its vector.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRecord {
    /// Sequential identifier, starting at 0.
    pub id: u64,
    pub text: String,
    #[serde(skip_serializing)]
    pub vector: Vec<f32>,
    #[serde(flatten)]
    pub metadata: RecordMetadata,
}

/// A search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub record: EmbeddingRecord,
    /// Squared Euclidean distance to the query vector.
    pub distance: f32,
}

/// Storage and exact search over embedding records.
pub trait VectorStore: Send + Sync {
    /// Short backend name ("memory", "sqlite").
    fn backend(&self) -> &'static str;

    /// Length every stored vector must have.
    fn dimension(&self) -> usize;

    /// Appends a record and returns its id.
    fn insert(&self, text: &str, vector: &[f32], metadata: &RecordMetadata) -> Result<u64>;

    /// Returns up to `k` records ordered by increasing distance to `query`.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Returns every record in id order.
    fn list(&self) -> Result<Vec<EmbeddingRecord>>;

    /// Number of stored records.
    fn count(&self) -> Result<u64>;
}

/// Opens the backend selected by the store configuration.
pub fn open_store(config: &StoreConfig, dimension: usize, model_id: &str) -> Result<Box<dyn VectorStore>> {
    let store: Box<dyn VectorStore> = match config.backend() {
        StoreBackend::Memory => Box::new(MemoryStore::new(dimension)),
        StoreBackend::Sqlite => Box::new(SqliteStore::open(config.path(), dimension, model_id)?),
    };
    tracing::debug!(backend = store.backend(), dimension, "vector store ready");
    Ok(store)
}

/// Squared Euclidean distance between two vectors of equal length.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Errors with a uniform message when a vector has the wrong length.
pub(crate) fn check_dimension(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        anyhow::bail!(
            "Vector dimension mismatch: expected {}, got {}",
            expected,
            vector.len()
        );
    }
    Ok(())
}

/// Sorts hits by distance, then id, and keeps the first `k`.
pub(crate) fn rank_hits(mut hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.record.id.cmp(&b.record.id))
    });
    hits.truncate(k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_squared_l2() {
        assert_eq!(squared_l2(&[1.0, 2.0], &[1.0, 2.0]), 0.0);
        assert_eq!(squared_l2(&[0.0, 0.0], &[3.0, 4.0]), 25.0);
    }

    #[test]
    fn test_check_dimension() {
        assert!(check_dimension(3, &[0.0; 3]).is_ok());
        let err = check_dimension(3, &[0.0; 2]).unwrap_err();
        assert!(err.to_string().contains("expected 3, got 2"));
    }

    #[test]
    fn test_rank_hits_orders_by_distance_then_id() {
        let hit = |id: u64, distance: f32| SearchHit {
            record: EmbeddingRecord {
                id,
                text: id.to_string(),
                vector: Vec::new(),
                metadata: RecordMetadata::default(),
            },
            distance,
        };

        let ranked = rank_hits(vec![hit(2, 0.5), hit(0, 0.9), hit(1, 0.5), hit(3, 0.1)], 3);
        let ids: Vec<u64> = ranked.iter().map(|h| h.record.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        // NaN distances (e.g. from infinite components) sort last
        let ranked = rank_hits(
            vec![hit(0, f32::NAN), hit(1, f32::INFINITY), hit(2, 0.2), hit(3, f32::NAN)],
            4,
        );
        let ids: Vec<u64> = ranked.iter().map(|h| h.record.id).collect();
        assert_eq!(ids, vec![2, 1, 0, 3]);
    }
}
