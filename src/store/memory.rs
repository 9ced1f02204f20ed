// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory vector store. Records live as long as the process.

use anyhow::{anyhow, Result};
use std::sync::RwLock;

use super::{check_dimension, rank_hits, squared_l2, EmbeddingRecord, RecordMetadata, SearchHit, VectorStore};

pub struct MemoryStore {
    dimension: usize,
    records: RwLock<Vec<EmbeddingRecord>>,
}

impl MemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(Vec::new()),
        }
    }
}

impl VectorStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn insert(&self, text: &str, vector: &[f32], metadata: &RecordMetadata) -> Result<u64> {
        check_dimension(self.dimension, vector)?;

        let mut records = self
            .records
            .write()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        let id = records.len() as u64;
        records.push(EmbeddingRecord {
            id,
            text: text.to_string(),
            vector: vector.to_vec(),
            metadata: metadata.clone(),
        });
        Ok(id)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        check_dimension(self.dimension, query)?;

        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        let hits = records
            .iter()
            .map(|record| SearchHit {
                distance: squared_l2(query, &record.vector),
                record: record.clone(),
            })
            .collect();
        Ok(rank_hits(hits, k))
    }

    fn list(&self) -> Result<Vec<EmbeddingRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(records.clone())
    }

    fn count(&self) -> Result<u64> {
        let records = self
            .records
            .read()
            .map_err(|_| anyhow!("Memory store lock poisoned"))?;
        Ok(records.len() as u64)
    }
}
