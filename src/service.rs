// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding service - the single embed/store/search path
//!
//! Both the HTTP handlers and the `ingest` command go through
//! [`EmbeddingService`], so validation and metadata handling are identical
//! regardless of how text arrives. All methods block; async callers run them
//! on the blocking thread pool.

use anyhow::{anyhow, bail};
use std::sync::Mutex;

use crate::config::{Config, SearchConfig};
use crate::embedding::{provider_from_config, EmbeddingProvider, TextChunk};
use crate::errors::{ServiceError, ServiceResult};
use crate::store::{open_store, EmbeddingRecord, RecordMetadata, SearchHit, VectorStore};

/// Result of storing one text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredEmbedding {
    pub id: u64,
    pub dimension: usize,
}

/// Orchestrates an embedding provider and a vector store.
pub struct EmbeddingService {
    provider: Mutex<Box<dyn EmbeddingProvider>>,
    store: Box<dyn VectorStore>,
    model_id: String,
    dimension: usize,
    default_k: usize,
    max_k: usize,
}

impl EmbeddingService {
    /// Wires a provider to a store. Their dimensions must agree.
    pub fn new(
        provider: Box<dyn EmbeddingProvider>,
        store: Box<dyn VectorStore>,
        search: &SearchConfig,
    ) -> anyhow::Result<Self> {
        if provider.dimension() != store.dimension() {
            bail!(
                "Provider {} produces {}-dimensional vectors but the {} store expects {}",
                provider.model_id(),
                provider.dimension(),
                store.backend(),
                store.dimension()
            );
        }

        let model_id = provider.model_id().to_string();
        let dimension = provider.dimension();
        Ok(Self {
            provider: Mutex::new(provider),
            store,
            model_id,
            dimension,
            default_k: search.default_k().max(1),
            max_k: search.max_k().max(1),
        })
    }

    /// Builds the provider and store named by the configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let provider = provider_from_config(config.embeddings())?;
        let store = open_store(config.store(), provider.dimension(), provider.model_id())?;
        Self::new(provider, store, config.search())
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Largest `k` a search accepts.
    pub fn max_k(&self) -> usize {
        self.max_k
    }

    pub fn count(&self) -> ServiceResult<u64> {
        self.store.count().map_err(ServiceError::Store)
    }

    /// Embeds `text` and stores it, returning the new record id.
    pub fn embed_and_store(
        &self,
        text: &str,
        filename: Option<String>,
        chunk_number: Option<u32>,
    ) -> ServiceResult<StoredEmbedding> {
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyText);
        }

        let vector = self
            .with_provider(|provider| provider.embed_one(text))
            .map_err(ServiceError::Embedding)?;
        let metadata = RecordMetadata {
            filename,
            chunk_number,
            created_at: chrono::Utc::now().timestamp(),
        };
        let id = self
            .store
            .insert(text, &vector, &metadata)
            .map_err(ServiceError::Store)?;

        tracing::debug!(id, chars = text.chars().count(), "stored embedding");
        Ok(StoredEmbedding {
            id,
            dimension: vector.len(),
        })
    }

    /// Embeds and stores every non-blank chunk of one file.
    ///
    /// Chunks are embedded in provider-sized batches. Returns the ids of the
    /// stored chunks in order.
    pub fn store_chunks(&self, filename: &str, chunks: &[TextChunk]) -> ServiceResult<Vec<u64>> {
        let chunks: Vec<&TextChunk> = chunks.iter().filter(|c| !c.text.trim().is_empty()).collect();
        let mut ids = Vec::with_capacity(chunks.len());

        let batch_size = self
            .with_provider(|provider| Ok(provider.batch_size()))
            .map_err(ServiceError::Embedding)?
            .max(1);

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .with_provider(|provider| provider.embed_texts(&texts))
                .map_err(ServiceError::Embedding)?;
            if vectors.len() != batch.len() {
                return Err(ServiceError::Embedding(anyhow!(
                    "Model returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }

            let created_at = chrono::Utc::now().timestamp();
            for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                let metadata = RecordMetadata {
                    filename: Some(filename.to_string()),
                    chunk_number: Some(chunk.index),
                    created_at,
                };
                let id = self
                    .store
                    .insert(&chunk.text, vector, &metadata)
                    .map_err(ServiceError::Store)?;
                ids.push(id);
            }
        }

        tracing::debug!(file = filename, stored = ids.len(), "stored chunks");
        Ok(ids)
    }

    /// Finds the stored texts nearest to `text`.
    ///
    /// `k` defaults to the configured default and must lie in `1..=max_k`.
    pub fn search(&self, text: &str, k: Option<i64>) -> ServiceResult<Vec<SearchHit>> {
        if text.trim().is_empty() {
            return Err(ServiceError::EmptyText);
        }
        let k = match k {
            None => self.default_k,
            Some(k) if k >= 1 && k as u64 <= self.max_k as u64 => k as usize,
            Some(k) => {
                return Err(ServiceError::InvalidK {
                    got: k.to_string(),
                    max: self.max_k,
                })
            }
        };

        let query = self
            .with_provider(|provider| provider.embed_one(text))
            .map_err(ServiceError::Embedding)?;
        let hits = self.store.search(&query, k).map_err(ServiceError::Store)?;

        tracing::debug!(k, hits = hits.len(), "search complete");
        Ok(hits)
    }

    /// All stored records in id order.
    pub fn records(&self) -> ServiceResult<Vec<EmbeddingRecord>> {
        self.store.list().map_err(ServiceError::Store)
    }

    fn with_provider<T>(
        &self,
        f: impl FnOnce(&mut dyn EmbeddingProvider) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut provider = self
            .provider
            .lock()
            .map_err(|_| anyhow!("Embedding provider lock poisoned"))?;
        f(&mut **provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{ChunkConfig, EmbeddingChunker, HashEmbedder};
    use crate::store::MemoryStore;

    fn service(dimension: usize) -> EmbeddingService {
        EmbeddingService::new(
            Box::new(HashEmbedder::new(dimension)),
            Box::new(MemoryStore::new(dimension)),
            &SearchConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let result = EmbeddingService::new(
            Box::new(HashEmbedder::new(8)),
            Box::new(MemoryStore::new(16)),
            &SearchConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_embed_and_store_assigns_ids() {
        let service = service(64);
        let first = service.embed_and_store("hello world", None, None).unwrap();
        let second = service.embed_and_store("goodbye world", None, None).unwrap();

        assert_eq!(first, StoredEmbedding { id: 0, dimension: 64 });
        assert_eq!(second.id, 1);
        assert_eq!(service.count().unwrap(), 2);
    }

    #[test]
    fn test_blank_text_rejected() {
        let service = service(16);
        assert!(matches!(
            service.embed_and_store("   \n", None, None),
            Err(ServiceError::EmptyText)
        ));
        assert!(matches!(service.search("", None), Err(ServiceError::EmptyText)));
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_search_finds_matching_text_first() {
        let service = service(256);
        service.embed_and_store("rust borrow checker lifetimes", None, None).unwrap();
        service.embed_and_store("banana bread recipe", None, None).unwrap();
        service.embed_and_store("tomato soup recipe", None, None).unwrap();

        let hits = service.search("banana bread recipe", Some(2)).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.text, "banana bread recipe");
        assert!(hits[0].distance < 1e-6);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_search_k_validation() {
        let service = service(16);
        assert!(matches!(
            service.search("query", Some(0)),
            Err(ServiceError::InvalidK { ref got, max: 100 }) if got == "0"
        ));
        assert_eq!(service.max_k(), 100);
        assert!(matches!(
            service.search("query", Some(101)),
            Err(ServiceError::InvalidK { .. })
        ));
        assert!(service.search("query", None).unwrap().is_empty());
    }

    #[test]
    fn test_store_chunks_records_metadata() {
        let service = service(32);
        let chunker = EmbeddingChunker::new(ChunkConfig::new(10, 2).unwrap());
        let chunks = chunker.chunk_text("one two three four five six seven");

        let ids = service.store_chunks("numbers.txt", &chunks).unwrap();
        assert_eq!(ids.len(), chunks.len());

        let records = service.records().unwrap();
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.id, i as u64);
            assert_eq!(record.metadata.filename.as_deref(), Some("numbers.txt"));
            assert_eq!(record.metadata.chunk_number, Some(i as u32));
            assert_eq!(record.text, chunks[i].text);
        }
    }

    #[test]
    fn test_store_chunks_skips_blank_chunks() {
        let service = service(8);
        let chunks = vec![
            TextChunk { index: 0, start_char: 0, end_char: 3, text: "abc".into() },
            TextChunk { index: 1, start_char: 3, end_char: 6, text: "   ".into() },
            TextChunk { index: 2, start_char: 6, end_char: 9, text: "xyz".into() },
        ];

        let ids = service.store_chunks("f.txt", &chunks).unwrap();
        assert_eq!(ids, vec![0, 1]);
        let numbers: Vec<Option<u32>> = service
            .records()
            .unwrap()
            .iter()
            .map(|r| r.metadata.chunk_number)
            .collect();
        assert_eq!(numbers, vec![Some(0), Some(2)]);
    }
}
