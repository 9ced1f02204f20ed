// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding module - turns text into vectors
//!
//! This module provides the embedding providers and the chunker used to split
//! documents before they are embedded.

pub mod chunker;
pub mod provider;

pub use chunker::{ChunkConfig, EmbeddingChunker, TextChunk};
pub use provider::{
    provider_from_config, CommandProvider, EmbeddingProvider, EmbeddingProviderConfig,
    FastEmbedder, HashEmbedder, DEFAULT_EMBEDDING_DIM,
};
