// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text chunker for batch ingestion.
//!
//! This module splits documents into overlapping fixed-size character
//! windows. Sizes are counted in `char`s, so a window never splits a UTF-8
//! sequence.

use anyhow::{bail, Result};

/// Default number of characters per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive chunks.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Maximum file size in bytes for ingestion.
pub const DEFAULT_MAX_FILE_BYTES: usize = 2_000_000;

/// Configuration for the text chunker.
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Number of characters per chunk.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub overlap: usize,
    /// Maximum file size in bytes.
    pub max_file_bytes: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl ChunkConfig {
    /// Creates a new ChunkConfig with the specified parameters.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be greater than 0");
        }
        if overlap >= chunk_size {
            bail!(
                "overlap ({}) must be less than chunk_size ({})",
                overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            overlap,
            ..Default::default()
        })
    }

    /// Sets the maximum file size.
    pub fn with_max_file_bytes(mut self, size: usize) -> Self {
        self.max_file_bytes = size;
        self
    }

    /// Distance between the starts of consecutive chunks.
    pub fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap).max(1)
    }
}

/// A chunk of a document with its character offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of the chunk in the document (0-indexed).
    pub index: u32,
    /// Offset of the first character (inclusive).
    pub start_char: usize,
    /// Offset past the last character (exclusive).
    pub end_char: usize,
    /// The chunk text content.
    pub text: String,
}

/// Splits text into overlapping character windows.
pub struct EmbeddingChunker {
    config: ChunkConfig,
}

impl EmbeddingChunker {
    /// Creates a new chunker with the given configuration.
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    /// Returns the current configuration.
    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// Checks if a file is too large for ingestion.
    pub fn is_file_too_large(&self, content: &str) -> bool {
        content.len() > self.config.max_file_bytes
    }

    /// Splits text into overlapping chunks.
    ///
    /// Algorithm:
    /// ```text
    /// start = 0
    /// step = chunk_size - overlap
    /// loop:
    ///   end = min(start + chunk_size, total_chars)
    ///   emit chars[start..end]
    ///   if end == total_chars: stop
    ///   start += step
    /// ```
    ///
    /// A document of `L` characters yields `ceil((L - overlap) / step)`
    /// chunks when `L > chunk_size`, one chunk when `0 < L <= chunk_size`,
    /// and none when empty.
    pub fn chunk_text(&self, content: &str) -> Vec<TextChunk> {
        if content.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the string.
        let mut boundaries: Vec<usize> = content.char_indices().map(|(idx, _)| idx).collect();
        let total_chars = boundaries.len();
        boundaries.push(content.len());

        let step = self.config.step();
        let mut chunks = Vec::new();
        let mut start = 0_usize;

        loop {
            let end = (start + self.config.chunk_size).min(total_chars);
            chunks.push(TextChunk {
                index: chunks.len() as u32,
                start_char: start,
                end_char: end,
                text: content[boundaries[start]..boundaries[end]].to_string(),
            });

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}
