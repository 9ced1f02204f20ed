// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration file support for vecstash
//!
//! Loads configuration from .vecstashrc.toml in current directory or ~/.config/vecstash/config.toml

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::embedding::chunker::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_FILE_BYTES};
use crate::embedding::provider::DEFAULT_EMBEDDING_DIM;

/// Default database location, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = ".vecstash/embeddings.sqlite";

/// Vector store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Records live for the lifetime of the process
    #[default]
    Memory,
    /// Records persist in a SQLite database file
    Sqlite,
}

/// Embedding provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderType {
    /// fastembed all-MiniLM-L6-v2
    #[default]
    Builtin,
    /// External command reading JSON on stdin
    Command,
    /// Deterministic feature hashing (no model)
    Hash,
}

/// HTTP server configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub host: Option<String>,
    /// Port to listen on
    pub port: Option<u16>,
}

impl ServerConfig {
    /// Get host (defaults to 0.0.0.0)
    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or("0.0.0.0")
    }

    /// Get port (defaults to 5000)
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(5000)
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend (memory, sqlite)
    pub backend: Option<StoreBackend>,
    /// Database path for the sqlite backend
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Get backend (defaults to Memory)
    pub fn backend(&self) -> StoreBackend {
        self.backend.unwrap_or_default()
    }

    /// Get database path (defaults to .vecstash/embeddings.sqlite)
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH))
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider type (builtin, command, hash)
    pub provider: Option<EmbeddingProviderType>,
    /// Model identifier for the embedding provider
    pub model: Option<String>,
    /// Command to execute for command provider
    pub command: Option<String>,
    /// Vector length for the command and hash providers
    pub dimension: Option<usize>,
    /// Number of characters per chunk
    pub chunk_size: Option<usize>,
    /// Number of overlapping characters between chunks
    pub chunk_overlap: Option<usize>,
    /// Maximum file size in bytes to ingest
    pub max_file_bytes: Option<usize>,
}

impl EmbeddingConfig {
    /// Get provider type (defaults to Builtin)
    pub fn provider(&self) -> EmbeddingProviderType {
        self.provider.unwrap_or_default()
    }

    /// Get model identifier (defaults to "all-minilm-l6-v2")
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or("all-minilm-l6-v2")
    }

    /// Get command (defaults to "embedder")
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or("embedder")
    }

    /// Get dimension (defaults to 384)
    pub fn dimension(&self) -> usize {
        self.dimension.unwrap_or(DEFAULT_EMBEDDING_DIM)
    }

    /// Get chunk size (defaults to 1000)
    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    /// Get chunk overlap (defaults to 200)
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP)
    }

    /// Get max file bytes (defaults to 2MB)
    pub fn max_file_bytes(&self) -> usize {
        self.max_file_bytes.unwrap_or(DEFAULT_MAX_FILE_BYTES)
    }
}

/// Search configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of results when a request does not specify k
    pub default_k: Option<usize>,
    /// Largest k a request may ask for
    pub max_k: Option<usize>,
}

impl SearchConfig {
    /// Get default k (defaults to 5)
    pub fn default_k(&self) -> usize {
        self.default_k.unwrap_or(5)
    }

    /// Get max k (defaults to 100)
    pub fn max_k(&self) -> usize {
        self.max_k.unwrap_or(100)
    }
}

/// Configuration loaded from .vecstashrc.toml or ~/.config/vecstash/config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Vector store configuration
    pub store: StoreConfig,

    /// Embedding configuration
    pub embeddings: EmbeddingConfig,

    /// Search configuration
    pub search: SearchConfig,
}

impl Config {
    /// Load configuration from files
    ///
    /// Precedence (highest to lowest):
    /// 1. .vecstashrc.toml in current directory
    /// 2. ~/.config/vecstash/config.toml
    pub fn load() -> Self {
        if let Some(config) = Self::load_from_path(Path::new(".vecstashrc.toml")) {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("vecstash").join("config.toml");
            if let Some(config) = Self::load_from_path(&config_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Load configuration from an explicit file. Unlike [`Config::load`],
    /// a missing or invalid file is an error.
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn load_from_path(path: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        match Self::parse(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "loaded config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse config; ignoring");
                None
            }
        }
    }

    /// Apply the `PORT` environment variable over the configured port.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(raw) = std::env::var("PORT") {
            let value = raw.trim();
            if !value.is_empty() {
                let port = value
                    .parse::<u16>()
                    .with_context(|| format!("Invalid PORT value: {}", value))?;
                self.server.port = Some(port);
            }
        }
        Ok(())
    }

    /// Get the server configuration
    pub fn server(&self) -> &ServerConfig {
        &self.server
    }

    /// Get the store configuration
    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    /// Get the embedding configuration
    pub fn embeddings(&self) -> &EmbeddingConfig {
        &self.embeddings
    }

    /// Get the search configuration
    pub fn search(&self) -> &SearchConfig {
        &self.search
    }
}
