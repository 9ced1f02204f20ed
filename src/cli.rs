// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI argument parsing using clap

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use vecstash::config::{EmbeddingProviderType, StoreBackend};

/// vecstash - Text embedding and vector search service
///
/// Embeds text with a sentence-embedding model and stores the vectors for
/// nearest-neighbor search, over HTTP or from the command line.
#[derive(Parser, Debug)]
#[command(name = "vecstash")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to .vecstashrc.toml or ~/.config/vecstash/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Vector store backend
    #[arg(long, global = true, value_enum)]
    pub backend: Option<StoreBackend>,

    /// Database path for the sqlite backend
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Embedding provider
    #[arg(long, global = true, value_enum)]
    pub provider: Option<EmbeddingProviderType>,

    /// Output format (text or json)
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to bind (default: 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (default: $PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chunk, embed and store a file or every text file in a directory
    Ingest {
        /// File or directory to ingest
        path: PathBuf,

        /// Characters per chunk
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlapping characters between consecutive chunks
        #[arg(long)]
        overlap: Option<usize>,

        /// Hide the progress bar
        #[arg(short = 'q', long)]
        quiet: bool,
    },

    /// Find the stored texts nearest to a query
    #[command(alias = "s")]
    Search {
        /// Query text
        text: String,

        /// Number of results
        #[arg(short = 'k', long)]
        k: Option<i64>,
    },

    /// List stored texts
    Texts,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
