// SPDX-License-Identifier: MIT OR Apache-2.0

//! vecstash - Text embedding and vector search service
//!
//! Serves the HTTP API and provides batch ingestion and search from the
//! command line.

mod cli;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Commands, OutputFormat};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use vecstash::config::{Config, StoreBackend};
use vecstash::embedding::{ChunkConfig, EmbeddingChunker};
use vecstash::http::{build_router, router::shutdown_signal, AppState};
use vecstash::ingest::ingest_path;
use vecstash::output;
use vecstash::service::EmbeddingService;

fn main() -> Result<()> {
    // Initialize tracing with VECSTASH_LOG env var (e.g., VECSTASH_LOG=debug vecstash serve)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("VECSTASH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    match &cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "vecstash", &mut std::io::stdout());
        }
        Commands::Serve { host, port } => {
            let config = load_config(&cli)?;
            let host = host.clone().unwrap_or_else(|| config.server().host().to_string());
            let port = port.unwrap_or_else(|| config.server().port());
            let service = EmbeddingService::from_config(&config)?;

            tokio::runtime::Runtime::new()
                .context("Failed to start async runtime")?
                .block_on(serve(service, &host, port))?;
        }
        Commands::Ingest {
            path,
            chunk_size,
            overlap,
            quiet,
        } => {
            let config = load_config(&cli)?;
            let embeddings = config.embeddings();
            let chunk_config = ChunkConfig::new(
                chunk_size.unwrap_or_else(|| embeddings.chunk_size()),
                overlap.unwrap_or_else(|| embeddings.chunk_overlap()),
            )?
            .with_max_file_bytes(embeddings.max_file_bytes());
            let chunker = EmbeddingChunker::new(chunk_config);

            let service = EmbeddingService::from_config(&config)?;
            if service.backend() == "memory" {
                tracing::warn!("ingesting into the memory backend; records are discarded on exit");
            }

            let report = ingest_path(&service, &chunker, path, !quiet && format == OutputFormat::Text)?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
                OutputFormat::Text => {
                    println!(
                        "{} {} chunks from {} of {} files",
                        "Stored".green().bold(),
                        report.chunks_stored,
                        report.files_ingested,
                        report.files_scanned
                    );
                    for skipped in &report.skipped {
                        println!("  skipped {} ({:?})", skipped.path, skipped.reason);
                    }
                }
            }
        }
        Commands::Search { text, k } => {
            let service = EmbeddingService::from_config(&load_config(&cli)?)?;
            let hits = service.search(text, *k)?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
                OutputFormat::Text => {
                    let use_color = output::use_colors();
                    if hits.is_empty() {
                        println!("No results");
                    }
                    for (i, hit) in hits.iter().enumerate() {
                        println!("{}", output::format_hit(i + 1, hit, use_color));
                    }
                }
            }
        }
        Commands::Texts => {
            let service = EmbeddingService::from_config(&load_config(&cli)?)?;
            let records = service.records()?;

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
                OutputFormat::Text => {
                    let use_color = output::use_colors();
                    for record in &records {
                        println!("{}", output::format_record(record, use_color));
                    }
                    println!("{} texts", records.len());
                }
            }
        }
    }

    Ok(())
}

/// Resolves configuration: file, then `PORT`, then command-line flags.
///
/// The server defaults to the memory backend; the other commands default to
/// SQLite so that ingested records outlive the process.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load(),
    };
    config.apply_env()?;

    if config.store.backend.is_none() && !matches!(cli.command, Commands::Serve { .. }) {
        config.store.backend = Some(StoreBackend::Sqlite);
    }
    if let Some(backend) = cli.backend {
        config.store.backend = Some(backend);
    }
    if let Some(db) = &cli.db {
        config.store.path = Some(db.clone());
    }
    if let Some(provider) = cli.provider {
        config.embeddings.provider = Some(provider);
    }
    Ok(config)
}

async fn serve(service: EmbeddingService, host: &str, port: u16) -> Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    println!(
        "vecstash listening on {} ({} model, {} store, {} texts)",
        format!("http://{addr}").cyan(),
        service.model_id(),
        service.backend(),
        service.count()?
    );
    tracing::info!(%addr, "server started");

    let router = build_router(AppState::new(service));
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Server stopped.");
    Ok(())
}
