// SPDX-License-Identifier: MIT OR Apache-2.0

//! Batch ingestion of text files.
//!
//! Files are read and chunked in parallel and handed over a bounded channel
//! to a single consumer, which embeds and stores them one file at a time
//! through [`EmbeddingService::store_chunks`]. Files are stored in the order
//! they finish chunking; the chunks of one file stay contiguous.

pub mod scanner;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::embedding::{EmbeddingChunker, TextChunk};
use crate::errors::ServiceError;
use crate::service::EmbeddingService;

pub use scanner::FileScanner;

/// Files read and chunked ahead of the store loop.
const PIPELINE_DEPTH: usize = 64;

/// Why a file produced no records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TooLarge,
    Unreadable,
    Empty,
}

/// A file that was not ingested.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Summary of an ingestion run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub files_scanned: usize,
    pub files_ingested: usize,
    pub chunks_stored: usize,
    pub skipped: Vec<SkippedFile>,
}

enum PreparedFile {
    Chunked { path: PathBuf, chunks: Vec<TextChunk> },
    Skipped(SkippedFile),
}

/// Walks `path`, chunks every text file and stores the chunks.
///
/// Store or model failures abort the run; per-file read problems are
/// reported in [`IngestReport::skipped`].
pub fn ingest_path(
    service: &EmbeddingService,
    chunker: &EmbeddingChunker,
    path: &Path,
    show_progress: bool,
) -> Result<IngestReport> {
    let files = FileScanner::new(path).list_files()?;
    tracing::debug!(files = files.len(), root = %path.display(), "scanned files");

    let mut report = IngestReport {
        files_scanned: files.len(),
        ..Default::default()
    };

    let pb = if show_progress {
        let pb = ProgressBar::new(files.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} files | Embedding {msg}")
                .expect("valid progress bar template")
                .progress_chars("##."),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    // Readers run ahead of the embedder by at most PIPELINE_DEPTH files.
    let (tx, rx) = mpsc::sync_channel::<PreparedFile>(PIPELINE_DEPTH);
    let mut store_error: Option<ServiceError> = None;

    // The store loop stays on this thread so it never waits on a rayon worker.
    std::thread::scope(|s| {
        s.spawn(|| {
            // Sending fails once the store loop has bailed out; that ends the walk.
            let _ = files
                .par_iter()
                .try_for_each_with(tx, |tx, file| tx.send(prepare_file(chunker, file)));
        });

        for file in rx {
            match file {
                PreparedFile::Chunked { path, chunks } => {
                    let name = path.to_string_lossy().to_string();
                    pb.set_message(name.clone());
                    match service.store_chunks(&name, &chunks) {
                        Ok(ids) if ids.is_empty() => report.skipped.push(SkippedFile {
                            path: name,
                            reason: SkipReason::Empty,
                        }),
                        Ok(ids) => {
                            report.files_ingested += 1;
                            report.chunks_stored += ids.len();
                        }
                        Err(err) => {
                            store_error = Some(err);
                            break;
                        }
                    }
                }
                PreparedFile::Skipped(skipped) => report.skipped.push(skipped),
            }
            pb.inc(1);
        }
    });
    pb.finish_and_clear();

    if let Some(err) = store_error {
        return Err(err.into());
    }

    tracing::info!(
        files = report.files_ingested,
        chunks = report.chunks_stored,
        skipped = report.skipped.len(),
        "ingestion complete"
    );
    Ok(report)
}

fn prepare_file(chunker: &EmbeddingChunker, path: &Path) -> PreparedFile {
    let name = path.to_string_lossy().to_string();

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!(path = %name, error = %e, "skipping unreadable file");
            return PreparedFile::Skipped(SkippedFile {
                path: name,
                reason: SkipReason::Unreadable,
            });
        }
    };

    if chunker.is_file_too_large(&content) {
        tracing::warn!(
            path = %name,
            bytes = content.len(),
            limit = chunker.config().max_file_bytes,
            "skipping file over size limit"
        );
        return PreparedFile::Skipped(SkippedFile {
            path: name,
            reason: SkipReason::TooLarge,
        });
    }

    PreparedFile::Chunked {
        path: path.to_path_buf(),
        chunks: chunker.chunk_text(&content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::embedding::{ChunkConfig, HashEmbedder};
    use crate::store::{EmbeddingRecord, MemoryStore, RecordMetadata, SearchHit, VectorStore};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn service() -> EmbeddingService {
        EmbeddingService::new(
            Box::new(HashEmbedder::new(32)),
            Box::new(MemoryStore::new(32)),
            &SearchConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn ingests_directory_with_metadata() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "x".repeat(25)).unwrap();
        fs::write(dir.path().join("b.md"), "short note").unwrap();

        let service = service();
        let chunker = EmbeddingChunker::new(ChunkConfig::new(10, 2).unwrap());
        let report = ingest_path(&service, &chunker, dir.path(), false).unwrap();

        // a.txt: ceil((25 - 2) / 8) = 3 chunks; b.md: 1 chunk
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.files_ingested, 2);
        assert_eq!(report.chunks_stored, 4);
        assert!(report.skipped.is_empty());

        let records = service.records().unwrap();
        let a_path = dir.path().join("a.txt").to_string_lossy().to_string();
        let a_chunks: Vec<_> = records
            .iter()
            .filter(|r| r.metadata.filename.as_deref() == Some(a_path.as_str()))
            .collect();
        assert_eq!(a_chunks.len(), 3);
        // Chunks of one file are stored contiguously and in order
        for (i, record) in a_chunks.iter().enumerate() {
            assert_eq!(record.metadata.chunk_number, Some(i as u32));
            assert_eq!(record.id, a_chunks[0].id + i as u64);
        }
        assert!(records.iter().any(|r| r.text == "short note"));
    }

    #[test]
    fn ingests_more_files_than_pipeline_depth() {
        let dir = TempDir::new().unwrap();
        let total = PIPELINE_DEPTH * 2 + 5;
        for i in 0..total {
            fs::write(dir.path().join(format!("note{i:03}.txt")), format!("note number {i}")).unwrap();
        }

        let service = service();
        let chunker = EmbeddingChunker::new(ChunkConfig::default());
        let report = ingest_path(&service, &chunker, dir.path(), false).unwrap();

        assert_eq!(report.files_ingested, total);
        assert_eq!(report.chunks_stored, total);
        assert_eq!(service.count().unwrap(), total as u64);
    }

    /// Accepts a fixed number of inserts, then fails.
    struct FlakyStore {
        inner: MemoryStore,
        budget: AtomicUsize,
    }

    impl VectorStore for FlakyStore {
        fn backend(&self) -> &'static str {
            "flaky"
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }

        fn insert(&self, text: &str, vector: &[f32], metadata: &RecordMetadata) -> anyhow::Result<u64> {
            if self.budget.fetch_sub(1, Ordering::SeqCst) == 0 {
                self.budget.store(0, Ordering::SeqCst);
                anyhow::bail!("disk full");
            }
            self.inner.insert(text, vector, metadata)
        }

        fn search(&self, vector: &[f32], k: usize) -> anyhow::Result<Vec<SearchHit>> {
            self.inner.search(vector, k)
        }

        fn list(&self) -> anyhow::Result<Vec<EmbeddingRecord>> {
            self.inner.list()
        }

        fn count(&self) -> anyhow::Result<u64> {
            self.inner.count()
        }
    }

    #[test]
    fn store_failure_stops_ingestion() {
        let dir = TempDir::new().unwrap();
        for i in 0..PIPELINE_DEPTH * 3 {
            fs::write(dir.path().join(format!("f{i:03}.txt")), format!("file {i}")).unwrap();
        }

        let service = EmbeddingService::new(
            Box::new(HashEmbedder::new(32)),
            Box::new(FlakyStore {
                inner: MemoryStore::new(32),
                budget: AtomicUsize::new(3),
            }),
            &SearchConfig::default(),
        )
        .unwrap();
        let chunker = EmbeddingChunker::new(ChunkConfig::default());

        let err = ingest_path(&service, &chunker, dir.path(), false).unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert_eq!(service.count().unwrap(), 3);
    }

    #[test]
    fn reports_skipped_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("big.txt"), "y".repeat(200)).unwrap();
        fs::write(dir.path().join("blank.txt"), "   \n\n").unwrap();
        fs::write(dir.path().join("binary.txt"), [0xff_u8, 0xfe, 0x00]).unwrap();

        let service = service();
        let chunker =
            EmbeddingChunker::new(ChunkConfig::new(50, 5).unwrap().with_max_file_bytes(100));
        let report = ingest_path(&service, &chunker, dir.path(), false).unwrap();

        assert_eq!(report.files_ingested, 0);
        let mut reasons: Vec<SkipReason> = report.skipped.iter().map(|s| s.reason.clone()).collect();
        reasons.sort_by_key(|r| format!("{:?}", r));
        assert_eq!(
            reasons,
            vec![SkipReason::Empty, SkipReason::TooLarge, SkipReason::Unreadable]
        );
        assert_eq!(service.count().unwrap(), 0);
    }
}
