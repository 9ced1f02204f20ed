// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-based storage for embedding records.
//!
//! Vectors are stored as little-endian `f32` blobs next to their text and
//! metadata. Search is a brute-force scan computing squared Euclidean
//! distance for every row.

use anyhow::{anyhow, bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{check_dimension, rank_hits, squared_l2, EmbeddingRecord, RecordMetadata, SearchHit, VectorStore};

const SCHEMA_VERSION: &str = "1";

const SELECT_RECORDS: &str = r#"
    SELECT id, text, filename, chunk_number, embedding, created_at
    FROM embeddings
"#;

/// SQLite-backed vector store.
///
/// Stores records in `.vecstash/embeddings.sqlite` by default.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl SqliteStore {
    /// Opens or creates a store at the specified path.
    ///
    /// A new database records `dimension` and `model_id`; an existing one
    /// must have been created with the same dimension.
    pub fn open<P: AsRef<Path>>(path: P, dimension: usize, model_id: &str) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init_schema(&conn)?;
        Self::check_meta(&conn, dimension, model_id)?;
        tracing::debug!(path = %path.display(), dimension, "opened sqlite store");

        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                filename TEXT,
                chunk_number INTEGER,
                embedding BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_embeddings_filename
                ON embeddings(filename, chunk_number);
            "#,
        )
        .context("Failed to initialize database schema")?;
        Ok(())
    }

    fn check_meta(conn: &Connection, dimension: usize, model_id: &str) -> Result<()> {
        match get_meta(conn, "dimension")? {
            Some(stored) => {
                let stored: usize = stored
                    .parse()
                    .with_context(|| format!("Corrupt dimension in meta table: {}", stored))?;
                if stored != dimension {
                    bail!(
                        "Database was created with {}-dimensional vectors, but the model produces {}",
                        stored,
                        dimension
                    );
                }
                if let Some(stored_model) = get_meta(conn, "model")? {
                    if stored_model != model_id {
                        tracing::warn!(
                            stored = %stored_model,
                            current = %model_id,
                            "database was populated by a different embedding model"
                        );
                    }
                }
            }
            None => {
                set_meta(conn, "schema_version", SCHEMA_VERSION)?;
                set_meta(conn, "dimension", &dimension.to_string())?;
                set_meta(conn, "model", model_id)?;
            }
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<EmbeddingRecord> {
        let id: i64 = row.get(0)?;
        let embedding_blob: Vec<u8> = row.get(4)?;
        Ok(EmbeddingRecord {
            id: id as u64,
            text: row.get(1)?,
            vector: blob_to_embedding(&embedding_blob),
            metadata: RecordMetadata {
                filename: row.get(2)?,
                chunk_number: row.get(3)?,
                created_at: row.get(5)?,
            },
        })
    }
}

impl VectorStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn insert(&self, text: &str, vector: &[f32], metadata: &RecordMetadata) -> Result<u64> {
        check_dimension(self.dimension, vector)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let id: i64 = tx.query_row(
            "SELECT COALESCE(MAX(id) + 1, 0) FROM embeddings",
            [],
            |row| row.get(0),
        )?;
        tx.execute(
            r#"
            INSERT INTO embeddings (id, text, filename, chunk_number, embedding, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                id,
                text,
                metadata.filename,
                metadata.chunk_number,
                embedding_to_blob(vector),
                metadata.created_at
            ],
        )
        .context("Failed to insert embedding")?;
        tx.commit()?;

        Ok(id as u64)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        check_dimension(self.dimension, query)?;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(SELECT_RECORDS)?;
        let hits = stmt
            .query_map([], |row| {
                let record = Self::row_to_record(row)?;
                Ok(SearchHit {
                    distance: squared_l2(query, &record.vector),
                    record,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to scan embeddings")?;

        Ok(rank_hits(hits, k))
    }

    fn list(&self) -> Result<Vec<EmbeddingRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_RECORDS))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to list embeddings")?;
        Ok(records)
    }

    fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .context("Failed to get meta")
}

fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO meta (key, value)
        VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        params![key, value],
    )?;
    Ok(())
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
