//! Persistent per-document reference metadata store.
//!
//! Records every retrieval outcome keyed by (document id, normalized
//! citation text). A record is only overwritten when a new retrieval
//! supplies an abstract the old record lacked; otherwise the retry counter
//! increments. Nothing is deleted except by the explicit age-based
//! retention sweep.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use thiserror::Error;

/// Records older than this many days are eligible for the retention sweep.
pub const DEFAULT_RETENTION_DAYS: u64 = 30;

/// Retries stop once a record has been attempted this many times.
const MAX_RETRIES: i64 = 3;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One retrieval attempt's inputs.
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub abstract_text: Option<String>,
    pub venue: Option<String>,
    pub citation_count: Option<i64>,
    pub source: Option<String>,
}

/// A stored reference metadata record.
#[derive(Debug, Clone, Serialize)]
pub struct ReferenceRecord {
    pub citation_text: String,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub venue: Option<String>,
    pub citation_count: Option<i64>,
    pub source: Option<String>,
    pub retrieved_at: i64,
    pub retry_count: i64,
    pub has_abstract: bool,
}

/// Aggregate extraction outcome for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    pub total: i64,
    pub with_abstract: i64,
    pub without_abstract: i64,
    /// Records with no title, regardless of abstract presence.
    pub failed_retrievals: i64,
}

/// The persisted per-document artifact, loaded as an atomic unit.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub document_id: String,
    pub filename: String,
    pub uploaded_at: i64,
    pub references: Vec<ReferenceRecord>,
    pub stats: DocumentStats,
}

/// Normalize citation text for use as a store key: lowercase, collapse
/// whitespace, trim.
pub fn normalize_citation(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct ReferenceStore {
    conn: Connection,
}

impl ReferenceStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open the store under the user cache directory.
    pub fn open_default() -> Result<Self, StoreError> {
        let cache_dir = dirs::cache_dir().ok_or(StoreError::NoCacheDir)?.join("citelink");
        std::fs::create_dir_all(&cache_dir)?;
        Self::open(&cache_dir.join("references.db"))
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                document_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL DEFAULT '',
                uploaded_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS reference_records (
                document_id TEXT NOT NULL,
                citation_key TEXT NOT NULL,
                citation_text TEXT NOT NULL,
                title TEXT,
                authors TEXT NOT NULL DEFAULT '[]',
                year INTEGER,
                abstract TEXT,
                venue TEXT,
                citation_count INTEGER,
                source TEXT,
                retrieved_at INTEGER NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (document_id, citation_key)
            );",
        )?;
        Ok(Self { conn })
    }

    /// Register a document, keeping the original upload time on conflict.
    pub fn register_document(&self, document_id: &str, filename: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO documents (document_id, filename, uploaded_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(document_id) DO UPDATE SET filename = excluded.filename",
            params![document_id, filename, now()],
        )?;
        Ok(())
    }

    /// Record one retrieval attempt for a citation.
    ///
    /// Creates the record when absent; overwrites it when the prior record
    /// lacked an abstract and this attempt provides one (the retry counter
    /// carries over); otherwise only increments the retry counter.
    pub fn record_retrieval(
        &self,
        document_id: &str,
        citation_text: &str,
        retrieval: &Retrieval,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR IGNORE INTO documents (document_id, uploaded_at) VALUES (?1, ?2)",
            params![document_id, now()],
        )?;

        let key = normalize_citation(citation_text);
        let existing: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT abstract FROM reference_records
                 WHERE document_id = ?1 AND citation_key = ?2",
                params![document_id, key],
                |row| row.get(0),
            )
            .optional()?;

        let authors_json = serde_json::to_string(&retrieval.authors)?;
        match existing {
            None => {
                self.conn.execute(
                    "INSERT INTO reference_records
                     (document_id, citation_key, citation_text, title, authors, year,
                      abstract, venue, citation_count, source, retrieved_at, retry_count)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)",
                    params![
                        document_id,
                        key,
                        citation_text,
                        retrieval.title,
                        authors_json,
                        retrieval.year,
                        retrieval.abstract_text,
                        retrieval.venue,
                        retrieval.citation_count,
                        retrieval.source,
                        now(),
                    ],
                )?;
            }
            Some(old_abstract)
                if old_abstract.is_none() && retrieval.abstract_text.is_some() =>
            {
                self.conn.execute(
                    "UPDATE reference_records SET
                        title = ?3, authors = ?4, year = ?5, abstract = ?6, venue = ?7,
                        citation_count = ?8, source = ?9, retrieved_at = ?10
                     WHERE document_id = ?1 AND citation_key = ?2",
                    params![
                        document_id,
                        key,
                        retrieval.title,
                        authors_json,
                        retrieval.year,
                        retrieval.abstract_text,
                        retrieval.venue,
                        retrieval.citation_count,
                        retrieval.source,
                        now(),
                    ],
                )?;
            }
            Some(_) => {
                self.conn.execute(
                    "UPDATE reference_records SET retry_count = retry_count + 1
                     WHERE document_id = ?1 AND citation_key = ?2",
                    params![document_id, key],
                )?;
            }
        }
        Ok(())
    }

    /// Load the full per-document artifact: document row, all reference
    /// records, and aggregate stats, as one unit.
    pub fn document_record(&self, document_id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let doc: Option<(String, i64)> = self
            .conn
            .query_row(
                "SELECT filename, uploaded_at FROM documents WHERE document_id = ?1",
                params![document_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((filename, uploaded_at)) = doc else {
            return Ok(None);
        };

        Ok(Some(DocumentRecord {
            document_id: document_id.to_string(),
            filename,
            uploaded_at,
            references: self.references(document_id)?,
            stats: self.stats(document_id)?,
        }))
    }

    fn references(&self, document_id: &str) -> Result<Vec<ReferenceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT citation_text, title, authors, year, abstract, venue,
                    citation_count, source, retrieved_at, retry_count
             FROM reference_records WHERE document_id = ?1 ORDER BY citation_key",
        )?;
        let rows = stmt.query_map(params![document_id], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Aggregate stats; `failed_retrievals` counts records with no title.
    pub fn stats(&self, document_id: &str) -> Result<DocumentStats, StoreError> {
        self.conn
            .query_row(
                "SELECT COUNT(*),
                        COUNT(abstract),
                        COUNT(*) - COUNT(abstract),
                        COUNT(*) - COUNT(title)
                 FROM reference_records WHERE document_id = ?1",
                params![document_id],
                |row| {
                    Ok(DocumentStats {
                        total: row.get(0)?,
                        with_abstract: row.get(1)?,
                        without_abstract: row.get(2)?,
                        failed_retrievals: row.get(3)?,
                    })
                },
            )
            .map_err(StoreError::from)
    }

    /// Records still missing an abstract with fewer than three attempts,
    /// for retry scheduling.
    pub fn pending_retries(&self, document_id: &str) -> Result<Vec<ReferenceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT citation_text, title, authors, year, abstract, venue,
                    citation_count, source, retrieved_at, retry_count
             FROM reference_records
             WHERE document_id = ?1 AND abstract IS NULL AND retry_count < ?2
             ORDER BY citation_key",
        )?;
        let rows = stmt.query_map(params![document_id, MAX_RETRIES], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Delete documents (and their reference records) uploaded more than
    /// `days` days ago. Returns the number of documents removed.
    pub fn sweep_older_than(&self, days: u64) -> Result<usize, StoreError> {
        let cutoff = now() - days as i64 * 24 * 60 * 60;
        self.conn.execute(
            "DELETE FROM reference_records WHERE document_id IN
                 (SELECT document_id FROM documents WHERE uploaded_at < ?1)",
            params![cutoff],
        )?;
        let swept = self.conn.execute(
            "DELETE FROM documents WHERE uploaded_at < ?1",
            params![cutoff],
        )?;
        Ok(swept)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReferenceRecord> {
    let authors_json: String = row.get(2)?;
    let abstract_text: Option<String> = row.get(4)?;
    Ok(ReferenceRecord {
        citation_text: row.get(0)?,
        title: row.get(1)?,
        authors: serde_json::from_str(&authors_json).unwrap_or_default(),
        year: row.get(3)?,
        has_abstract: abstract_text.is_some(),
        abstract_text,
        venue: row.get(5)?,
        citation_count: row.get(6)?,
        source: row.get(7)?,
        retrieved_at: row.get(8)?,
        retry_count: row.get(9)?,
    })
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
