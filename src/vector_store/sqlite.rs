//! SQLite-based vector store implementation.
//!
//! One database file per identity; cosine similarity is computed in Rust for
//! simplicity. For large collections consider the sqlite-vec extension or a
//! dedicated vector database.

use super::{rank_documents, Document, SearchResult, VectorStore};
use crate::error::{MinneError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) the store at the given path.
    #[instrument(skip_all)]
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL for better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::create_schema(&conn)?;

        info!("Opened SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                topic TEXT NOT NULL,
                guests TEXT NOT NULL,
                year TEXT NOT NULL,
                source_file TEXT,
                chunk_idx INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                indexed_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_topic ON documents(topic);
            "#,
        )?;
        Ok(())
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn row_to_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
        let id_str: String = row.get(0)?;
        let embedding_bytes: Vec<u8> = row.get(8)?;
        let indexed_at_str: String = row.get(9)?;

        Ok(Document {
            id: uuid::Uuid::parse_str(&id_str).unwrap_or_default(),
            title: row.get(1)?,
            topic: row.get(2)?,
            guests: row.get(3)?,
            year: row.get(4)?,
            source_file: row.get(5)?,
            chunk_idx: row.get(6)?,
            content: row.get(7)?,
            embedding: Self::bytes_to_embedding(&embedding_bytes),
            indexed_at: DateTime::parse_from_rfc3339(&indexed_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, docs), fields(count = docs.len()))]
    async fn add(&self, docs: &[Document]) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let tx = conn.unchecked_transaction()?;

        for doc in docs {
            let embedding_bytes = Self::embedding_to_bytes(&doc.embedding);

            tx.execute(
                r#"
                INSERT INTO documents
                (id, title, topic, guests, year, source_file, chunk_idx, content, embedding, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    doc.id.to_string(),
                    doc.title,
                    doc.topic,
                    doc.guests,
                    doc.year,
                    doc.source_file,
                    doc.chunk_idx,
                    doc.content,
                    embedding_bytes,
                    doc.indexed_at.to_rfc3339(),
                ],
            )?;
        }

        tx.commit()?;
        info!("Added {} documents", docs.len());
        Ok(docs.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn search_filtered(
        &self,
        query_embedding: &[f32],
        limit: usize,
        topic: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, title, topic, guests, year, source_file, chunk_idx,
                   content, embedding, indexed_at
            FROM documents
            "#,
        )?;

        let docs = stmt.query_map([], Self::row_to_document)?;
        let results = rank_documents(
            docs.filter_map(|d| d.ok()),
            query_embedding,
            limit,
            topic,
        );

        debug!("Found {} matching documents", results.len());
        Ok(results)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let removed = conn.execute("DELETE FROM documents", [])?;
        info!("Cleared {} documents", removed);
        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::test_document;

    #[tokio::test]
    async fn test_add_and_search() {
        let store = SqliteVectorStore::in_memory().unwrap();

        let mut doc = test_document(
            "Sponsor call",
            "sponsorship",
            "Acme offered $5000",
            vec![1.0, 0.0, 0.0],
        );
        doc.source_file = Some("drive/notes.txt".to_string());
        store.add(&[doc]).await.unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!((results[0].score - 1.0).abs() < 0.001);
        assert_eq!(results[0].document.title, "Sponsor call");
        assert_eq!(
            results[0].document.source_file.as_deref(),
            Some("drive/notes.txt")
        );

        assert_eq!(store.clear().await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_topic_filter() {
        let store = SqliteVectorStore::in_memory().unwrap();
        store
            .add(&[
                test_document("A", "sponsorship, meeting", "money", vec![1.0, 0.0]),
                test_document("B", "cs", "btrees", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store
            .search_filtered(&[1.0, 0.0], 10, Some("meeting"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.title, "A");

        // An unmatched filter yields an empty result, not an error.
        let results = store
            .search_filtered(&[1.0, 0.0], 10, Some("geology"))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_documents_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.db");

        {
            let store = SqliteVectorStore::open(&path).unwrap();
            store
                .add(&[test_document("A", "meeting", "hello", vec![0.5, 0.5])])
                .await
                .unwrap();
        }

        let reopened = SqliteVectorStore::open(&path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
        let results = reopened.search(&[0.5, 0.5], 1).await.unwrap();
        assert_eq!(results[0].document.content, "hello");
    }
}
