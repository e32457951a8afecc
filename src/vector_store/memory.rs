//! In-memory vector store implementation.
//!
//! Useful for testing and ephemeral sessions; nothing survives the process.

use super::{rank_documents, Document, SearchResult, VectorStore};
use crate::error::{MinneError, Result};
use async_trait::async_trait;
use std::sync::RwLock;

/// In-memory vector store.
pub struct MemoryVectorStore {
    documents: RwLock<Vec<Document>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn add(&self, docs: &[Document]) -> Result<usize> {
        let mut store = self
            .documents
            .write()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        store.extend_from_slice(docs);
        Ok(docs.len())
    }

    async fn search_filtered(
        &self,
        query_embedding: &[f32],
        limit: usize,
        topic: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let store = self
            .documents
            .read()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        Ok(rank_documents(
            store.iter().cloned(),
            query_embedding,
            limit,
            topic,
        ))
    }

    async fn clear(&self) -> Result<usize> {
        let mut store = self
            .documents
            .write()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        let removed = store.len();
        store.clear();
        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        let store = self
            .documents
            .read()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        Ok(store.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_store::test_document;

    #[tokio::test]
    async fn test_add_search_clear() {
        let store = MemoryVectorStore::new();

        let docs = vec![
            test_document("A", "meeting", "Hello world", vec![1.0, 0.0, 0.0]),
            test_document("B", "cs", "Goodbye world", vec![0.0, 1.0, 0.0]),
        ];
        store.add(&docs).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].document.title, "A");
        assert!(results[0].score > results[1].score);

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0, 0.0], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_topic_filter() {
        let store = MemoryVectorStore::new();
        store
            .add(&[
                test_document("A", "sponsorship", "money", vec![1.0, 0.0]),
                test_document("B", "meeting", "agenda", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store
            .search_filtered(&[1.0, 0.0], 10, Some("sponsorship"))
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.title, "A");
    }
}
