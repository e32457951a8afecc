//! Vector store abstraction for Minne.
//!
//! Provides a trait-based interface for different vector database backends.
//! Each store instance holds exactly one identity's collection; cross-identity
//! sharing is impossible by construction because the owning handle derives its
//! storage location from the identity key alone.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::Chunk;
use crate::error::Result;
use crate::topic::topic_matches;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A document stored in the vector database: one embedded chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document ID.
    pub id: Uuid,
    /// Title of the block this chunk came from.
    pub title: String,
    /// Normalized topic label(s), comma-joined.
    pub topic: String,
    /// Guest names, comma-joined.
    pub guests: String,
    /// Year mentioned in the block, or "Unknown".
    pub year: String,
    /// Originating file or crawl source, when known.
    pub source_file: Option<String>,
    /// Zero-based chunk position within its block.
    pub chunk_idx: i64,
    /// Text content of this chunk.
    pub content: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
    /// When this document was indexed.
    pub indexed_at: DateTime<Utc>,
}

impl Document {
    /// Build a document from a pipeline chunk and its embedding.
    pub fn from_chunk(chunk: Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: chunk.metadata.title,
            topic: chunk.metadata.topic,
            guests: chunk.metadata.guests,
            year: chunk.metadata.year,
            source_file: chunk.metadata.source_file,
            chunk_idx: chunk.metadata.chunk_idx as i64,
            content: chunk.content,
            embedding,
            indexed_at: Utc::now(),
        }
    }

    /// Metadata as a string map, the shape external callers consume.
    pub fn metadata_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("title".to_string(), self.title.clone());
        map.insert("topic".to_string(), self.topic.clone());
        map.insert("guests".to_string(), self.guests.clone());
        map.insert("year".to_string(), self.year.clone());
        map.insert("chunk_idx".to_string(), self.chunk_idx.to_string());
        if let Some(source) = &self.source_file {
            map.insert("source_file".to_string(), source.clone());
        }
        map
    }
}

/// A search result with score.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matched document.
    pub document: Document,
    /// Similarity score (higher is better).
    pub score: f32,
}

/// Trait for vector store implementations.
///
/// One instance owns one identity's collection. Writes are durable before the
/// call returns; retrieval is similarity-ranked, never insertion-ordered.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append documents to the collection.
    async fn add(&self, docs: &[Document]) -> Result<usize>;

    /// Search for the most similar documents.
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<SearchResult>> {
        self.search_filtered(query_embedding, limit, None).await
    }

    /// Search with an optional topic filter. Documents match when their topic
    /// set contains the label.
    async fn search_filtered(
        &self,
        query_embedding: &[f32],
        limit: usize,
        topic: Option<&str>,
    ) -> Result<Vec<SearchResult>>;

    /// Delete every document in the collection, returning how many were removed.
    async fn clear(&self) -> Result<usize>;

    /// Get total document count.
    async fn count(&self) -> Result<usize>;
}

/// Rank documents by cosine similarity against a query embedding, applying an
/// optional topic filter. Shared by backends that score in process.
pub(crate) fn rank_documents(
    docs: impl Iterator<Item = Document>,
    query_embedding: &[f32],
    limit: usize,
    topic: Option<&str>,
) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = docs
        .filter(|doc| topic.is_none_or(|t| topic_matches(&doc.topic, t)))
        .map(|doc| {
            let score = cosine_similarity(query_embedding, &doc.embedding);
            SearchResult {
                document: doc,
                score,
            }
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);
    results
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
pub(crate) fn test_document(title: &str, topic: &str, content: &str, embedding: Vec<f32>) -> Document {
    use crate::chunking::{Chunk, ChunkMetadata};

    Document::from_chunk(
        Chunk {
            content: content.to_string(),
            metadata: ChunkMetadata {
                title: title.to_string(),
                topic: topic.to_string(),
                guests: String::new(),
                year: "Unknown".to_string(),
                source_file: None,
                chunk_idx: 0,
            },
        },
        embedding,
    )
}
