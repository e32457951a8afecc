//! Context building for RAG answers.

use super::ContextChunk;
use crate::embedding::Embedder;
use crate::error::{MinneError, Result};
use crate::retry::RetryPolicy;
use crate::vector_store::VectorStore;
use std::sync::Arc;

/// Retrieves and formats context chunks for a question.
pub struct ContextBuilder {
    vector_store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    max_chunks: usize,
    retry: RetryPolicy,
}

impl ContextBuilder {
    /// Create a new context builder.
    pub fn new(vector_store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            vector_store,
            embedder,
            max_chunks: 6,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the maximum number of context chunks.
    pub fn with_max_chunks(mut self, max_chunks: usize) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Build context for a question, optionally narrowed to one topic label.
    pub async fn build(&self, question: &str, topic: Option<&str>) -> Result<Vec<ContextChunk>> {
        let query_embedding = self
            .retry
            .run(|| self.embedder.embed(question))
            .await
            .map_err(|e| MinneError::Retrieval(e.to_string()))?;

        let results = self
            .vector_store
            .search_filtered(&query_embedding, self.max_chunks, topic)
            .await
            .map_err(|e| MinneError::Retrieval(e.to_string()))?;

        Ok(results.into_iter().map(ContextChunk::from).collect())
    }
}

/// Format context chunks for injection into the answer prompt.
///
/// Each chunk becomes a numbered document block carrying its title and
/// source identifier so the model can ground citations.
pub fn format_context_for_prompt(chunks: &[ContextChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "Document {} (Source: {}):\nTitle: {}\nContent: {}",
                i + 1,
                chunk.source.as_deref().unwrap_or("Unknown"),
                chunk.title,
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(title: &str, content: &str, source: Option<&str>) -> ContextChunk {
        ContextChunk {
            title: title.to_string(),
            topic: "misc".to_string(),
            source: source.map(str::to_string),
            content: content.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn test_format_numbers_documents() {
        let chunks = vec![
            chunk("First", "alpha", Some("notes.txt")),
            chunk("Second", "beta", None),
        ];

        let formatted = format_context_for_prompt(&chunks);
        assert!(formatted.contains("Document 1 (Source: notes.txt):"));
        assert!(formatted.contains("Title: First"));
        assert!(formatted.contains("Document 2 (Source: Unknown):"));
        assert!(formatted.contains("Content: beta"));
        assert!(formatted.contains("\n\n---\n\n"));
    }

    #[test]
    fn test_format_empty_context() {
        assert_eq!(format_context_for_prompt(&[]), "");
    }
}
