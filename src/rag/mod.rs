//! RAG (Retrieval-Augmented Generation) for grounded question answering.
//!
//! Retrieves the top-matching chunks for a question, assembles them into a
//! context window, and asks a language model to answer strictly from that
//! context.

pub mod context;
mod response;

pub use context::ContextBuilder;
pub use response::{RagEngine, INSUFFICIENT_CONTEXT_ANSWER};

use crate::vector_store::SearchResult;

/// A retrieved chunk formatted for the context window.
#[derive(Debug, Clone)]
pub struct ContextChunk {
    /// Title of the block the chunk came from.
    pub title: String,
    /// Normalized topic label(s).
    pub topic: String,
    /// Source identifier, when known.
    pub source: Option<String>,
    /// Text content.
    pub content: String,
    /// Similarity score.
    pub score: f32,
}

impl From<SearchResult> for ContextChunk {
    fn from(result: SearchResult) -> Self {
        Self {
            title: result.document.title.clone(),
            topic: result.document.topic.clone(),
            source: result.document.source_file.clone(),
            content: result.document.content.clone(),
            score: result.score,
        }
    }
}
