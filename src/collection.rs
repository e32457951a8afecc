//! Per-identity knowledge collections.
//!
//! A [`Collection`] owns one identity's embedded documents and runs the full
//! ingestion pipeline: summarize, parse into blocks, extract fields, rechunk,
//! embed, persist. Collections are never shared between identities; the
//! backing storage location is derived from the identity key alone.

use crate::chunking::{rechunk, ChunkingConfig};
use crate::embedding::Embedder;
use crate::error::{MinneError, Result};
use crate::parsing::{extract_fields, BlockParser};
use crate::retry::RetryPolicy;
use crate::summarize::Summarizer;
use crate::vector_store::{Document, VectorStore};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Derive the storage key for an identity.
///
/// Deterministic and filesystem-safe: characters outside `[A-Za-z0-9_-]`
/// are replaced with `_`. Fails on blank identities rather than handing
/// every anonymous caller the same collection.
pub fn collection_key(identity: &str) -> Result<String> {
    let trimmed = identity.trim();
    if trimmed.is_empty() {
        return Err(MinneError::InvalidInput(
            "Identity cannot be empty".to_string(),
        ));
    }

    Ok(trimmed
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect())
}

/// A ranked retrieval match returned by [`Collection::query`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryMatch {
    /// 1-based rank.
    pub rank: usize,
    /// Chunk content.
    pub content: String,
    /// Chunk metadata, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// One identity's knowledge collection and its ingestion pipeline.
pub struct Collection {
    identity: String,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    summarizer: Summarizer,
    parser: BlockParser,
    chunking: ChunkingConfig,
    retry: RetryPolicy,
}

impl Collection {
    pub fn new(
        identity: &str,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            identity: identity.to_string(),
            store,
            embedder,
            summarizer,
            parser: BlockParser::new(),
            chunking: ChunkingConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The identity owning this collection.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// The backing store (read-only use by the query engine).
    pub(crate) fn store(&self) -> Arc<dyn VectorStore> {
        self.store.clone()
    }

    pub(crate) fn embedder(&self) -> Arc<dyn Embedder> {
        self.embedder.clone()
    }

    /// Run the ingestion pipeline over `text` and persist the result.
    ///
    /// With `rebuild = false` (the default choice for callers) the new chunks
    /// are appended, never replacing existing knowledge. With `rebuild = true`
    /// the collection is cleared first and ends up holding only this call's
    /// chunks: destructive, so callers must opt in explicitly.
    ///
    /// Writes are durable once this returns. Concurrent `embed` calls for the
    /// same identity are not coordinated here; callers should serialize them
    /// (the crate-level [`crate::orchestrator::Orchestrator`] does).
    #[instrument(skip(self, text), fields(identity = %self.identity))]
    pub async fn embed(&self, text: &str, rebuild: bool) -> Result<usize> {
        self.embed_with_source(text, rebuild, None).await
    }

    /// [`Collection::embed`] with a source label stamped into chunk metadata,
    /// for callers ingesting crawled files.
    pub async fn embed_with_source(
        &self,
        text: &str,
        rebuild: bool,
        source_file: Option<&str>,
    ) -> Result<usize> {
        if text.trim().is_empty() {
            return Err(MinneError::InvalidInput(
                "Ingestion text is empty".to_string(),
            ));
        }

        let structured = self.summarizer.summarize(text).await?;
        let parsed = self.parser.parse(&structured);
        if !parsed.preamble.is_empty() {
            warn!(
                "Discarding {} chars of preamble before first block",
                parsed.preamble.len()
            );
        }

        let blocks: Vec<_> = parsed.blocks.iter().map(extract_fields).collect();
        let chunks = rechunk(&blocks, &self.chunking, source_file);
        if chunks.is_empty() {
            warn!(identity = %self.identity, "Summarized text produced no chunks");
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self
            .retry
            .run(|| self.embedder.embed_batch(&texts))
            .await
            .map_err(|e| MinneError::Embedding(e.to_string()))?;

        if embeddings.len() != chunks.len() {
            return Err(MinneError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let documents: Vec<Document> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| Document::from_chunk(chunk, embedding))
            .collect();

        if rebuild {
            let removed = self.store.clear().await?;
            info!(identity = %self.identity, removed, "Rebuilding collection");
        }

        let added = self
            .store
            .add(&documents)
            .await
            .map_err(|e| MinneError::Embedding(format!("Failed to persist documents: {}", e)))?;

        info!(identity = %self.identity, added, "Embedded documents");
        Ok(added)
    }

    /// Return the top-`k` chunks for `query_text` by embedding similarity.
    ///
    /// An empty collection yields an empty result, not an error; a blank
    /// query fails before touching the store.
    #[instrument(skip(self, query_text), fields(identity = %self.identity))]
    pub async fn query(
        &self,
        query_text: &str,
        k: usize,
        include_metadata: bool,
    ) -> Result<Vec<QueryMatch>> {
        if query_text.trim().is_empty() {
            return Err(MinneError::InvalidInput("Query is empty".to_string()));
        }

        if self.store.count().await? == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .retry
            .run(|| self.embedder.embed(query_text))
            .await
            .map_err(|e| MinneError::Retrieval(e.to_string()))?;

        let results = self
            .store
            .search(&query_embedding, k)
            .await
            .map_err(|e| MinneError::Retrieval(e.to_string()))?;

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(i, r)| QueryMatch {
                rank: i + 1,
                content: r.document.content.trim().to_string(),
                metadata: include_metadata.then(|| r.document.metadata_map()),
            })
            .collect())
    }

    /// Total chunks currently stored for this identity.
    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }
}
