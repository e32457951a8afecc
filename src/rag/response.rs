//! RAG answer generation.

use super::{context::format_context_for_prompt, ContextBuilder};
use crate::config::Prompts;
use crate::embedding::Embedder;
use crate::error::{MinneError, Result};
use crate::llm::LanguageModel;
use crate::retry::RetryPolicy;
use crate::topic::TopicClassifier;
use crate::vector_store::VectorStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// The user-facing answer when the knowledge base cannot answer a question.
///
/// Reachable on a healthy system: an empty collection or a question outside
/// the stored knowledge must produce this rather than an error.
pub const INSUFFICIENT_CONTEXT_ANSWER: &str =
    "I don't have enough information to answer that question based on the available documents.";

/// RAG engine for question answering over one identity's collection.
///
/// Engines are cheap to keep around and reusable across calls; the
/// orchestrator caches one per identity and drops it when the underlying
/// collection is rebuilt.
pub struct RagEngine {
    llm: Arc<dyn LanguageModel>,
    context_builder: ContextBuilder,
    store: Arc<dyn VectorStore>,
    classifier: Option<TopicClassifier>,
    prompts: Prompts,
    retry: RetryPolicy,
}

impl RagEngine {
    /// Create a new RAG engine over a store and embedder.
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        prompts: Prompts,
        max_context_chunks: usize,
    ) -> Self {
        let context_builder =
            ContextBuilder::new(store.clone(), embedder).with_max_chunks(max_context_chunks);

        Self {
            llm,
            context_builder,
            store,
            classifier: None,
            prompts,
            retry: RetryPolicy::default(),
        }
    }

    /// Narrow retrieval with a topic classification of each question.
    ///
    /// Classification fails open: when it errors or predicts an unknown
    /// label, retrieval simply runs unfiltered.
    pub fn with_classifier(mut self, classifier: TopicClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Answer a question from the collection's content.
    ///
    /// Blank questions fail with [`MinneError::InvalidInput`] before any model
    /// call. An empty collection returns [`INSUFFICIENT_CONTEXT_ANSWER`]. The
    /// "answer only from the provided context" rule is enforced at the prompt
    /// level; the model's compliance is not verified at runtime.
    #[instrument(skip(self, question))]
    pub async fn answer(&self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(MinneError::InvalidInput(
                "Question cannot be empty".to_string(),
            ));
        }

        if self.store.count().await? == 0 {
            info!("Collection is empty, returning insufficient-context answer");
            return Ok(INSUFFICIENT_CONTEXT_ANSWER.to_string());
        }

        let topic = match &self.classifier {
            Some(classifier) => classifier.classify(question).await,
            None => None,
        };

        let chunks = self.context_builder.build(question, topic.as_deref()).await?;
        if chunks.is_empty() {
            return Ok(INSUFFICIENT_CONTEXT_ANSWER.to_string());
        }

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("context".to_string(), format_context_for_prompt(&chunks));

        let system = self.prompts.render_with_custom(&self.prompts.rag.system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.rag.user, &vars);

        let answer = self
            .retry
            .run(|| self.llm.complete(&system, &user))
            .await
            .map_err(|e| MinneError::Rag(e.to_string()))?;

        if answer.trim().is_empty() {
            return Ok("No response generated".to_string());
        }

        debug!("Generated answer from {} context chunks", chunks.len());
        Ok(answer)
    }
}
