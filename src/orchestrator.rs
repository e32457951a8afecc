//! Orchestrator: the crate's external call surface.
//!
//! Owns the shared components and a per-identity cache of collections and
//! RAG engines, and exposes the two operations external callers (a chat
//! agent, an HTTP layer) invoke: [`Orchestrator::ingest`] and
//! [`Orchestrator::ask`]. Same-identity ingestions are serialized here;
//! different identities never share state and run freely in parallel.

use crate::collection::{collection_key, Collection};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{MinneError, Result};
use crate::llm::{LanguageModel, OpenAiLanguageModel};
use crate::rag::RagEngine;
use crate::summarize::Summarizer;
use crate::topic::TopicClassifier;
use crate::vector_store::{MemoryVectorStore, SqliteVectorStore, VectorStore};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, instrument};

/// Result of an ingestion call.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    /// "ok" on success; errors are surfaced as errors, never encoded here.
    pub status: String,
    /// Total chunks stored for the identity after this call.
    pub total_chunks: usize,
}

/// Coordinates per-identity collections and engines.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    summarizer_llm: Arc<dyn LanguageModel>,
    answer_llm: Arc<dyn LanguageModel>,
    classifier_llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    collections: Mutex<HashMap<String, Arc<Collection>>>,
    engines: Mutex<HashMap<String, Arc<RagEngine>>>,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Orchestrator {
    /// Create an orchestrator with OpenAI-backed components per the settings.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let timeout = Duration::from_secs(settings.llm.request_timeout_secs);
        let summarizer_llm: Arc<dyn LanguageModel> = Arc::new(OpenAiLanguageModel::with_timeout(
            &settings.llm.summarizer_model,
            settings.llm.temperature,
            timeout,
        ));
        let answer_llm: Arc<dyn LanguageModel> = Arc::new(OpenAiLanguageModel::with_timeout(
            &settings.rag.model,
            settings.llm.temperature,
            timeout,
        ));
        let classifier_llm: Arc<dyn LanguageModel> = Arc::new(OpenAiLanguageModel::with_timeout(
            &settings.classifier.model,
            0.0,
            timeout,
        ));
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ));

        Ok(Self::assemble(
            settings,
            prompts,
            summarizer_llm,
            answer_llm,
            classifier_llm,
            embedder,
        ))
    }

    /// Create an orchestrator with custom components.
    ///
    /// The one language model is used for every role (summarization,
    /// answering, classification); primarily for embedding deterministic
    /// fakes in tests and for single-model deployments.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self::assemble(settings, prompts, llm.clone(), llm.clone(), llm, embedder)
    }

    fn assemble(
        settings: Settings,
        prompts: Prompts,
        summarizer_llm: Arc<dyn LanguageModel>,
        answer_llm: Arc<dyn LanguageModel>,
        classifier_llm: Arc<dyn LanguageModel>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            settings,
            prompts,
            summarizer_llm,
            answer_llm,
            classifier_llm,
            embedder,
            collections: Mutex::new(HashMap::new()),
            engines: Mutex::new(HashMap::new()),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get (or lazily create) the collection for an identity.
    pub fn collection(&self, identity: &str) -> Result<Arc<Collection>> {
        let key = collection_key(identity)?;

        let mut collections = self
            .collections
            .lock()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        if let Some(existing) = collections.get(&key) {
            return Ok(existing.clone());
        }

        let store: Arc<dyn VectorStore> = match self.settings.vector_store.provider.as_str() {
            "memory" => Arc::new(MemoryVectorStore::new()),
            _ => {
                let path = self.settings.collections_dir().join(format!("{}.db", key));
                Arc::new(SqliteVectorStore::open(&path)?)
            }
        };

        let summarizer = Summarizer::new(self.summarizer_llm.clone(), self.prompts.clone());
        let collection = Arc::new(
            Collection::new(identity, store, self.embedder.clone(), summarizer)
                .with_chunking((&self.settings.chunking).into()),
        );

        collections.insert(key, collection.clone());
        Ok(collection)
    }

    /// Ingest raw text into an identity's knowledge base.
    ///
    /// Additive by default; `rebuild = true` replaces the entire collection
    /// with this call's content. Wraps the full pipeline and reports the
    /// collection's total chunk count afterwards.
    #[instrument(skip(self, raw_text), fields(identity = %identity))]
    pub async fn ingest(&self, identity: &str, raw_text: &str, rebuild: bool) -> Result<IngestResult> {
        let collection = self.collection(identity)?;

        // One in-flight mutation per identity; readers are unaffected.
        let write_lock = self.write_lock(identity)?;
        let _guard = write_lock.lock().await;

        collection.embed(raw_text, rebuild).await?;

        if rebuild {
            // A rebuilt collection invalidates any cached engine state.
            let key = collection_key(identity)?;
            if let Ok(mut engines) = self.engines.lock() {
                engines.remove(&key);
            }
        }

        let total_chunks = collection.count().await?;
        Ok(IngestResult {
            status: "ok".to_string(),
            total_chunks,
        })
    }

    /// Answer a question against an identity's knowledge base.
    ///
    /// Blank questions fail with [`MinneError::InvalidInput`]. Internal
    /// query-time failures are logged and surfaced as an `"Error: ..."`
    /// string so the conversational caller always receives text.
    #[instrument(skip(self, question), fields(identity = %identity))]
    pub async fn ask(&self, identity: &str, question: &str) -> Result<String> {
        let engine = self.engine(identity)?;

        match engine.answer(question).await {
            Ok(answer) => Ok(answer),
            Err(e @ MinneError::InvalidInput(_)) => Err(e),
            Err(e) => {
                error!(identity, "RAG query failed: {}", e);
                Ok(format!("Error: {}", e))
            }
        }
    }

    /// Get (or lazily create) the cached RAG engine for an identity.
    fn engine(&self, identity: &str) -> Result<Arc<RagEngine>> {
        let key = collection_key(identity)?;

        let collection = self.collection(identity)?;

        let mut engines = self
            .engines
            .lock()
            .map_err(|e| MinneError::Rag(format!("Failed to acquire lock: {}", e)))?;

        if let Some(existing) = engines.get(&key) {
            return Ok(existing.clone());
        }

        let mut engine = RagEngine::new(
            collection.store(),
            collection.embedder(),
            self.answer_llm.clone(),
            self.prompts.clone(),
            self.settings.rag.max_context_chunks as usize,
        );
        if self.settings.rag.classify_topics {
            engine = engine.with_classifier(TopicClassifier::new(
                self.classifier_llm.clone(),
                self.prompts.clone(),
            ));
        }

        let engine = Arc::new(engine);
        engines.insert(key, engine.clone());
        Ok(engine)
    }

    fn write_lock(&self, identity: &str) -> Result<Arc<tokio::sync::Mutex<()>>> {
        let key = collection_key(identity)?;
        let mut locks = self
            .write_locks
            .lock()
            .map_err(|e| MinneError::VectorStore(format!("Failed to acquire lock: {}", e)))?;
        Ok(locks.entry(key).or_default().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::testing::HashEmbedder;
    use crate::error::Result;
    use crate::rag::INSUFFICIENT_CONTEXT_ANSWER;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic stand-in for the three model roles.
    ///
    /// Summarization passes the document text through unchanged (the test
    /// inputs are already in the delimited block format); answering picks the
    /// context document sharing the most question words, or the insufficient-
    /// information fallback when nothing overlaps, the behavior the prompt
    /// instructs a real model to follow.
    struct ScriptedModel {
        fail_answers: bool,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new() -> Self {
            Self {
                fail_answers: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing_answers() -> Self {
            Self {
                fail_answers: true,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn tokens(text: &str) -> Vec<String> {
            const STOPWORDS: [&str; 14] = [
                "what", "is", "a", "an", "the", "how", "did", "of", "do", "does", "to", "in",
                "on", "and",
            ];
            text.to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
                .map(str::to_string)
                .collect()
        }

        fn answer_from_context(user: &str) -> String {
            let context = user
                .split_once("Context:\n")
                .map(|(_, rest)| rest)
                .and_then(|rest| rest.split_once("\n\nQuestion:"))
                .map(|(context, _)| context)
                .unwrap_or_default();
            let question = user
                .split_once("Question:")
                .map(|(_, rest)| rest)
                .and_then(|rest| rest.split_once("\n\nAnswer:"))
                .map(|(q, _)| q)
                .unwrap_or_default();

            let question_tokens = Self::tokens(question);
            let mut best: Option<(usize, &str)> = None;
            for doc in context.split("\n\n---\n\n") {
                let doc_tokens = Self::tokens(doc);
                let overlap = question_tokens
                    .iter()
                    .filter(|q| doc_tokens.iter().any(|d| d.starts_with(q.as_str())))
                    .count();
                if overlap >= best.map(|(n, _)| n + 1).unwrap_or(1) {
                    best = Some((overlap, doc));
                }
            }

            match best {
                Some((overlap, doc)) if overlap >= 2 => doc
                    .lines()
                    .find_map(|l| l.strip_prefix("Content: "))
                    .unwrap_or(doc)
                    .to_string(),
                _ => INSUFFICIENT_CONTEXT_ANSWER.to_string(),
            }
        }
    }

    #[async_trait]
    impl crate::llm::LanguageModel for ScriptedModel {
        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if let Some((_, text)) = user.split_once("Here is the document text:") {
                return Ok(text.trim().to_string());
            }
            if user.contains("Context:") && user.contains("Question:") {
                if self.fail_answers {
                    return Err(MinneError::OpenAI("model unavailable".to_string()));
                }
                return Ok(Self::answer_from_context(user));
            }
            Ok("misc".to_string())
        }
    }

    const SPONSOR_BLOCK: &str = "--- Acme Sponsorship Call ---\nTopic: sponsorship\nGuests: Acme Corp\nYear: 2024\nNotes: Acme offered $5000 sponsorship.";
    const CS_BLOCK: &str = "--- CS 355 notes ---\nTopic: CS\nYear: 2024\nNotes: B-trees maintain balance via node splitting.";

    fn memory_settings() -> Settings {
        let mut settings = Settings::default();
        settings.vector_store.provider = "memory".to_string();
        settings
    }

    fn orchestrator(model: Arc<ScriptedModel>) -> Orchestrator {
        Orchestrator::with_components(
            memory_settings(),
            Prompts::default(),
            model,
            Arc::new(HashEmbedder::new()),
        )
    }

    #[tokio::test]
    async fn test_end_to_end_ingest_and_ask() {
        let model = Arc::new(ScriptedModel::new());
        let brain = orchestrator(model.clone());
        let text = format!("{}\n{}", SPONSOR_BLOCK, CS_BLOCK);

        let result = brain.ingest("alice", &text, false).await.unwrap();
        assert_eq!(result.status, "ok");
        assert_eq!(result.total_chunks, 2);

        let answer = brain.ask("alice", "How much did Acme offer?").await.unwrap();
        assert!(answer.contains("5000"), "answer was: {}", answer);

        let answer = brain.ask("alice", "What is a B-tree?").await.unwrap();
        assert!(answer.contains("node splitting"), "answer was: {}", answer);

        let answer = brain
            .ask("alice", "What is the capital of France?")
            .await
            .unwrap();
        assert!(
            answer.contains("I don't have enough information"),
            "answer was: {}",
            answer
        );
    }

    #[tokio::test]
    async fn test_blank_question_fails_without_model_call() {
        let model = Arc::new(ScriptedModel::new());
        let brain = orchestrator(model.clone());
        brain.ingest("alice", SPONSOR_BLOCK, false).await.unwrap();
        let baseline = model.call_count();

        for question in ["", "   "] {
            let err = brain.ask("alice", question).await.unwrap_err();
            assert!(matches!(err, MinneError::InvalidInput(_)));
        }
        assert_eq!(model.call_count(), baseline);
    }

    #[tokio::test]
    async fn test_ask_without_ingestion_is_graceful() {
        let model = Arc::new(ScriptedModel::new());
        let brain = orchestrator(model);

        let answer = brain.ask("nobody", "anything at all?").await.unwrap();
        assert_eq!(answer, INSUFFICIENT_CONTEXT_ANSWER);
    }

    #[tokio::test]
    async fn test_incremental_then_rebuild_counts() {
        let model = Arc::new(ScriptedModel::new());
        let brain = orchestrator(model);

        let first = brain.ingest("alice", SPONSOR_BLOCK, false).await.unwrap();
        assert_eq!(first.total_chunks, 1);

        let second = brain.ingest("alice", CS_BLOCK, false).await.unwrap();
        assert_eq!(second.total_chunks, 2);

        let rebuilt = brain.ingest("alice", CS_BLOCK, true).await.unwrap();
        assert_eq!(rebuilt.total_chunks, 1);
    }

    #[tokio::test]
    async fn test_identities_are_isolated() {
        let model = Arc::new(ScriptedModel::new());
        let brain = orchestrator(model);

        brain.ingest("alice", SPONSOR_BLOCK, false).await.unwrap();

        let answer = brain.ask("bob", "How much did Acme offer?").await.unwrap();
        assert_eq!(answer, INSUFFICIENT_CONTEXT_ANSWER);
        assert_eq!(brain.collection("bob").unwrap().count().await.unwrap(), 0);
        assert_eq!(brain.collection("alice").unwrap().count().await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_failures_surface_as_error_text() {
        let model = Arc::new(ScriptedModel::failing_answers());
        let brain = orchestrator(model);
        brain.ingest("alice", SPONSOR_BLOCK, false).await.unwrap();

        let answer = brain.ask("alice", "How much did Acme offer?").await.unwrap();
        assert!(answer.starts_with("Error: "), "answer was: {}", answer);
    }

    #[tokio::test]
    async fn test_blank_identity_is_rejected() {
        let model = Arc::new(ScriptedModel::new());
        let brain = orchestrator(model);

        assert!(brain.ingest("  ", SPONSOR_BLOCK, false).await.is_err());
        assert!(brain.ask("", "question").await.is_err());
    }
}
