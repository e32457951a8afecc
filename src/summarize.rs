//! Metadata extraction: the LLM summarization pass over raw ingestion text.
//!
//! Runs once per ingested document, before block parsing. The model rewrites
//! arbitrary input into the delimited, field-tagged format the
//! [`crate::parsing`] module consumes, classifying each block into one of the
//! fixed domain schemas. The prompt forbids inventing or dropping named facts;
//! the output's exact wording still varies between runs, so only the field
//! shape is relied upon downstream.

use crate::config::Prompts;
use crate::error::{MinneError, Result};
use crate::llm::LanguageModel;
use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default organization name substituted into the summarizer prompt when the
/// caller has not configured one.
const DEFAULT_ORGANIZATION: &str = "the user's organization";

/// Structured summarization of raw text via a language model.
pub struct Summarizer {
    llm: Arc<dyn LanguageModel>,
    prompts: Prompts,
    retry: RetryPolicy,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LanguageModel>, prompts: Prompts) -> Self {
        Self {
            llm,
            prompts,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Produce the delimited, field-tagged rendition of `text`.
    ///
    /// The model call is retried with bounded backoff; an empty completion
    /// counts as a failure. After retries are exhausted the last error is
    /// surfaced as [`MinneError::Summarization`].
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn summarize(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(MinneError::InvalidInput(
                "Cannot summarize empty text".to_string(),
            ));
        }

        let mut vars = HashMap::new();
        vars.insert("text".to_string(), text.to_string());
        if !self.prompts.variables.contains_key("organization") {
            vars.insert("organization".to_string(), DEFAULT_ORGANIZATION.to_string());
        }

        let system = self
            .prompts
            .render_with_custom(&self.prompts.summarizer.system, &vars);
        let user = self
            .prompts
            .render_with_custom(&self.prompts.summarizer.user, &vars);

        let summary = self
            .retry
            .run(|| async {
                let content = self.llm.complete(&system, &user).await?;
                if content.trim().is_empty() {
                    return Err(MinneError::Summarization(
                        "Empty response from LLM".to_string(),
                    ));
                }
                Ok(content)
            })
            .await
            .map_err(|e| match e {
                MinneError::Summarization(_) => e,
                other => MinneError::Summarization(other.to_string()),
            })?;

        debug!("Summarized {} chars into {} chars", text.len(), summary.len());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::FakeLanguageModel;

    #[tokio::test]
    async fn test_empty_input_fails_without_model_call() {
        let llm = Arc::new(FakeLanguageModel::returning("irrelevant"));
        let summarizer = Summarizer::new(llm.clone(), Prompts::default());

        let err = summarizer.summarize("   ").await.unwrap_err();
        assert!(matches!(err, MinneError::InvalidInput(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_document_text_reaches_the_prompt() {
        let llm = Arc::new(FakeLanguageModel::returning("--- T ---\nNotes: n"));
        let summarizer = Summarizer::new(llm.clone(), Prompts::default());

        let out = summarizer.summarize("quarterly budget review").await.unwrap();
        assert_eq!(out, "--- T ---\nNotes: n");

        let prompts = llm.recorded_prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].1.contains("quarterly budget review"));
        // The default organization placeholder is filled in.
        assert!(!prompts[0].0.contains("{{organization}}"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_completion_retried_then_surfaced() {
        let llm = Arc::new(FakeLanguageModel::returning(""));
        let summarizer = Summarizer::new(llm.clone(), Prompts::default());

        let err = summarizer.summarize("some text").await.unwrap_err();
        assert!(matches!(err, MinneError::Summarization(_)));
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_model_error_surfaced_as_summarization() {
        let llm = Arc::new(FakeLanguageModel::failing("rate limited"));
        let summarizer = Summarizer::new(llm.clone(), Prompts::default());

        let err = summarizer.summarize("some text").await.unwrap_err();
        match err {
            MinneError::Summarization(msg) => assert!(msg.contains("rate limited")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(llm.call_count(), 3);
    }
}
