//! Language model abstraction.
//!
//! Every LLM invocation in the pipeline (summarization, classification, answer
//! generation) goes through this trait so the core logic can be exercised with
//! a deterministic fake model in tests.

mod openai;

pub use openai::OpenAiLanguageModel;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for chat-completion style language models.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion with a system instruction and a user message,
    /// returning the model's text.
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}
