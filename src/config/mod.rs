//! Configuration management for Minne.

mod prompts;
mod settings;

pub use prompts::{ClassifierPrompts, Prompts, RagPrompts, ResearchPrompts, SummarizerPrompts};
pub use settings::{
    ChunkingSettings, ClassifierSettings, EmbeddingSettings, GeneralSettings, LlmSettings,
    PromptSettings, RagSettings, Settings, VectorStoreSettings,
};
