//! Minne - a personal second-brain library.
//!
//! Per-user RAG knowledge bases: ingest unstructured text, answer questions
//! from what was stored.
//!
//! The name "Minne" comes from the Norwegian word for "memory."
//!
//! # Overview
//!
//! Minne lets a host application:
//! - Ingest arbitrary text into a per-identity knowledge base, with an
//!   LLM pass that restructures it into titled, topic-tagged blocks
//! - Ask questions answered strictly from the stored content, with an
//!   explicit fallback when the knowledge base cannot answer
//! - Keep every identity's collection isolated in its own durable store
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration and prompt templates
//! - `summarize` - LLM metadata extraction over raw ingestion text
//! - `parsing` - Delimited block parsing and field extraction
//! - `topic` - Topic normalization and classification
//! - `chunking` - Bounded-size chunking with metadata propagation
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction
//! - `collection` - Per-identity collections and the ingestion pipeline
//! - `rag` - Retrieval-augmented question answering
//! - `research` - Parallel article summarization
//! - `orchestrator` - The external call surface
//!
//! # Example
//!
//! ```rust,no_run
//! use minne::config::Settings;
//! use minne::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> minne::Result<()> {
//!     let settings = Settings::load()?;
//!     let brain = Orchestrator::new(settings)?;
//!
//!     let result = brain
//!         .ingest("alice", "--- Acme Call ---\nTopic: sponsorship\nNotes: Acme offered $5000.", false)
//!         .await?;
//!     println!("Stored {} chunks", result.total_chunks);
//!
//!     let answer = brain.ask("alice", "How much did Acme offer?").await?;
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod collection;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod logging;
pub mod openai;
pub mod orchestrator;
pub mod parsing;
pub mod rag;
pub mod research;
pub mod retry;
pub mod summarize;
pub mod topic;
pub mod vector_store;

pub use error::{MinneError, Result};
