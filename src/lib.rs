//! Coco - client toolkit for a personal audio and text memory
//!
//! Coco ingests recordings and notes through a set of remote services
//! (transcription, chunking, vector database), embeds them with an Ollama
//! or OpenAI-compatible model, and answers questions over them either by
//! retrieval-augmented generation or with a tool-calling agent.
//!
//! # Architecture
//!
//! - `batch` - batched, concurrency-limited bulk execution
//! - `config` - settings and prompt templates
//! - `services` - clients for the chunking, transcription and database services
//! - `lm` - language-model backends (Ollama, OpenAI-compatible)
//! - `vector_store` - document types and the vector store abstraction
//! - `tools` - tool definitions, argument coercion and the built-in tools
//! - `agent` - the tool-calling agent loop
//! - `rag` - retrieval and answer generation
//! - `orchestrator` - wires everything together from [`config::Settings`]
//!
//! # Example
//!
//! ```rust,no_run
//! use coco::config::Settings;
//! use coco::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let outcome = orchestrator
//!         .chunk_and_store("Met Ana at the market on Tuesday.", "en", "notes.txt", None)
//!         .await?;
//!     println!("Stored {} chunks", outcome.added);
//!
//!     let run = orchestrator.agent().ask("Who did I meet on Tuesday?").await?;
//!     println!("{}", run.content);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod lm;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod services;
pub mod tools;
pub mod vector_store;

pub use error::{CocoError, Result};
