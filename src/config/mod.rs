//! Configuration module for Coco.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AgentPrompts, Prompts, RagPrompts};
pub use settings::{
    AgentSettings, BatchSettings, ChunkingSettings, EmbeddingSettings, LlmSettings, LmProvider,
    PromptSettings, ServiceSettings, Settings,
};
