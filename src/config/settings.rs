//! Configuration settings for Coco.

use crate::error::{CocoError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub services: ServiceSettings,
    pub embedding: EmbeddingSettings,
    pub llm: LlmSettings,
    pub batching: BatchSettings,
    pub agent: AgentSettings,
    pub chunking: ChunkingSettings,
    pub prompts: PromptSettings,
}

/// Language-model provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LmProvider {
    /// Locally hosted Ollama server (default).
    #[default]
    Ollama,
    /// OpenAI-compatible hosted chat-completion API.
    OpenAI,
}

impl std::str::FromStr for LmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(LmProvider::Ollama),
            "openai" => Ok(LmProvider::OpenAI),
            _ => Err(format!("Unknown language model provider: {}", s)),
        }
    }
}

impl std::fmt::Display for LmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LmProvider::Ollama => write!(f, "ollama"),
            LmProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Base URLs and credentials for the remote collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServiceSettings {
    /// Chunking service base URL.
    pub chunking_base: Option<String>,
    /// Database API base URL.
    pub db_api_base: Option<String>,
    /// Transcription service base URL.
    pub transcription_base: Option<String>,
    /// Ollama server base URL.
    pub ollama_base: Option<String>,
    /// OpenAI-compatible API base URL.
    pub openai_base: Option<String>,
    /// API key sent as `X-API-Key` to the coco services.
    pub api_key: Option<String>,
    /// Bearer token for the OpenAI-compatible API.
    pub openai_api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Provider used for embeddings.
    pub api: LmProvider,
    /// Embedding model.
    pub model: String,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api: LmProvider::Ollama,
            model: "nomic-embed-text".to_string(),
        }
    }
}

/// Text generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Provider used for generation and chat.
    pub api: LmProvider,
    /// Default model.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Pause after a rate-limit response before retrying (seconds).
    pub rate_limit_wait_seconds: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api: LmProvider::Ollama,
            model: "llama3.2:1b".to_string(),
            temperature: 0.0,
            rate_limit_wait_seconds: 61,
        }
    }
}

/// Batching settings for bulk operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Items per batch.
    pub batch_size: usize,
    /// Maximum batches in flight. 0 = unlimited.
    pub limit_parallel: usize,
    /// Show progress bars.
    pub show_progress: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 20,
            limit_parallel: 10,
            show_progress: true,
        }
    }
}

/// Agent loop budgets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum model round-trips per run.
    pub max_iterations: usize,
    /// Maximum tool invocations per run.
    pub max_tool_calls: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_tool_calls: 10,
        }
    }
}

/// Chunking service parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Characters per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory with `agent.toml` / `rag.toml` overrides.
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl BatchSettings {
    /// Parallelism cap for the scheduler.
    pub fn limit(&self) -> Option<usize> {
        match self.limit_parallel {
            0 => None,
            n => Some(n),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    ///
    /// Environment variables fill in any service setting the file leaves unset.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Fill unset service settings from the environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let services = &mut self.services;
        let pairs: [(&mut Option<String>, &str); 7] = [
            (&mut services.chunking_base, "COCO_CHUNK_URL_BASE"),
            (&mut services.db_api_base, "COCO_DB_API_URL_BASE"),
            (&mut services.transcription_base, "COCO_TRANSCRIPTION_URL_BASE"),
            (&mut services.ollama_base, "COCO_OLLAMA_URL_BASE"),
            (&mut services.openai_base, "COCO_OPENAI_URL_BASE"),
            (&mut services.api_key, "COCO_API_KEY"),
            (&mut services.openai_api_key, "OPENAI_API_KEY"),
        ];
        for (slot, key) in pairs {
            if slot.as_deref().map_or(true, str::is_empty) {
                if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                    *slot = Some(value);
                }
            }
        }
    }

    /// Check that every service the configured providers need has a URL
    /// and that batching is usable.
    pub fn validate(&self) -> Result<()> {
        let services = &self.services;
        let require = |value: &Option<String>, what: &str| match value.as_deref() {
            Some(v) if !v.is_empty() => Ok(()),
            _ => Err(CocoError::Config(format!("{} is not set", what))),
        };

        require(&services.chunking_base, "Chunking base URL")?;
        require(&services.db_api_base, "DB API base URL")?;
        require(&services.transcription_base, "Transcription base URL")?;
        if self.uses(LmProvider::Ollama) {
            require(&services.ollama_base, "Ollama base URL")?;
        }
        if self.uses(LmProvider::OpenAI) {
            require(&services.openai_base, "OpenAI base URL")?;
        }
        require(&services.api_key, "API key")?;
        if self.batching.batch_size == 0 {
            return Err(CocoError::Config("batching.batch_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Whether embeddings or generation go through `provider`.
    pub fn uses(&self, provider: LmProvider) -> bool {
        self.embedding.api == provider || self.llm.api == provider
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CocoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coco")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Request timeout, defaulting to five minutes.
    pub fn timeout(&self) -> std::time::Duration {
        match self.services.timeout_seconds {
            0 => std::time::Duration::from_secs(300),
            secs => std::time::Duration::from_secs(secs),
        }
    }
}
