//! Language-model backends.
//!
//! A [`LanguageModel`] embeds text, generates completions and holds
//! tool-calling chats. Two backends exist, chosen by [`LmProvider`]:
//! a local Ollama server and any OpenAI-compatible API.
//! [`LanguageModelClient`] adds the batched bulk variants on top.

mod message;
mod ollama;
mod openai;

pub use message::{Message, Role};
pub use ollama::OllamaBackend;
pub use openai::OpenAIBackend;

use crate::batch::{BatchScheduler, Broadcast};
use crate::config::{BatchSettings, LmProvider, Settings};
use crate::error::{CocoError, Result};
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

/// Texts with the generation speed (tokens per second) of each.
pub type Generation = (Vec<String>, Vec<f64>);

/// A tool invocation as requested by the model, before id assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestedToolCall {
    /// Provider-assigned id. Ollama never sends one.
    pub id: Option<String>,
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// One assistant turn of a tool-calling chat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<RequestedToolCall>,
}

impl ChatResponse {
    /// A plain text answer with no tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }
}

/// A language-model backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn provider(&self) -> LmProvider;

    /// One embedding per input text, in input order.
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>>;

    /// One completion per prompt, in input order.
    async fn generate(&self, prompts: &[String], model: &str, temperature: f32)
        -> Result<Generation>;

    /// One reply per conversation, in input order.
    async fn chat(&self, conversations: &[Vec<Message>], model: &str) -> Result<Generation>;

    /// A single chat turn that may request tool calls.
    async fn tool_chat(
        &self,
        messages: &[Message],
        model: &str,
        tools: &[ToolDefinition],
        temperature: f32,
        stream: bool,
    ) -> Result<ChatResponse>;

    async fn list_models(&self) -> Result<Vec<String>>;

    /// Length of the vectors produced by `model`.
    async fn embedding_dimensions(&self, model: &str) -> Result<usize>;

    /// Context window of `model`, when the backend reports it.
    async fn context_length(&self, _model: &str) -> Result<Option<usize>> {
        Ok(None)
    }

    /// Download `model` onto the backend.
    async fn pull_model(&self, model: &str) -> Result<()> {
        Err(CocoError::Unsupported(format!(
            "{} cannot pull model {}",
            self.provider(),
            model
        )))
    }
}

/// Create the backend for `provider` from service settings.
pub fn create_backend(provider: LmProvider, settings: &Settings) -> Result<Arc<dyn LanguageModel>> {
    let services = &settings.services;
    let missing = |what: &str| CocoError::Config(format!("{} is not set", what));

    Ok(match provider {
        LmProvider::Ollama => {
            let base = services
                .ollama_base
                .as_deref()
                .ok_or_else(|| missing("Ollama base URL"))?;
            Arc::new(OllamaBackend::new(base, settings.timeout()))
        }
        LmProvider::OpenAI => {
            let base = services
                .openai_base
                .as_deref()
                .ok_or_else(|| missing("OpenAI base URL"))?;
            Arc::new(
                OpenAIBackend::new(base, services.openai_api_key.as_deref(), settings.timeout())
                    .with_rate_limit_wait(std::time::Duration::from_secs(
                        settings.llm.rate_limit_wait_seconds,
                    )),
            )
        }
    })
}

/// A backend plus the batching policy for its bulk operations.
#[derive(Clone)]
pub struct LanguageModelClient {
    backend: Arc<dyn LanguageModel>,
    batching: BatchSettings,
}

impl LanguageModelClient {
    pub fn new(backend: Arc<dyn LanguageModel>, batching: BatchSettings) -> Self {
        Self { backend, batching }
    }

    pub fn backend(&self) -> &Arc<dyn LanguageModel> {
        &self.backend
    }

    /// Pull `model` unless the backend already lists it.
    pub async fn ensure_model(&self, model: &str) -> Result<()> {
        if self.backend.list_models().await?.iter().any(|m| m == model) {
            return Ok(());
        }
        info!("Pulling model {} because it is not available", model);
        self.backend.pull_model(model).await?;
        info!("Pulled model {}", model);
        Ok(())
    }

    fn scheduler(&self, description: &str) -> BatchScheduler {
        BatchScheduler::from_settings(&self.batching)
            .with_progress_if(self.batching.show_progress, description)
    }

    /// Embed any number of texts in batches.
    pub async fn embed_multiple(&self, texts: Vec<String>, model: &str) -> Result<Vec<Vec<f32>>> {
        let backend = &self.backend;
        self.scheduler("Embedding")
            .run(
                move |(texts, Broadcast(model)): (Vec<String>, Broadcast<String>)| async move {
                    backend.embed(&texts, &model).await
                },
                (texts, Broadcast(model.to_string())),
            )
            .await
    }

    /// Generate completions for any number of prompts in batches.
    pub async fn generate_multiple(
        &self,
        prompts: Vec<String>,
        model: &str,
        temperature: f32,
    ) -> Result<Generation> {
        let backend = &self.backend;
        self.scheduler("Generating")
            .run(
                move |(prompts, Broadcast(model), Broadcast(temperature)): (
                    Vec<String>,
                    Broadcast<String>,
                    Broadcast<f32>,
                )| async move { backend.generate(&prompts, &model, temperature).await },
                (prompts, Broadcast(model.to_string()), Broadcast(temperature)),
            )
            .await
    }

    /// Reply to any number of conversations in batches.
    pub async fn chat_multiple(
        &self,
        conversations: Vec<Vec<Message>>,
        model: &str,
    ) -> Result<Generation> {
        let backend = &self.backend;
        self.scheduler("Chatting")
            .run(
                move |(conversations, Broadcast(model)): (Vec<Vec<Message>>, Broadcast<String>)| async move {
                    backend.chat(&conversations, &model).await
                },
                (conversations, Broadcast(model.to_string())),
            )
            .await
    }
}

/// Scripted backend for tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays queued chat responses and records every history it was shown.
    #[derive(Default)]
    pub struct ScriptedModel {
        responses: Mutex<VecDeque<Result<ChatResponse>>>,
        repeat: Option<ChatResponse>,
        pub seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedModel {
        pub fn new(responses: Vec<ChatResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(Ok).collect()),
                ..Default::default()
            }
        }

        /// Answer every turn with the same response.
        pub fn always(response: ChatResponse) -> Self {
            Self {
                repeat: Some(response),
                ..Default::default()
            }
        }

        pub fn push_error(&self, error: CocoError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        pub fn turns(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    /// Deterministic embedding: text length and vowel count.
    pub fn fake_embedding(text: &str) -> Vec<f32> {
        let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
        vec![text.len() as f32, vowels as f32, 1.0]
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn provider(&self) -> LmProvider {
            LmProvider::Ollama
        }

        async fn embed(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| fake_embedding(t)).collect())
        }

        async fn generate(
            &self,
            prompts: &[String],
            _model: &str,
            _temperature: f32,
        ) -> Result<Generation> {
            let texts = prompts.iter().map(|p| format!("answer: {}", p)).collect();
            Ok((texts, vec![10.0; prompts.len()]))
        }

        async fn chat(&self, conversations: &[Vec<Message>], _model: &str) -> Result<Generation> {
            let texts = conversations
                .iter()
                .map(|c| format!("{} messages", c.len()))
                .collect();
            Ok((texts, vec![10.0; conversations.len()]))
        }

        async fn tool_chat(
            &self,
            messages: &[Message],
            _model: &str,
            _tools: &[ToolDefinition],
            _temperature: f32,
            stream: bool,
        ) -> Result<ChatResponse> {
            if stream {
                return Err(CocoError::Unsupported("streaming".to_string()));
            }
            self.seen.lock().unwrap().push(messages.to_vec());
            if let Some(next) = self.responses.lock().unwrap().pop_front() {
                return next;
            }
            Ok(self.repeat.clone().unwrap_or_default())
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(vec!["scripted".to_string()])
        }

        async fn embedding_dimensions(&self, _model: &str) -> Result<usize> {
            Ok(3)
        }
    }
}
