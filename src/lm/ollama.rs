//! Ollama backend over its REST API.

use super::{ChatResponse, Generation, LanguageModel, Message, RequestedToolCall, Role};
use crate::config::LmProvider;
use crate::error::{CocoError, Result};
use crate::tools::{arguments_map, ToolDefinition};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Context window Ollama applies when the request does not set `num_ctx`.
const DEFAULT_CONTEXT: u64 = 2048;

#[derive(Debug, Serialize, Default)]
struct Options {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<usize>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    options: Options,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    options: Options,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: Role,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OllamaToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Token accounting shared by generate and chat responses.
#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    /// Nanoseconds.
    #[serde(default)]
    eval_duration: Option<u64>,
}

impl Usage {
    fn tokens_per_second(&self) -> f64 {
        match (self.eval_count, self.eval_duration) {
            (Some(count), Some(duration)) if duration > 0 => {
                count as f64 / duration as f64 * 1e9
            }
            _ => 0.0,
        }
    }

    fn filled_default_context(&self) -> bool {
        self.prompt_eval_count == Some(DEFAULT_CONTEXT)
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(flatten)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    message: ReplyMessage,
    #[serde(flatten)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ShowResponse {
    #[serde(default)]
    model_info: Map<String, Value>,
}

/// Language model served by a local Ollama instance.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: crate::openai::http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &impl Serialize) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(CocoError::LanguageModel(format!(
                "Ollama {} returned {}: {}",
                path, status, detail
            )));
        }
        Ok(response.json().await?)
    }

    /// Larger context for a retry after the prompt filled the default window.
    async fn extended_context(&self, model: &str) -> Option<usize> {
        match self.context_length(model).await {
            Ok(Some(length)) if length as u64 > DEFAULT_CONTEXT => Some(length),
            Ok(_) => None,
            Err(e) => {
                warn!("Could not read context length of {}: {}", model, e);
                None
            }
        }
    }

    async fn generate_one(&self, prompt: &str, model: &str, temperature: f32) -> Result<(String, f64)> {
        let mut request = GenerateRequest {
            model,
            prompt,
            options: Options {
                temperature,
                num_ctx: None,
            },
            stream: false,
        };
        let mut reply: GenerateResponse = self.post("/api/generate", &request).await?;

        if reply.usage.filled_default_context() {
            if let Some(num_ctx) = self.extended_context(model).await {
                warn!(
                    "Prompt filled the default context of {}; retrying with num_ctx={}",
                    model, num_ctx
                );
                request.options.num_ctx = Some(num_ctx);
                match self.post("/api/generate", &request).await {
                    Ok(retried) => reply = retried,
                    Err(e) => warn!("Retry with larger context failed, keeping first reply: {}", e),
                }
            }
        }

        let speed = reply.usage.tokens_per_second();
        Ok((reply.response, speed))
    }

    async fn chat_once(&self, mut request: ChatRequest<'_>) -> Result<ChatReply> {
        let reply: ChatReply = self.post("/api/chat", &request).await?;
        if !reply.usage.filled_default_context() {
            return Ok(reply);
        }

        let Some(num_ctx) = self.extended_context(request.model).await else {
            return Ok(reply);
        };
        warn!(
            "Conversation filled the default context of {}; retrying with num_ctx={}",
            request.model, num_ctx
        );
        request.options.num_ctx = Some(num_ctx);
        match self.post("/api/chat", &request).await {
            Ok(retried) => Ok(retried),
            Err(e) => {
                warn!("Retry with larger context failed, keeping first reply: {}", e);
                Ok(reply)
            }
        }
    }

    async fn model_info(&self, model: &str) -> Result<Map<String, Value>> {
        let show: ShowResponse = self
            .post("/api/show", &serde_json::json!({ "model": model }))
            .await?;
        Ok(show.model_info)
    }
}

fn to_ollama(message: &Message) -> OllamaMessage {
    OllamaMessage {
        role: message.role,
        content: message.content_str().to_string(),
        tool_calls: message
            .tool_calls
            .iter()
            .map(|call| OllamaToolCall {
                function: OllamaFunction {
                    name: call.name.clone(),
                    arguments: Value::Object(call.arguments.clone()),
                },
            })
            .collect(),
        tool_name: match message.role {
            Role::Tool => message.name.clone(),
            _ => None,
        },
    }
}

fn find_info_u64(info: &Map<String, Value>, suffix: &str) -> Option<u64> {
    info.iter()
        .find(|(key, _)| key.ends_with(suffix))
        .and_then(|(_, value)| value.as_u64())
}

#[async_trait]
impl LanguageModel for OllamaBackend {
    fn provider(&self) -> LmProvider {
        LmProvider::Ollama
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let reply: EmbedResponse = self
            .post("/api/embed", &serde_json::json!({ "model": model, "input": texts }))
            .await?;

        if reply.embeddings.len() != texts.len() {
            return Err(CocoError::Embedding(format!(
                "Ollama returned {} embeddings for {} texts",
                reply.embeddings.len(),
                texts.len()
            )));
        }
        debug!("Embedded {} texts with {}", texts.len(), model);
        Ok(reply.embeddings)
    }

    #[instrument(skip(self, prompts), fields(count = prompts.len()))]
    async fn generate(&self, prompts: &[String], model: &str, temperature: f32) -> Result<Generation> {
        let mut texts = Vec::with_capacity(prompts.len());
        let mut speeds = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let (text, speed) = self.generate_one(prompt, model, temperature).await?;
            texts.push(text);
            speeds.push(speed);
        }
        Ok((texts, speeds))
    }

    #[instrument(skip(self, conversations), fields(count = conversations.len()))]
    async fn chat(&self, conversations: &[Vec<Message>], model: &str) -> Result<Generation> {
        let mut texts = Vec::with_capacity(conversations.len());
        let mut speeds = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let reply = self
                .chat_once(ChatRequest {
                    model,
                    messages: conversation.iter().map(to_ollama).collect(),
                    tools: Vec::new(),
                    options: Options::default(),
                    stream: false,
                })
                .await?;
            speeds.push(reply.usage.tokens_per_second());
            texts.push(reply.message.content.unwrap_or_default());
        }
        Ok((texts, speeds))
    }

    #[instrument(skip(self, messages, tools), fields(messages = messages.len()))]
    async fn tool_chat(
        &self,
        messages: &[Message],
        model: &str,
        tools: &[ToolDefinition],
        temperature: f32,
        stream: bool,
    ) -> Result<ChatResponse> {
        if stream {
            return Err(CocoError::Unsupported(
                "streaming tool chat is not implemented for Ollama".to_string(),
            ));
        }

        let reply = self
            .chat_once(ChatRequest {
                model,
                messages: messages.iter().map(to_ollama).collect(),
                tools: tools.iter().map(ToolDefinition::to_schema).collect(),
                options: Options {
                    temperature,
                    num_ctx: None,
                },
                stream: false,
            })
            .await?;

        let tool_calls = reply
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| RequestedToolCall {
                id: None,
                name: call.function.name,
                arguments: arguments_map(call.function.arguments),
            })
            .collect();

        Ok(ChatResponse {
            content: reply.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let tags: TagsResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn embedding_dimensions(&self, model: &str) -> Result<usize> {
        let probe = self.embed(&["dimension probe".to_string()], model).await?;
        probe
            .first()
            .map(Vec::len)
            .ok_or_else(|| CocoError::Embedding(format!("{} returned no embedding", model)))
    }

    async fn context_length(&self, model: &str) -> Result<Option<usize>> {
        let info = self.model_info(model).await?;
        Ok(find_info_u64(&info, ".context_length").map(|n| n as usize))
    }

    #[instrument(skip(self))]
    async fn pull_model(&self, model: &str) -> Result<()> {
        let reply: Value = self
            .post(
                "/api/pull",
                &serde_json::json!({ "model": model, "stream": false }),
            )
            .await?;
        match reply.get("status").and_then(Value::as_str) {
            Some("success") => Ok(()),
            other => Err(CocoError::LanguageModel(format!(
                "Pulling {} ended with status {:?}",
                model, other
            ))),
        }
    }
}
