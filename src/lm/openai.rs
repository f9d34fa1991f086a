//! Backend for OpenAI-compatible chat-completion APIs.

use super::{ChatResponse, Generation, LanguageModel, Message, RequestedToolCall, Role};
use crate::config::LmProvider;
use crate::error::{CocoError, Result};
use crate::openai::create_client_with_timeout;
use crate::tools::{arguments_map, ToolDefinition};
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse, CreateEmbeddingRequestArgs, EmbeddingInput, FunctionCall,
    FunctionObject,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Attempts per completion before giving up.
const MAX_ATTEMPTS: usize = 3;

/// Failures worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    RateLimited,
    NotFound,
    Decode,
}

fn classify(error: &OpenAIError) -> Option<Retry> {
    match error {
        OpenAIError::JSONDeserialize(_) => Some(Retry::Decode),
        OpenAIError::ApiError(api) => {
            let message = api.message.to_lowercase();
            if message.contains("rate limit") {
                Some(Retry::RateLimited)
            } else if message.contains("not found") {
                Some(Retry::NotFound)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn build_error(e: OpenAIError) -> CocoError {
    CocoError::OpenAI(format!("Failed to build request: {}", e))
}

/// Language model behind an OpenAI-compatible endpoint.
pub struct OpenAIBackend {
    client: Client<OpenAIConfig>,
    rate_limit_wait: Duration,
}

impl OpenAIBackend {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout: Duration) -> Self {
        Self {
            client: create_client_with_timeout(base_url, api_key, timeout),
            rate_limit_wait: Duration::from_secs(61),
        }
    }

    /// Pause after a rate-limit response before the next attempt.
    pub fn with_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    /// One completion with the fixed retry policy.
    async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        model: &str,
        temperature: Option<f32>,
    ) -> Result<(String, f64)> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(model).messages(messages);
        if let Some(t) = temperature {
            builder.temperature(t);
        }
        let request = builder.build().map_err(build_error)?;

        let mut attempt = 1;
        loop {
            let started = Instant::now();
            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    let elapsed = started.elapsed().as_secs_f64();
                    return Ok(completion_text(response, elapsed));
                }
                Err(e) => {
                    let retry = classify(&e).filter(|_| attempt < MAX_ATTEMPTS);
                    let Some(kind) = retry else {
                        return Err(CocoError::OpenAI(format!("Completion failed: {}", e)));
                    };
                    warn!(
                        "Completion attempt {}/{} failed ({:?}): {}",
                        attempt, MAX_ATTEMPTS, kind, e
                    );
                    if kind == Retry::RateLimited {
                        tokio::time::sleep(self.rate_limit_wait).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

fn completion_text(response: CreateChatCompletionResponse, elapsed_secs: f64) -> (String, f64) {
    let speed = match (&response.usage, elapsed_secs > 0.0) {
        (Some(usage), true) => f64::from(usage.completion_tokens) / elapsed_secs,
        _ => 0.0,
    };
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default();
    (text, speed)
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage> {
    let content = message.content_str().to_string();
    Ok(match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()
            .map_err(build_error)?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(build_error)?
            .into(),
        Role::Assistant => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(text) = &message.content {
                builder.content(text.clone());
            }
            if !message.tool_calls.is_empty() {
                let calls = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        Ok(ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: serde_json::to_string(&call.arguments)?,
                            },
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                builder.tool_calls(calls);
            }
            builder.build().map_err(build_error)?.into()
        }
        Role::Tool => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(message.tool_call_id.clone().unwrap_or_default())
            .content(content)
            .build()
            .map_err(build_error)?
            .into(),
    })
}

fn to_request_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>> {
    messages.iter().map(to_request_message).collect()
}

fn to_tool(definition: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: definition.name.clone(),
            description: Some(definition.description.clone()),
            parameters: Some(definition.parameters_schema()),
            strict: None,
        },
    }
}

#[async_trait]
impl LanguageModel for OpenAIBackend {
    fn provider(&self) -> LmProvider {
        LmProvider::OpenAI
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(model)
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()
            .map_err(|e| CocoError::Embedding(format!("Failed to build request: {}", e)))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| CocoError::OpenAI(format!("Embedding API error: {}", e)))?;

        // Sort by index to ensure correct order
        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        if data.len() != texts.len() {
            return Err(CocoError::Embedding(format!(
                "Received {} embeddings for {} texts",
                data.len(),
                texts.len()
            )));
        }
        debug!("Embedded {} texts with {}", texts.len(), model);
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }

    #[instrument(skip(self, prompts), fields(count = prompts.len()))]
    async fn generate(&self, prompts: &[String], model: &str, temperature: f32) -> Result<Generation> {
        let mut texts = Vec::with_capacity(prompts.len());
        let mut speeds = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let messages = to_request_messages(&[Message::user(prompt.as_str())])?;
            let (text, speed) = self.complete(messages, model, Some(temperature)).await?;
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
            let (text, speed) = self
                .complete(to_request_messages(conversation)?, model, None)
                .await?;
            texts.push(text);
            speeds.push(speed);
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
                "streaming tool chat is not implemented for OpenAI".to_string(),
            ));
        }

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(model)
            .messages(to_request_messages(messages)?)
            .temperature(temperature);
        if !tools.is_empty() {
            builder.tools(tools.iter().map(to_tool).collect::<Vec<_>>());
        }
        let request = builder.build().map_err(build_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CocoError::OpenAI(format!("Tool chat failed: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CocoError::LanguageModel("No response from model".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| RequestedToolCall {
                id: Some(call.id),
                name: call.function.name,
                arguments: arguments_map(Value::String(call.function.arguments)),
            })
            .collect();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let models = self
            .client
            .models()
            .list()
            .await
            .map_err(|e| CocoError::OpenAI(format!("Listing models failed: {}", e)))?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    async fn embedding_dimensions(&self, model: &str) -> Result<usize> {
        let probe = self.embed(&["dimension probe".to_string()], model).await?;
        probe
            .first()
            .map(Vec::len)
            .ok_or_else(|| CocoError::Embedding(format!("{} returned no embedding", model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCall;
    use serde_json::{json, Map};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn completion(message: Value) -> Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "test-model",
            "choices": [{"index": 0, "message": message, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 4, "total_tokens": 9}
        })
    }

    fn backend(server: &MockServer) -> OpenAIBackend {
        OpenAIBackend::new(&server.uri(), Some("test-key"), Duration::from_secs(5))
            .with_rate_limit_wait(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_tool_chat_keeps_provider_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "semantic_query", "arguments": "{\"query\": \"rust\"}"}
                }]
            }))))
            .mount(&server)
            .await;

        let reply = backend(&server)
            .tool_chat(&[Message::user("find rust")], "test-model", &[], 0.0, false)
            .await
            .unwrap();

        assert_eq!(reply.content, "");
        assert_eq!(reply.tool_calls[0].id.as_deref(), Some("call_abc"));
        assert_eq!(reply.tool_calls[0].arguments["query"], "rust");
    }

    #[tokio::test]
    async fn test_generate_retries_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "Model not found", "type": "invalid_request_error"}
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(json!({
                "role": "assistant",
                "content": "hello"
            }))))
            .mount(&server)
            .await;

        let (texts, speeds) = backend(&server)
            .generate(&["hi".to_string()], "test-model", 0.0)
            .await
            .unwrap();
        assert_eq!(texts, vec!["hello"]);
        assert!(speeds[0] >= 0.0);
    }

    #[tokio::test]
    async fn test_generate_gives_up_after_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"message": "Model not found", "type": "invalid_request_error"}
            })))
            .expect(3)
            .mount(&server)
            .await;

        let err = backend(&server)
            .generate(&["hi".to_string()], "test-model", 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, CocoError::OpenAI(_)));
    }

    #[test]
    fn test_assistant_tool_call_conversion() {
        let mut args = Map::new();
        args.insert("query".to_string(), json!("rust"));
        let call = ToolCall::new("tool_call_0", "semantic_query", args);

        let converted = to_request_message(&Message::tool_request(call.clone())).unwrap();
        let value = serde_json::to_value(&converted).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["tool_calls"][0]["id"], "tool_call_0");
        assert_eq!(
            value["tool_calls"][0]["function"]["arguments"],
            "{\"query\":\"rust\"}"
        );

        let result = to_request_message(&Message::tool_result(&call, "[]")).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "tool_call_0");
    }
}
