//! Agent runner with tool calling loop.

use crate::config::Settings;
use crate::error::Result;
use crate::lm::{LanguageModel, Message, RequestedToolCall, Role};
use crate::tools::{ToolCall, ToolRegistry};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-run knobs of the agent loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOptions {
    pub model: String,
    /// Maximum model round-trips per run.
    pub max_iterations: usize,
    /// Maximum tool invocations per run, across all turns.
    pub max_tool_calls: usize,
    pub temperature: f32,
    pub stream: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2:1b".to_string(),
            max_iterations: 5,
            max_tool_calls: 10,
            temperature: 0.0,
            stream: false,
        }
    }
}

impl AgentOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            model: settings.llm.model.clone(),
            max_iterations: settings.agent.max_iterations,
            max_tool_calls: settings.agent.max_tool_calls,
            temperature: settings.llm.temperature,
            stream: false,
        }
    }
}

/// Result of one agent run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRun {
    /// Final (or last seen) assistant content.
    pub content: String,
    /// Every tool call executed, in order.
    pub tool_calls: Vec<ToolCall>,
    /// Result of each entry in `tool_calls`.
    pub tool_results: Vec<Value>,
    /// Complete transcript of the run.
    pub history: Vec<Message>,
    /// Model round-trips used.
    pub iterations: usize,
}

/// Agent that lets a language model call registered tools.
#[derive(Clone)]
pub struct Agent {
    backend: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    options: AgentOptions,
}

impl Agent {
    pub fn new(
        backend: Arc<dyn LanguageModel>,
        tools: Arc<ToolRegistry>,
        system_prompt: &str,
        options: AgentOptions,
    ) -> Self {
        Self {
            backend,
            tools,
            system_prompt: system_prompt.to_string(),
            options,
        }
    }

    /// Same agent, different model.
    pub fn with_model(mut self, model: &str) -> Self {
        self.options.model = model.to_string();
        self
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run the loop on a fresh conversation holding only `query`.
    pub async fn ask(&self, query: &str) -> Result<AgentRun> {
        self.run(vec![Message::user(query)]).await
    }

    /// Run the loop over an existing conversation.
    ///
    /// The system prompt is prepended unless `history` already has one.
    /// The loop stops when the model answers without requesting tools, when
    /// the tool-call budget is spent, or after `max_iterations` model calls.
    /// Budget exhaustion is not an error; backend and tool failures are,
    /// and carry the conversation accumulated up to that point.
    pub async fn run(&self, history: Vec<Message>) -> Result<AgentRun> {
        let mut history = history;
        if !history.iter().any(|m| m.role == Role::System) {
            history.insert(0, Message::system(self.system_prompt.as_str()));
        }

        let opts = &self.options;
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut tool_results: Vec<Value> = Vec::new();
        let mut content = String::new();
        let mut iterations = 0;

        while iterations < opts.max_iterations {
            iterations += 1;
            debug!("Agent iteration {}", iterations);

            let response = match self
                .backend
                .tool_chat(
                    &history,
                    &opts.model,
                    self.tools.list_tools(),
                    opts.temperature,
                    opts.stream,
                )
                .await
            {
                Ok(response) => response,
                Err(e) => return Err(e.with_history(history)),
            };
            content = response.content;

            let budget_left = opts.max_tool_calls.saturating_sub(tool_calls.len());
            if response.tool_calls.is_empty() || budget_left == 0 {
                history.push(Message::assistant(content.as_str()));
                return Ok(AgentRun {
                    content,
                    tool_calls,
                    tool_results,
                    history,
                    iterations,
                });
            }

            if response.tool_calls.len() > budget_left {
                warn!(
                    "Model requested {} tool calls, only {} left in budget",
                    response.tool_calls.len(),
                    budget_left
                );
            }

            for requested in response.tool_calls.into_iter().take(budget_left) {
                let call = assign_id(requested, tool_calls.len());
                info!("Agent calling tool: {}", call);

                let result = match self.tools.execute(&call).await {
                    Ok(result) => result,
                    Err(e) => return Err(e.with_history(history)),
                };

                history.push(Message::tool_request(call.clone()));
                history.push(Message::tool_result(&call, result.to_string()));
                tool_calls.push(call);
                tool_results.push(result);
            }
        }

        warn!(
            "Agent stopped after {} iterations with {} tool calls",
            iterations,
            tool_calls.len()
        );
        history.push(Message::assistant(content.as_str()));
        Ok(AgentRun {
            content,
            tool_calls,
            tool_results,
            history,
            iterations,
        })
    }
}

/// Give a requested call its provider id, or `tool_call_{n}` for the n-th call of the run.
fn assign_id(requested: RequestedToolCall, index: usize) -> ToolCall {
    let id = requested
        .id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("tool_call_{}", index));
    ToolCall::new(id, requested.name, requested.arguments)
}
