//! Chat messages exchanged with language-model backends.

use crate::tools::ToolCall;
use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(name)
    }
}

/// One entry of a conversation.
///
/// Assistant messages may carry requested tool calls; tool messages carry
/// the id and name of the call they answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant turn requesting a single tool call.
    pub fn tool_request(call: ToolCall) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: vec![call],
            tool_call_id: None,
            name: None,
        }
    }

    /// Tool output answering `call`.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call.id.clone()),
            name: Some(call.name.clone()),
        }
    }

    /// Content, or the empty string.
    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn test_text_message_serialization() {
        let value = serde_json::to_value(Message::user("hello")).unwrap();
        assert_eq!(value, json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn test_tool_exchange_serialization() {
        let call = ToolCall::new("tool_call_0", "get_secret_word", Map::new());

        let request = serde_json::to_value(Message::tool_request(call.clone())).unwrap();
        assert_eq!(request["role"], "assistant");
        assert_eq!(request["content"], serde_json::Value::Null);
        assert_eq!(request["tool_calls"][0]["id"], "tool_call_0");
        assert_eq!(request["tool_calls"][0]["type"], "function");

        let result = serde_json::to_value(Message::tool_result(&call, "{}")).unwrap();
        assert_eq!(
            result,
            json!({
                "role": "tool",
                "content": "{}",
                "tool_call_id": "tool_call_0",
                "name": "get_secret_word"
            })
        );
    }

    #[test]
    fn test_round_trip_through_json() {
        let call = ToolCall::new("call_1", "semantic_query", Map::new());
        let history = vec![
            Message::system("be brief"),
            Message::tool_request(call.clone()),
            Message::tool_result(&call, "[]"),
        ];
        let text = serde_json::to_string(&history).unwrap();
        let back: Vec<Message> = serde_json::from_str(&text).unwrap();
        assert_eq!(back, history);
    }
}
