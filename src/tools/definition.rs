//! Tool data model: parameters, definitions and requested calls.

use crate::error::{CocoError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::Arc;
use tracing::warn;

/// Declared JSON-schema type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Untyped; values pass through unchanged.
    Any,
}

impl ParamType {
    /// JSON-schema name advertised to the model.
    pub fn as_str(&self) -> &'static str {
        match self {
            // Untyped parameters are advertised as strings.
            ParamType::String | ParamType::Any => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolParameter {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
    pub default: Option<Value>,
    pub enum_values: Option<Vec<String>>,
}

impl ToolParameter {
    /// A parameter the model must always supply.
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    /// A parameter that may be omitted.
    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    /// Value used when the model omits this parameter.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Restrict the accepted values.
    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    fn schema(&self) -> Value {
        let mut spec = json!({
            "type": self.param_type.as_str(),
            "description": self.description,
        });
        if let Some(values) = &self.enum_values {
            spec["enum"] = json!(values);
        }
        spec
    }
}

/// Future returned by a tool implementation.
pub type ToolFuture = BoxFuture<'static, Result<Value>>;

/// Bound implementation of a tool.
pub type ToolFn = Arc<dyn Fn(ToolArgs) -> ToolFuture + Send + Sync>;

/// A named, schema-described callable capability.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    handler: ToolFn,
}

impl std::fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ToolDefinition {
    /// Create a tool bound to `handler`.
    pub fn new<F, Fut>(name: &str, description: &str, handler: F) -> Self
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            handler: Arc::new(move |args| handler(args).boxed()),
        }
    }

    /// Append a parameter declaration.
    pub fn param(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Look up a declared parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&ToolParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// JSON schema of the parameter object.
    pub fn parameters_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Function-calling schema understood by both Ollama and OpenAI.
    pub fn to_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters_schema(),
            }
        })
    }

    /// Call the bound implementation.
    pub async fn invoke(&self, args: ToolArgs) -> Result<Value> {
        (self.handler)(args).await
    }
}

/// Arguments handed to a tool implementation after coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    tool: String,
    values: Map<String, Value>,
}

impl ToolArgs {
    pub fn new(tool: &str, values: Map<String, Value>) -> Self {
        Self {
            tool: tool.to_string(),
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Required string argument.
    pub fn str(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(self.wrong_type(name, "string", other)),
            None => Err(self.missing(name)),
        }
    }

    /// Optional string argument.
    pub fn opt_str(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(self.wrong_type(name, "string", other)),
            None => Ok(None),
        }
    }

    /// Required integer argument.
    pub fn i64(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(v) => v.as_i64().ok_or_else(|| self.wrong_type(name, "integer", v)),
            None => Err(self.missing(name)),
        }
    }

    fn missing(&self, name: &str) -> CocoError {
        CocoError::MissingArgument {
            tool: self.tool.clone(),
            argument: name.to_string(),
        }
    }

    fn wrong_type(&self, name: &str, expected: &str, got: &Value) -> CocoError {
        CocoError::InvalidArgument(format!(
            "{}: '{}' should be {}, got {}",
            self.tool, name, expected, got
        ))
    }
}

/// A requested invocation of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireToolCall", from = "WireToolCall")]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Wire descriptor `{"id", "type": "function", "function": {"name", "arguments"}}`.
    pub fn to_wire(&self) -> Value {
        serde_json::to_value(WireToolCall::from(self.clone())).unwrap_or(Value::Null)
    }
}

impl std::fmt::Display for ToolCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, Value::Object(self.arguments.clone()))
    }
}

#[derive(Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

fn function_kind() -> String {
    "function".to_string()
}

impl From<ToolCall> for WireToolCall {
    fn from(call: ToolCall) -> Self {
        Self {
            id: call.id,
            kind: function_kind(),
            function: WireFunction {
                name: call.name,
                arguments: Value::Object(call.arguments),
            },
        }
    }
}

impl From<WireToolCall> for ToolCall {
    fn from(wire: WireToolCall) -> Self {
        Self {
            id: wire.id,
            name: wire.function.name,
            arguments: arguments_map(wire.function.arguments),
        }
    }
}

/// Normalise provider argument payloads (object or JSON-encoded string) to a map.
pub fn arguments_map(arguments: Value) -> Map<String, Value> {
    match arguments {
        Value::Object(map) => map,
        Value::String(text) if text.trim().is_empty() => Map::new(),
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => map,
            _ => {
                warn!("Ignoring tool arguments that are not a JSON object: {}", text);
                Map::new()
            }
        },
        Value::Null => Map::new(),
        other => {
            warn!("Ignoring tool arguments that are not a JSON object: {}", other);
            Map::new()
        }
    }
}
