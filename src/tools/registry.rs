//! Ordered collection of tools with name-based dispatch.

use super::coerce::coerce_value;
use super::{ToolArgs, ToolCall, ToolDefinition};
use crate::error::{CocoError, Result};
use serde_json::{Map, Value};
use tracing::{debug, info};

/// The set of tools available to an agent run.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from definitions, rejecting duplicate names.
    pub fn from_definitions(definitions: impl IntoIterator<Item = ToolDefinition>) -> Result<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    /// Add a tool. Names must be unique.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<()> {
        if self.get(&definition.name).is_some() {
            return Err(CocoError::Config(format!(
                "Tool '{}' is already registered",
                definition.name
            )));
        }
        debug!("Registered tool {}", definition.name);
        self.tools.push(definition);
        Ok(())
    }

    /// Tools in registration order.
    pub fn list_tools(&self) -> &[ToolDefinition] {
        &self.tools
    }

    /// Function-calling schemas in registration order.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools.iter().map(ToolDefinition::to_schema).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a requested call.
    ///
    /// Arguments are coerced to their declared types, missing optional
    /// parameters get their defaults, and undeclared arguments are passed
    /// through as-is.
    pub async fn execute(&self, call: &ToolCall) -> Result<Value> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| CocoError::ToolNotFound(call.name.clone()))?;

        let args = prepare_arguments(tool, &call.arguments)?;
        info!("Executing tool {} ({})", tool.name, call.id);
        tool.invoke(args).await
    }
}

fn prepare_arguments(tool: &ToolDefinition, raw: &Map<String, Value>) -> Result<ToolArgs> {
    let mut values = Map::new();
    for (name, value) in raw {
        let value = match tool.parameter(name) {
            Some(param) => coerce_value(name, value.clone(), param.param_type),
            None => value.clone(),
        };
        values.insert(name.clone(), value);
    }

    for param in &tool.parameters {
        let supplied = values.get(&param.name).is_some_and(|v| !v.is_null());
        if supplied {
            continue;
        }
        if let Some(default) = &param.default {
            values.insert(param.name.clone(), default.clone());
        } else if param.required {
            return Err(CocoError::MissingArgument {
                tool: tool.name.clone(),
                argument: param.name.clone(),
            });
        }
    }

    Ok(ToolArgs::new(&tool.name, values))
}
