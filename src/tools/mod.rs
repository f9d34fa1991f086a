//! Tool registry and dispatch for the agent loop.
//!
//! Tools are described by a [`ToolDefinition`] (name, description, typed
//! parameters) bound to an async implementation. The [`ToolRegistry`]
//! advertises their schemas to the model and executes requested
//! [`ToolCall`]s after coercing the arguments to the declared types.

pub mod builtin;
mod coerce;
mod definition;
mod registry;

pub use builtin::ToolContext;
pub use coerce::coerce_value;
pub use definition::{
    arguments_map, ParamType, ToolArgs, ToolCall, ToolDefinition, ToolFn, ToolFuture,
    ToolParameter,
};
pub use registry::ToolRegistry;
