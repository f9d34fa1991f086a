//! Agent system for tool-calling conversations.
//!
//! Provides an LLM agent that alternates between asking the model for its
//! next step and executing the tools it requests, within fixed budgets on
//! model round-trips and tool invocations.

mod bulk;
mod runner;

pub use runner::{Agent, AgentOptions, AgentRun};
