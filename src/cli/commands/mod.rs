//! CLI command implementations.

mod agent;
mod health;
mod ingest;
mod retrieve;
mod tools;
mod transcribe;

pub use agent::run_agent;
pub use health::run_health;
pub use ingest::run_ingest;
pub use retrieve::run_retrieve;
pub use tools::run_tools;
pub use transcribe::run_transcribe;
