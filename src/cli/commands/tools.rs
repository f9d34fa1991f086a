//! Tools command - show what the agent can call.

use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Print the advertised tool schemas as JSON.
pub fn run_tools(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let schemas = orchestrator.tools().schemas();
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}
