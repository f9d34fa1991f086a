//! Agent command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the agent on each query in its own conversation.
pub async fn run_agent(
    queries: &[String],
    sequential: bool,
    answers_only: bool,
    model: Option<String>,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let settings = orchestrator.settings();
    let mut agent = orchestrator.agent().clone();
    if let Some(model) = &model {
        agent = agent.with_model(model);
    }

    let show_progress = settings.batching.show_progress && !answers_only;
    let runs = if sequential {
        agent.run_sequential(queries, show_progress).await?
    } else {
        let mut batching = settings.batching.clone();
        batching.show_progress = show_progress;
        agent.run_parallel(queries.to_vec(), &batching).await?
    };

    if answers_only {
        for run in &runs {
            println!("{}", run.content.trim());
        }
        return Ok(());
    }

    for (query, run) in queries.iter().zip(&runs) {
        Output::header(query);
        println!("\n{}\n", run.content.trim());

        if !run.tool_calls.is_empty() {
            Output::info(&format!("Tool calls ({})", run.tool_calls.len()));
            for call in &run.tool_calls {
                Output::list_item(&truncate(&call.to_string(), 80));
            }
        }
        Output::info(&format!("Completed in {} iteration(s)", run.iterations));
    }
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
