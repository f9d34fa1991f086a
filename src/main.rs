//! Coco CLI entry point.

use anyhow::Result;
use clap::Parser;
use coco::cli::{commands, Cli, Commands};
use coco::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("coco={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(Some(&Settings::expand_path(path)))?,
        None => Settings::load()?,
    };

    match &cli.command {
        Commands::Health { strict } => {
            commands::run_health(*strict, settings).await?;
        }

        Commands::Tools => {
            commands::run_tools(settings)?;
        }

        Commands::Ingest { file, language, date } => {
            commands::run_ingest(file, language, *date, settings).await?;
        }

        Commands::Transcribe { audio, prompt, date } => {
            commands::run_transcribe(audio, prompt.as_deref(), *date, settings).await?;
        }

        Commands::Retrieve {
            queries,
            n_results,
            start,
            end,
            answer,
        } => {
            commands::run_retrieve(queries, *n_results, *start, *end, *answer, settings).await?;
        }

        Commands::Agent {
            queries,
            sequential,
            answers_only,
            model,
        } => {
            commands::run_agent(queries, *sequential, *answers_only, model.clone(), settings).await?;
        }
    }

    Ok(())
}
