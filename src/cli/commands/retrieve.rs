//! Retrieve command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::vector_store::{DateRange, SearchResult};
use anyhow::Result;
use chrono::NaiveDate;

/// Retrieve the closest chunks for each query, optionally answering it.
pub async fn run_retrieve(
    queries: &[String],
    n_results: usize,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    answer: bool,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let settings = orchestrator.settings();
    let dates = DateRange::new(start, end);
    let rag = orchestrator.rag();

    if answer {
        let answered = rag
            .ask_multiple(
                queries.to_vec(),
                n_results,
                &settings.embedding.model,
                &settings.llm.model,
                settings.llm.temperature,
                dates,
            )
            .await?;
        for (query, (text, sources)) in queries.iter().zip(answered) {
            Output::header(query);
            println!("\n{}\n", text.trim());
            print_results(&sources);
        }
        return Ok(());
    }

    let retrieved = rag
        .retrieve_multiple(queries.to_vec(), n_results, &settings.embedding.model, dates)
        .await?;
    for (query, results) in queries.iter().zip(retrieved) {
        Output::header(query);
        print_results(&results);
    }
    Ok(())
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        Output::warning("No matching documents.");
        return;
    }
    for result in results {
        Output::search_result(result);
    }
    println!();
}
