//! Running many independent agent sessions.

use super::{Agent, AgentRun};
use crate::batch::BatchScheduler;
use crate::config::BatchSettings;
use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

impl Agent {
    /// One agent run per query, fanned out through the batch scheduler.
    ///
    /// Each query gets its own conversation. Runs inside a batch are
    /// sequential, so at most `limit_parallel` runs are active at once.
    pub async fn run_parallel(&self, queries: Vec<String>, batching: &BatchSettings) -> Result<Vec<AgentRun>> {
        info!("Running {} agent sessions in batches of {}", queries.len(), batching.batch_size);
        let scheduler = BatchScheduler::from_settings(batching)
            .with_progress_if(batching.show_progress, "Agent runs");

        scheduler
            .run(
                |queries: Vec<String>| async move {
                    let mut runs = Vec::with_capacity(queries.len());
                    for query in &queries {
                        runs.push(self.ask(query).await?);
                    }
                    Ok(runs)
                },
                queries,
            )
            .await
    }

    /// Final answers of [`Agent::run_parallel`].
    pub async fn answer_parallel(&self, queries: Vec<String>, batching: &BatchSettings) -> Result<Vec<String>> {
        Ok(answers(self.run_parallel(queries, batching).await?))
    }

    /// One agent run per query, strictly one after another.
    pub async fn run_sequential(&self, queries: &[String], show_progress: bool) -> Result<Vec<AgentRun>> {
        let pb = show_progress.then(|| sequential_bar(queries.len()));
        let mut runs = Vec::with_capacity(queries.len());

        for query in queries {
            let run = self.ask(query).await;
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            match run {
                Ok(run) => runs.push(run),
                Err(e) => {
                    if let Some(pb) = &pb {
                        pb.finish_and_clear();
                    }
                    return Err(e);
                }
            }
        }

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }
        Ok(runs)
    }

    /// Final answers of [`Agent::run_sequential`].
    pub async fn answer_sequential(&self, queries: &[String], show_progress: bool) -> Result<Vec<String>> {
        Ok(answers(self.run_sequential(queries, show_progress).await?))
    }
}

fn answers(runs: Vec<AgentRun>) -> Vec<String> {
    runs.into_iter().map(|run| run.content).collect()
}

fn sequential_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("  {spinner:.green} Agent runs [{bar:30.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("█▓░"));
    }
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentOptions;
    use crate::lm::testing::ScriptedModel;
    use crate::lm::{ChatResponse, Message, Role};
    use crate::tools::ToolRegistry;
    use std::sync::Arc;

    fn agent(model: Arc<ScriptedModel>) -> Agent {
        Agent::new(
            model,
            Arc::new(ToolRegistry::new()),
            "system",
            AgentOptions::default(),
        )
    }

    fn queries(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("question {}", i)).collect()
    }

    fn batching() -> BatchSettings {
        BatchSettings {
            batch_size: 2,
            limit_parallel: 2,
            show_progress: false,
        }
    }

    #[tokio::test]
    async fn test_parallel_runs_use_fresh_conversations() {
        let model = Arc::new(ScriptedModel::always(ChatResponse::text("done")));
        let runs = agent(model.clone())
            .run_parallel(queries(5), &batching())
            .await
            .unwrap();

        assert_eq!(runs.len(), 5);
        for (i, run) in runs.iter().enumerate() {
            assert_eq!(run.history.len(), 3);
            assert_eq!(run.history[1], Message::user(format!("question {}", i)));
        }
        for seen in model.seen.lock().unwrap().iter() {
            assert_eq!(seen.iter().filter(|m| m.role == Role::User).count(), 1);
        }
    }

    #[tokio::test]
    async fn test_sequential_answers_only() {
        let model = Arc::new(ScriptedModel::new(vec![
            ChatResponse::text("first"),
            ChatResponse::text("second"),
        ]));
        let answers = agent(model)
            .answer_sequential(&queries(2), false)
            .await
            .unwrap();
        assert_eq!(answers, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_parallel_answers_only() {
        let model = Arc::new(ScriptedModel::always(ChatResponse::text("same")));
        let answers = agent(model)
            .answer_parallel(queries(3), &batching())
            .await
            .unwrap();
        assert_eq!(answers, vec!["same"; 3]);
    }
}
