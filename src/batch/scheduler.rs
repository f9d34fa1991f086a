//! Concurrency-limited execution of batched operations.

use super::{BatchArgs, BatchOutput};
use crate::config::BatchSettings;
use crate::error::{CocoError, Result};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use tracing::{debug, warn};

/// Runs an operation over size-bounded slices of its list arguments.
///
/// The scheduler holds no state across calls; one instance can drive any
/// number of operations.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    limit_parallel: Option<usize>,
    progress: Option<String>,
}

impl BatchScheduler {
    /// Create a scheduler with no parallelism cap and no progress bar.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            limit_parallel: None,
            progress: None,
        }
    }

    /// Create a scheduler from configured batching settings.
    pub fn from_settings(settings: &BatchSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            limit_parallel: settings.limit(),
            progress: None,
        }
    }

    /// Cap the number of batches in flight at once. `None` runs all batches concurrently.
    pub fn with_limit(mut self, limit_parallel: Option<usize>) -> Self {
        self.limit_parallel = limit_parallel;
        self
    }

    /// Show a progress bar with the given description while batches complete.
    pub fn with_progress(mut self, description: &str) -> Self {
        self.progress = Some(description.to_string());
        self
    }

    /// Show a progress bar only if `enabled`.
    pub fn with_progress_if(self, enabled: bool, description: &str) -> Self {
        if enabled {
            self.with_progress(description)
        } else {
            self
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn limit_parallel(&self) -> Option<usize> {
        self.limit_parallel
    }

    /// Run `operation` over `args`.
    ///
    /// List-shaped arguments are sliced into batches of `batch_size`; scalar
    /// arguments are replicated into every batch. With at most one batch the
    /// operation is called once on the unsliced arguments. Results are
    /// concatenated in slice order regardless of completion order.
    ///
    /// The first failing batch fails the whole call; batches still in flight
    /// are dropped.
    pub async fn run<A, O, F, Fut>(&self, operation: F, args: A) -> Result<O>
    where
        A: BatchArgs,
        O: BatchOutput,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<O>>,
    {
        if self.batch_size == 0 {
            return Err(CocoError::Config("batch_size must be greater than 0".to_string()));
        }
        if self.limit_parallel == Some(0) {
            return Err(CocoError::Config(
                "limit_parallel must be greater than 0".to_string(),
            ));
        }

        let n_batches = match args.batch_count(self.batch_size)? {
            Some(n) if n > 1 => n,
            _ => return operation(args).await,
        };

        let limit = self.limit_parallel.unwrap_or(n_batches);
        debug!(
            "Running {} batches of up to {} items ({} in parallel)",
            n_batches, self.batch_size, limit
        );

        let batches = args.split(self.batch_size, n_batches);
        let pb = self.progress_bar(n_batches);

        let mut stream = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| {
                let fut = operation(batch);
                async move { (index, fut.await) }
            })
            .buffer_unordered(limit);

        let mut results: Vec<(usize, O)> = Vec::with_capacity(n_batches);
        while let Some((index, result)) = stream.next().await {
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            match result {
                Ok(output) => {
                    results.push((index, output));
                    debug!("Batch {} done ({}/{})", index, results.len(), n_batches);
                }
                Err(e) => {
                    if let Some(pb) = &pb {
                        pb.finish_and_clear();
                    }
                    warn!("Batch {} of {} failed: {}", index, n_batches, e);
                    return Err(e.in_batch(index));
                }
            }
        }

        if let Some(pb) = &pb {
            pb.finish_and_clear();
        }

        results.sort_by_key(|(index, _)| *index);
        Ok(O::concat(results.into_iter().map(|(_, output)| output).collect()))
    }

    fn progress_bar(&self, len: usize) -> Option<ProgressBar> {
        let description = self.progress.as_ref()?;
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("  {spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} batches")
        {
            pb.set_style(style.progress_chars("█▓░"));
        }
        pb.set_message(description.clone());
        Some(pb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::Broadcast;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Tracks how many operation bodies are active at once.
    #[derive(Default)]
    struct Gauge {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    impl Gauge {
        async fn track<T>(&self, delay_ms: u64, value: T) -> T {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            value
        }
    }

    #[tokio::test]
    async fn test_single_batch_runs_directly() {
        let gauge = Gauge::default();
        let g = &gauge;
        let scheduler = BatchScheduler::new(10);

        let out: Vec<i32> = scheduler
            .run(
                move |items: Vec<i32>| async move { Ok(g.track(0, items).await) },
                vec![1, 2, 3],
            )
            .await
            .unwrap();

        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(gauge.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_input_runs_directly() {
        let scheduler = BatchScheduler::new(4);
        let out: Vec<i32> = scheduler
            .run(|items: Vec<i32>| async move { Ok(items) }, Vec::new())
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        // Earlier batches sleep longer so they complete last.
        let scheduler = BatchScheduler::new(2);
        let input: Vec<u64> = (0..10).collect();

        let out: Vec<u64> = scheduler
            .run(
                |items: Vec<u64>| async move {
                    let delay = 50 - items[0] * 5;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Ok(items.into_iter().map(|x| x * 10).collect())
                },
                input,
            )
            .await
            .unwrap();

        assert_eq!(out, (0..10).map(|x| x * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_parallelism_limit_is_respected() {
        let gauge = Gauge::default();
        let g = &gauge;
        let scheduler = BatchScheduler::new(1).with_limit(Some(3));

        let out: Vec<usize> = scheduler
            .run(
                move |items: Vec<usize>| async move { Ok(g.track(10, items).await) },
                (0..12).collect(),
            )
            .await
            .unwrap();

        assert_eq!(out.len(), 12);
        assert_eq!(gauge.calls.load(Ordering::SeqCst), 12);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_unlimited_runs_all_batches_concurrently() {
        let gauge = Gauge::default();
        let g = &gauge;
        let scheduler = BatchScheduler::new(1);

        let _: Vec<usize> = scheduler
            .run(
                move |items: Vec<usize>| async move { Ok(g.track(20, items).await) },
                (0..5).collect(),
            )
            .await
            .unwrap();

        assert_eq!(gauge.peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_three_queries_two_batches_sequential() {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let gauge = Gauge::default();
        let g = &gauge;
        let scheduler = BatchScheduler::new(2).with_limit(Some(1));

        let queries = vec!["q1".to_string(), "q2".to_string(), "q3".to_string()];
        let out: Vec<String> = scheduler
            .run(
                |batch: Vec<String>| {
                    let sizes = sizes.clone();
                    async move {
                        sizes.lock().unwrap().push(batch.len());
                        let answers = batch.iter().map(|q| format!("answer to {}", q)).collect();
                        Ok(g.track(5, answers).await)
                    }
                },
                queries,
            )
            .await
            .unwrap();

        assert_eq!(*sizes.lock().unwrap(), vec![2, 1]);
        assert_eq!(gauge.peak.load(Ordering::SeqCst), 1);
        assert_eq!(out, vec!["answer to q1", "answer to q2", "answer to q3"]);
    }

    #[tokio::test]
    async fn test_scalars_reach_every_batch() {
        let scheduler = BatchScheduler::new(2);
        let out: Vec<String> = scheduler
            .run(
                |(texts, Broadcast(suffix)): (Vec<&'static str>, Broadcast<&'static str>)| async move {
                    Ok(texts.iter().map(|t| format!("{}-{}", t, suffix)).collect())
                },
                (vec!["a", "b", "c"], Broadcast("x")),
            )
            .await
            .unwrap();

        assert_eq!(out, vec!["a-x", "b-x", "c-x"]);
    }

    #[tokio::test]
    async fn test_tuple_results_are_zipped_per_position() {
        let scheduler = BatchScheduler::new(2).with_limit(Some(2));
        let (texts, lens): (Vec<String>, Vec<usize>) = scheduler
            .run(
                |items: Vec<&'static str>| async move {
                    let texts = items.iter().map(|s| s.to_uppercase()).collect();
                    let lens = items.iter().map(|s| s.len()).collect();
                    Ok((texts, lens))
                },
                vec!["a", "bb", "ccc", "dddd", "eeeee"],
            )
            .await
            .unwrap();

        assert_eq!(texts, vec!["A", "BB", "CCC", "DDDD", "EEEEE"]);
        assert_eq!(lens, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_mismatched_batches_fail_before_any_call() {
        let gauge = Gauge::default();
        let g = &gauge;
        let scheduler = BatchScheduler::new(2);

        let result: Result<Vec<i32>> = scheduler
            .run(
                move |(a, _b): (Vec<i32>, Vec<i32>)| async move { Ok(g.track(0, a).await) },
                (vec![1, 2, 3, 4, 5], vec![1, 2]),
            )
            .await;

        tokio_test::assert_err!(&result);
        assert!(matches!(result, Err(CocoError::BatchMismatch { .. })));
        assert_eq!(gauge.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_batch_fails_whole_run() {
        let scheduler = BatchScheduler::new(2).with_limit(Some(1));

        let result: Result<Vec<i32>> = scheduler
            .run(
                |items: Vec<i32>| async move {
                    if items.contains(&3) {
                        Err(CocoError::Database("connection reset".to_string()))
                    } else {
                        Ok(items)
                    }
                },
                vec![1, 2, 3, 4, 5],
            )
            .await;

        match result {
            Err(CocoError::Batch { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(*source, CocoError::Database(_)));
            }
            other => panic!("expected batch failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let scheduler = BatchScheduler::new(0);
        let result: Result<Vec<i32>> = scheduler
            .run(|items: Vec<i32>| async move { Ok(items) }, vec![1])
            .await;
        assert!(matches!(result, Err(CocoError::Config(_))));
    }
}
