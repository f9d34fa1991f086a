//! Property-based tests for the batch scheduler.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use proptest::prelude::*;

use coco::batch::{BatchScheduler, Broadcast};
use coco::CocoError;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap()
}

#[derive(Default)]
struct Gauge {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    async fn hold(&self, delay_ms: u64) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

// ── Strategies ─────────────────────────────────────────────────────

fn arb_items() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..1000, 0..60)
}

fn arb_batch_size() -> impl Strategy<Value = usize> {
    1usize..=25
}

fn arb_limit() -> impl Strategy<Value = Option<usize>> {
    prop::option::of(1usize..=6)
}

// ── Properties ─────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn result_does_not_depend_on_batching(
        items in arb_items(),
        batch_size in arb_batch_size(),
        limit in arb_limit(),
        offset in 0u64..100,
    ) {
        let expected: Vec<u64> = items.iter().map(|x| x * 2 + offset).collect();

        let out: Vec<u64> = runtime().block_on(async {
            BatchScheduler::new(batch_size)
                .with_limit(limit)
                .run(
                    |(items, Broadcast(offset)): (Vec<u64>, Broadcast<u64>)| async move {
                        Ok(items.iter().map(|x| x * 2 + offset).collect())
                    },
                    (items.clone(), Broadcast(offset)),
                )
                .await
                .unwrap()
        });

        prop_assert_eq!(out, expected);
    }

    #[test]
    fn order_survives_uneven_completion(
        delays in prop::collection::vec(0u64..5, 1..30),
        batch_size in 1usize..=4,
    ) {
        let indexed: Vec<(usize, u64)> = delays.iter().copied().enumerate().collect();

        let (positions, echoed): (Vec<usize>, Vec<u64>) = runtime().block_on(async {
            BatchScheduler::new(batch_size)
                .run(
                    |batch: Vec<(usize, u64)>| async move {
                        // later batches finish first when their delays are shorter
                        let wait = batch.iter().map(|(_, d)| *d).sum::<u64>();
                        tokio::time::sleep(Duration::from_millis(wait)).await;
                        Ok(batch.into_iter().unzip())
                    },
                    indexed,
                )
                .await
                .unwrap()
        });

        prop_assert_eq!(positions, (0..delays.len()).collect::<Vec<_>>());
        prop_assert_eq!(echoed, delays);
    }

    #[test]
    fn in_flight_batches_never_exceed_limit(
        n_items in 1usize..40,
        batch_size in 1usize..=5,
        limit in 1usize..=4,
    ) {
        let gauge = Gauge::default();
        let g = &gauge;

        let out: Vec<usize> = runtime().block_on(async {
            BatchScheduler::new(batch_size)
                .with_limit(Some(limit))
                .run(
                    move |items: Vec<usize>| async move {
                        g.hold(2).await;
                        Ok(items)
                    },
                    (0..n_items).collect::<Vec<_>>(),
                )
                .await
                .unwrap()
        });

        prop_assert_eq!(out.len(), n_items);
        prop_assert!(gauge.peak.load(Ordering::SeqCst) <= limit);
    }

    #[test]
    fn mismatched_lists_are_rejected(
        short in 1usize..10,
        extra in 1usize..10,
        batch_size in 1usize..=3,
    ) {
        let long = short + extra * batch_size;

        let result: Result<Vec<usize>, CocoError> = runtime().block_on(async {
            BatchScheduler::new(batch_size)
                .run(
                    |(a, _b): (Vec<usize>, Vec<usize>)| async move { Ok(a) },
                    (vec![0; short], vec![0; long]),
                )
                .await
        });

        let is_mismatch = matches!(result, Err(CocoError::BatchMismatch { .. }));
        prop_assert!(is_mismatch);
    }
}
