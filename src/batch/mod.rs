//! Batched, concurrency-limited execution of bulk operations.
//!
//! Any operation taking list-shaped arguments can be driven through a
//! [`BatchScheduler`]: the lists are cut into fixed-size slices, the slices
//! run concurrently under a parallelism cap, and the per-slice results are
//! reassembled in input order.
//!
//! ```rust,no_run
//! use coco::batch::{BatchScheduler, Broadcast};
//!
//! # async fn demo() -> coco::Result<()> {
//! let scheduler = BatchScheduler::new(20).with_limit(Some(10));
//! let lengths: Vec<usize> = scheduler
//!     .run(
//!         |(chunks, Broadcast(model)): (Vec<String>, Broadcast<String>)| async move {
//!             let _ = model;
//!             Ok(chunks.iter().map(|c| c.len()).collect())
//!         },
//!         (vec!["a".to_string(), "bb".to_string()], Broadcast("nomic-embed-text".to_string())),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod args;
mod scheduler;

pub use args::{BatchArg, BatchArgs, BatchOutput, Broadcast};
pub use scheduler::BatchScheduler;
