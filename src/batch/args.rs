//! Argument partitioning and result aggregation for batched operations.

use crate::error::{CocoError, Result};

/// A single argument of a batched operation.
///
/// List-shaped arguments (`Vec<T>`) are sliced into contiguous batches.
/// Everything else is wrapped in [`Broadcast`] and replicated unchanged
/// into every batch.
pub trait BatchArg: Sized {
    /// Number of batches this argument splits into, or `None` for scalars.
    fn batch_count(&self, batch_size: usize) -> Option<usize>;

    /// Split into exactly `n_batches` pieces.
    fn split(self, batch_size: usize, n_batches: usize) -> Vec<Self>;
}

impl<T> BatchArg for Vec<T> {
    fn batch_count(&self, batch_size: usize) -> Option<usize> {
        Some(self.len().div_ceil(batch_size))
    }

    fn split(self, batch_size: usize, n_batches: usize) -> Vec<Self> {
        let mut batches = Vec::with_capacity(n_batches);
        let mut items = self.into_iter().peekable();
        while items.peek().is_some() {
            batches.push(items.by_ref().take(batch_size).collect());
        }
        batches
    }
}

/// A scalar argument passed unchanged to every batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Broadcast<T>(pub T);

impl<T: Clone> BatchArg for Broadcast<T> {
    fn batch_count(&self, _batch_size: usize) -> Option<usize> {
        None
    }

    fn split(self, _batch_size: usize, n_batches: usize) -> Vec<Self> {
        vec![self; n_batches]
    }
}

/// The full argument set of a batched operation.
///
/// Implemented for a bare `Vec<T>` and for tuples of up to six [`BatchArg`]s.
pub trait BatchArgs: Sized {
    /// Common batch count of all list-shaped arguments.
    ///
    /// Returns `Ok(None)` when there are no list-shaped arguments and a
    /// [`CocoError::BatchMismatch`] when two lists disagree.
    fn batch_count(&self, batch_size: usize) -> Result<Option<usize>>;

    /// Split into `n_batches` argument sets, in slice order.
    fn split(self, batch_size: usize, n_batches: usize) -> Vec<Self>;
}

impl<T> BatchArgs for Vec<T> {
    fn batch_count(&self, batch_size: usize) -> Result<Option<usize>> {
        Ok(BatchArg::batch_count(self, batch_size))
    }

    fn split(self, batch_size: usize, n_batches: usize) -> Vec<Self> {
        BatchArg::split(self, batch_size, n_batches)
    }
}

fn merge_count(current: Option<usize>, next: Option<usize>) -> Result<Option<usize>> {
    match (current, next) {
        (Some(expected), Some(found)) if expected != found => {
            Err(CocoError::BatchMismatch { expected, found })
        }
        (Some(n), _) | (None, Some(n)) => Ok(Some(n)),
        (None, None) => Ok(None),
    }
}

macro_rules! impl_batch_args {
    ($($ty:ident : $var:ident : $idx:tt),+) => {
        impl<$($ty: BatchArg),+> BatchArgs for ($($ty,)+) {
            fn batch_count(&self, batch_size: usize) -> Result<Option<usize>> {
                let count = None;
                $(let count = merge_count(count, self.$idx.batch_count(batch_size))?;)+
                Ok(count)
            }

            fn split(self, batch_size: usize, n_batches: usize) -> Vec<Self> {
                let ($($var,)+) = self;
                $(let mut $var = $var.split(batch_size, n_batches).into_iter();)+
                (0..n_batches)
                    .map_while(|_| Some(($($var.next()?,)+)))
                    .collect()
            }
        }
    };
}

impl_batch_args!(A: a: 0);
impl_batch_args!(A: a: 0, B: b: 1);
impl_batch_args!(A: a: 0, B: b: 1, C: c: 2);
impl_batch_args!(A: a: 0, B: b: 1, C: c: 2, D: d: 3);
impl_batch_args!(A: a: 0, B: b: 1, C: c: 2, D: d: 3, E: e: 4);
impl_batch_args!(A: a: 0, B: b: 1, C: c: 2, D: d: 3, E: e: 4, F: f: 5);

/// Output of a batched operation, indexed like its list-shaped inputs.
///
/// A single `Vec<T>` is flattened in slice order. A tuple of vectors is
/// flattened element-wise, each position keeping slice order.
pub trait BatchOutput: Sized {
    fn concat(parts: Vec<Self>) -> Self;
}

impl<T> BatchOutput for Vec<T> {
    fn concat(parts: Vec<Self>) -> Self {
        parts.into_iter().flatten().collect()
    }
}

macro_rules! impl_batch_output {
    ($($ty:ident : $var:ident : $idx:tt),+) => {
        impl<$($ty),+> BatchOutput for ($(Vec<$ty>,)+) {
            fn concat(parts: Vec<Self>) -> Self {
                $(let mut $var = Vec::new();)+
                for part in parts {
                    $($var.extend(part.$idx);)+
                }
                ($($var,)+)
            }
        }
    };
}

impl_batch_output!(A: a: 0, B: b: 1);
impl_batch_output!(A: a: 0, B: b: 1, C: c: 2);
impl_batch_output!(A: a: 0, B: b: 1, C: c: 2, D: d: 3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_split_truncates_last_batch() {
        let batches = BatchArg::split(vec![1, 2, 3, 4, 5], 2, 3);
        assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn test_scalars_have_no_batch_count() {
        let args = (Broadcast("model"), Broadcast(5));
        assert_eq!(args.batch_count(2).unwrap(), None);
    }

    #[test]
    fn test_mixed_args_broadcast_scalars() {
        let args = (vec!["a", "b", "c"], Broadcast("nomic"), vec![1, 2, 3]);
        assert_eq!(args.batch_count(2).unwrap(), Some(2));

        let batches = args.split(2, 2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0], (vec!["a", "b"], Broadcast("nomic"), vec![1, 2]));
        assert_eq!(batches[1], (vec!["c"], Broadcast("nomic"), vec![3]));
    }

    #[test]
    fn test_mismatched_lists_fail() {
        let args = (vec![1, 2, 3, 4], vec![1]);
        match args.batch_count(2) {
            Err(CocoError::BatchMismatch { expected, found }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_different_lengths_same_batch_count_are_allowed() {
        // 3 and 4 items both make two batches of size 2.
        let args = (vec![1, 2, 3], vec![1, 2, 3, 4]);
        assert_eq!(args.batch_count(2).unwrap(), Some(2));
    }

    #[test]
    fn test_tuple_output_concat() {
        let parts = vec![
            (vec!["a", "b"], vec![1.0, 2.0]),
            (vec!["c"], vec![3.0]),
        ];
        let (texts, speeds) = <(Vec<&str>, Vec<f64>)>::concat(parts);
        assert_eq!(texts, vec!["a", "b", "c"]);
        assert_eq!(speeds, vec![1.0, 2.0, 3.0]);
    }
}
