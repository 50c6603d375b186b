//! Batch partitioner.
//!
//! Splits an ordered sequence of documents into fixed-size groups for bulk
//! submission. The last batch of a run may be shorter; no batch is ever
//! empty. Partitioning is lazy and deterministic: the same input and batch
//! size always produce the same batch boundaries.

use crate::error::{Error, Result};

/// Number of batches produced for `total` items at the given batch size.
/// Callers guarantee a non-zero batch size; [`partition`] is the only way to
/// build a [`Batches`] and rejects zero up front.
fn batch_count(total: usize, batch_size: usize) -> usize {
    total.div_ceil(batch_size)
}

/// Partition `items` into batches of at most `batch_size`.
///
/// Returns a lazy iterator over the batches. Order is preserved: the
/// concatenation of all yielded batches equals the input sequence.
///
/// # Errors
///
/// Returns [`Error::Config`] if `batch_size` is zero.
pub fn partition<T>(items: Vec<T>, batch_size: usize) -> Result<Batches<T>> {
    if batch_size == 0 {
        return Err(Error::Config(
            "batch size must be greater than zero".to_string(),
        ));
    }

    Ok(Batches {
        items: items.into_iter(),
        batch_size,
    })
}

/// Lazy iterator over fixed-size batches. Created by [`partition`].
pub struct Batches<T> {
    items: std::vec::IntoIter<T>,
    batch_size: usize,
}

impl<T> Iterator for Batches<T> {
    type Item = Vec<T>;

    fn next(&mut self) -> Option<Vec<T>> {
        let batch: Vec<T> = self.items.by_ref().take(self.batch_size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = batch_count(self.items.len(), self.batch_size);
        (remaining, Some(remaining))
    }
}

impl<T> ExactSizeIterator for Batches<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_multiple() {
        let batches: Vec<_> = partition((0..30).collect(), 10).unwrap().collect();
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() == 10));
    }

    #[test]
    fn test_remainder_in_last_batch() {
        let batches: Vec<_> = partition((0..25).collect(), 10).unwrap().collect();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].len(), 5);
    }

    #[test]
    fn test_order_preserved() {
        let input: Vec<u32> = (0..100).collect();
        let flattened: Vec<u32> = partition(input.clone(), 7)
            .unwrap()
            .flatten()
            .collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn test_ceil_count_property() {
        for n in [0usize, 1, 9, 10, 11, 999, 1000, 1001] {
            for b in [1usize, 3, 10, 1000] {
                let produced = partition((0..n).collect::<Vec<_>>(), b).unwrap().count();
                assert_eq!(produced, n.div_ceil(b), "n={} b={}", n, b);
            }
        }
    }

    #[test]
    fn test_7395_documents_at_1000() {
        let sizes: Vec<usize> = partition((0..7395).collect::<Vec<u32>>(), 1000)
            .unwrap()
            .map(|b| b.len())
            .collect();
        assert_eq!(sizes.len(), 8);
        assert_eq!(sizes[..7], [1000; 7]);
        assert_eq!(sizes[7], 395);
        assert_eq!(sizes.iter().sum::<usize>(), 7395);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let mut batches = partition(Vec::<u32>::new(), 10).unwrap();
        assert!(batches.next().is_none());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = partition(vec![1, 2, 3], 0);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_deterministic_boundaries() {
        let input: Vec<u32> = (0..53).collect();
        let first: Vec<Vec<u32>> = partition(input.clone(), 8).unwrap().collect();
        let second: Vec<Vec<u32>> = partition(input, 8).unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_size_hint_is_exact() {
        let batches = partition((0..25).collect::<Vec<u32>>(), 10).unwrap();
        assert_eq!(batches.len(), 3);
    }
}
