//! # Batch Scheduler
//!
//! Partitions a record sequence into consecutive fixed-size slices and drives
//! them strictly one after another: the handler for batch *n + 1* is not called
//! until the future for batch *n* has resolved. Concurrency exists only inside a
//! batch, which is the handler's business.

use std::future::Future;
use std::ops::Range;
use tracing::debug;

use crate::constants::MAX_RECORDS_PER_BATCH;
use crate::models::Record;

/// One slice of the record sequence
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a, T = Record> {
    /// Zero-based position of this batch in the run
    pub index: usize,
    /// Position of the first item in the whole sequence
    pub offset: usize,
    pub items: &'a [T],
}

impl<T> Batch<'_, T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items processed once this batch is done
    pub fn processed_after(&self) -> usize {
        self.offset + self.items.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchScheduler {
    batch_size: usize,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(MAX_RECORDS_PER_BATCH)
    }
}

impl BatchScheduler {
    /// Scheduler with the given batch size; zero is treated as one
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Iteration bound when the caller's total and the sequence length disagree
    pub fn effective_total(items_len: usize, total_count: usize) -> usize {
        items_len.min(total_count)
    }

    pub fn batch_count(&self, total: usize) -> usize {
        total.div_ceil(self.batch_size)
    }

    /// Index ranges of each batch over `0..total`
    pub fn partition(&self, total: usize) -> Vec<Range<usize>> {
        (0..total)
            .step_by(self.batch_size)
            .map(|start| start..(start + self.batch_size).min(total))
            .collect()
    }

    /// Call `handler` once per batch, awaiting each before starting the next.
    ///
    /// Returns the number of batches handled. A handler error stops iteration and
    /// is returned as-is.
    pub async fn for_each_batch<'a, T, F, Fut, E>(
        &self,
        items: &'a [T],
        total_count: usize,
        mut handler: F,
    ) -> Result<usize, E>
    where
        F: FnMut(Batch<'a, T>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let total = Self::effective_total(items.len(), total_count);
        let ranges = self.partition(total);

        debug!(
            total,
            batch_size = self.batch_size,
            batches = ranges.len(),
            "Scheduling batches"
        );

        for (index, range) in ranges.iter().enumerate() {
            let batch = Batch {
                index,
                offset: range.start,
                items: &items[range.clone()],
            };
            handler(batch).await?;
        }

        Ok(ranges.len())
    }
}
