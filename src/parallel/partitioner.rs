//! Partitioners split a half-open index range into batches that parallel
//! workers claim concurrently.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe source of sub-ranges over `[first, last)`.
pub trait RangePartitioner: Send + Sync {
    /// A partitioner over an empty range (or with no batches) is invalid
    /// and produces no work.
    fn is_valid(&self) -> bool;

    fn element_count(&self) -> usize;

    fn batch_count(&self) -> usize;

    /// Claims the next unclaimed sub-range. `None` once exhausted. Safe to
    /// call from any number of threads; every element is handed out
    /// exactly once.
    fn next_range(&self) -> Option<Range<usize>>;
}

/// Pre-splits the range into exactly `batch_count` contiguous batches of
/// near-equal size: `⌊N/B⌋` elements each, the first `N mod B` batches
/// getting one extra. Callers claim whole batches off an atomic cursor.
pub struct SimplePartitioner {
    first: usize,
    element_count: usize,
    batch_count: usize,
    elements_per_batch: usize,
    remainder: usize,
    next_batch: AtomicUsize,
}

impl SimplePartitioner {
    pub fn new(first: usize, last: usize, max_batches: usize) -> Self {
        let element_count = last.saturating_sub(first);
        let batch_count = max_batches.min(element_count);
        let (elements_per_batch, remainder) = if batch_count == 0 {
            (0, 0)
        } else {
            (element_count / batch_count, element_count % batch_count)
        };

        Self {
            first,
            element_count,
            batch_count,
            elements_per_batch,
            remainder,
            next_batch: AtomicUsize::new(0),
        }
    }

    pub fn over_count(element_count: usize, max_batches: usize) -> Self {
        Self::new(0, element_count, max_batches)
    }

    fn first_index_of(&self, batch: usize) -> usize {
        self.first + batch * self.elements_per_batch + batch.min(self.remainder)
    }
}

impl RangePartitioner for SimplePartitioner {
    fn is_valid(&self) -> bool {
        self.element_count > 0 && self.batch_count > 0
    }

    fn element_count(&self) -> usize {
        self.element_count
    }

    fn batch_count(&self) -> usize {
        self.batch_count
    }

    fn next_range(&self) -> Option<Range<usize>> {
        let batch = self.next_batch.fetch_add(1, Ordering::Relaxed);
        if batch >= self.batch_count {
            return None;
        }
        Some(self.first_index_of(batch)..self.first_index_of(batch + 1))
    }
}

/// Hands out fixed-size chunks from an atomically advancing cursor.
/// Preferred over [`SimplePartitioner`] when per-element work is uneven:
/// fast batches come back for more instead of idling.
pub struct AtomicPartitioner {
    first: usize,
    last: usize,
    chunk_size: usize,
    batch_count: usize,
    cursor: AtomicUsize,
}

impl AtomicPartitioner {
    pub fn new(first: usize, last: usize, chunk_size: usize, max_batches: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be at least one element");

        let element_count = last.saturating_sub(first);
        let chunks = element_count.div_ceil(chunk_size);

        Self {
            first,
            last,
            chunk_size,
            batch_count: max_batches.min(chunks),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn over_count(element_count: usize, chunk_size: usize, max_batches: usize) -> Self {
        Self::new(0, element_count, chunk_size, max_batches)
    }
}

impl RangePartitioner for AtomicPartitioner {
    fn is_valid(&self) -> bool {
        self.last > self.first && self.batch_count > 0
    }

    fn element_count(&self) -> usize {
        self.last.saturating_sub(self.first)
    }

    fn batch_count(&self) -> usize {
        self.batch_count
    }

    fn next_range(&self) -> Option<Range<usize>> {
        let offset = self.cursor.fetch_add(self.chunk_size, Ordering::Relaxed);
        let start = self.first.checked_add(offset)?;
        if start >= self.last {
            return None;
        }
        Some(start..(start + self.chunk_size).min(self.last))
    }
}
