use model::records::{batch::Batch, row::Row};
use std::collections::VecDeque;
use tracing::{debug, warn};

struct CachedBatch {
    batch: Batch,
    last_access: u64,
}

/// Bounded set of non-overlapping batches ordered by first row.
///
/// When full, the least recently accessed batch that does not hold the
/// pinned row is evicted.
pub struct BatchCache {
    entries: VecDeque<CachedBatch>,
    capacity: usize,
    clock: u64,
}

impl BatchCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn index_of(&self, row_number: i64) -> Option<usize> {
        let idx = self
            .entries
            .partition_point(|e| e.batch.end_row() < row_number);
        self.entries
            .get(idx)
            .filter(|e| e.batch.covers(row_number))
            .map(|_| idx)
    }

    pub fn covers(&self, row_number: i64) -> bool {
        self.index_of(row_number).is_some()
    }

    pub fn find(&self, row_number: i64) -> Option<&Batch> {
        self.index_of(row_number).map(|idx| &self.entries[idx].batch)
    }

    pub fn row(&self, row_number: i64) -> Option<&Row> {
        self.find(row_number).and_then(|b| b.row(row_number))
    }

    /// Marks the batch holding `row_number` as most recently used.
    pub fn touch(&mut self, row_number: i64) {
        if let Some(idx) = self.index_of(row_number) {
            self.clock += 1;
            self.entries[idx].last_access = self.clock;
        }
    }

    /// Inserts `batch`, dropping cached batches it overlaps and then
    /// evicting down to capacity. Returns the `(begin, end)` ranges removed.
    pub fn insert(&mut self, batch: Batch, pinned: Option<i64>) -> Vec<(i64, i64)> {
        let mut removed = Vec::new();
        if batch.is_empty() {
            return removed;
        }

        self.entries.retain(|e| {
            let overlapping = e.batch.overlaps(&batch);
            if overlapping {
                removed.push((e.batch.begin_row(), e.batch.end_row()));
            }
            !overlapping
        });

        while self.entries.len() >= self.capacity {
            let victim = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| !pinned.is_some_and(|row| e.batch.covers(row)))
                .min_by_key(|(_, e)| e.last_access)
                .map(|(idx, _)| idx);

            let Some(idx) = victim else {
                warn!(
                    capacity = self.capacity,
                    "Every cached batch is pinned; exceeding capacity."
                );
                break;
            };
            if let Some(evicted) = self.entries.remove(idx) {
                debug!(
                    begin_row = evicted.batch.begin_row(),
                    end_row = evicted.batch.end_row(),
                    "Evicted batch."
                );
                removed.push((evicted.batch.begin_row(), evicted.batch.end_row()));
            }
        }

        self.clock += 1;
        let at = self
            .entries
            .partition_point(|e| e.batch.begin_row() < batch.begin_row());
        self.entries.insert(
            at,
            CachedBatch {
                batch,
                last_access: self.clock,
            },
        );
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// `(begin, end)` of every cached batch in row order.
    pub fn ranges(&self) -> Vec<(i64, i64)> {
        self.entries
            .iter()
            .map(|e| (e.batch.begin_row(), e.batch.end_row()))
            .collect()
    }
}
