pub mod cache;
pub mod pending;

use crate::error::{CursorError, FetchError};
use crate::fetcher::{BatchFetcher, FetchDirection, FetchRequest};
use cache::BatchCache;
use cursor_config::settings::CursorSettings;
use model::records::{batch::Batch, row::Row};
use pending::{Interrupted, PendingFetch, bounded};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

/// Where the window currently points, by absolute row number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Unset(Side),
    On(i64),
}

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub fetch_size: usize,
    pub capacity: usize,
    pub prefetch_threshold: Option<usize>,
    pub query_timeout: Option<Duration>,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self::from_settings(&CursorSettings::default())
    }
}

impl WindowOptions {
    pub fn from_settings(settings: &CursorSettings) -> Self {
        Self {
            fetch_size: settings.effective_fetch_size().max(1),
            capacity: settings.saved_batches.max(2),
            prefetch_threshold: settings.effective_prefetch_threshold(),
            query_timeout: settings.query_timeout(),
        }
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size.max(1);
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(2);
        self
    }

    pub fn with_prefetch_threshold(mut self, threshold: usize) -> Self {
        self.prefetch_threshold = Some(threshold);
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }
}

/// Counters describing how navigation was served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowStats {
    /// Server round trips issued, prefetches included.
    pub fetches: usize,
    /// Moves into a different batch served without a round trip.
    pub cache_hits: usize,
    pub evictions: usize,
    pub prefetches: usize,
}

/// Client-side window over a server-side result.
///
/// Holds a bounded set of row batches and a row-number position. Moves
/// that land inside a cached batch are served locally; everything else
/// becomes one block fetch. State only changes once a fetch has
/// succeeded.
pub struct BatchWindow {
    fetcher: Arc<dyn BatchFetcher>,
    cache: BatchCache,
    position: Position,
    known_last_row: Option<i64>,
    /// Highest row number any fetched batch has reached.
    high_water: i64,
    options: WindowOptions,
    pending: Option<PendingFetch>,
    cancel: CancellationToken,
    stats: WindowStats,
    closed: bool,
}

impl BatchWindow {
    /// Opens a window positioned before the first row, seeded with the
    /// batch delivered alongside the statement result.
    pub fn new(fetcher: Arc<dyn BatchFetcher>, initial: Batch, options: WindowOptions) -> Self {
        let mut window = Self {
            fetcher,
            cache: BatchCache::new(options.capacity.max(2)),
            position: Position::Unset(Side::Before),
            known_last_row: None,
            high_water: 0,
            options,
            pending: None,
            cancel: CancellationToken::new(),
            stats: WindowStats::default(),
            closed: false,
        };
        window.observe(&initial, None);
        window.cache.insert(initial, None);
        window
    }

    /// Ties cancellation of this window to an outer statement token.
    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Current 1-based row number, 0 when not on a row.
    pub fn row_number(&self) -> i64 {
        match self.position {
            Position::On(row) => row,
            Position::Unset(_) => 0,
        }
    }

    pub fn current_row(&self) -> Option<&Row> {
        match self.position {
            Position::On(row) => self.cache.row(row),
            Position::Unset(_) => None,
        }
    }

    pub fn known_last_row(&self) -> Option<i64> {
        self.known_last_row
    }

    pub fn stats(&self) -> WindowStats {
        self.stats
    }

    pub fn cached_ranges(&self) -> Vec<(i64, i64)> {
        self.cache.ranges()
    }

    pub fn fetch_size(&self) -> usize {
        self.options.fetch_size
    }

    pub fn set_fetch_size(&mut self, fetch_size: usize) {
        self.options.fetch_size = fetch_size.max(1);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn is_before_first(&self) -> bool {
        self.position == Position::Unset(Side::Before)
    }

    pub fn is_after_last(&self) -> bool {
        self.position == Position::Unset(Side::After)
    }

    pub fn is_first(&self) -> bool {
        self.position == Position::On(1)
    }

    pub async fn next(&mut self) -> Result<bool, CursorError> {
        self.ensure_open()?;
        let target = match self.position {
            Position::Unset(Side::After) => return Ok(false),
            Position::Unset(Side::Before) => 1,
            Position::On(row) => row + 1,
        };

        if self.beyond_last(target) {
            self.position = Position::Unset(Side::After);
            return Ok(false);
        }
        if self.cache.covers(target) {
            self.move_cached(target);
            self.maybe_prefetch();
            return Ok(true);
        }

        let batch = self
            .fetch(FetchRequest::forward(target, self.options.fetch_size))
            .await?;
        if batch.is_empty() {
            self.known_last_row.get_or_insert(target - 1);
            self.position = Position::Unset(Side::After);
            return Ok(false);
        }
        if !batch.covers(target) {
            return Err(self.protocol_error(target, FetchDirection::Forward, &batch));
        }

        self.insert(batch);
        self.move_to(target);
        self.maybe_prefetch();
        Ok(true)
    }

    /// Steps back one row. On the first row this returns `false` without
    /// moving.
    pub async fn previous(&mut self) -> Result<bool, CursorError> {
        self.ensure_open()?;
        let target = match self.position {
            Position::Unset(Side::Before) => return Ok(false),
            Position::On(row) if row <= 1 => return Ok(false),
            Position::On(row) => row - 1,
            Position::Unset(Side::After) => match self.resolve_last_row().await? {
                0 => return Ok(false),
                last => last,
            },
        };

        if self.cache.covers(target) {
            self.move_cached(target);
            return Ok(true);
        }

        let batch = self
            .fetch(FetchRequest::backward(target, self.options.fetch_size))
            .await?;
        if !batch.covers(target) {
            return Err(self.protocol_error(target, FetchDirection::Backward, &batch));
        }

        self.insert(batch);
        self.move_to(target);
        Ok(true)
    }

    /// Moves to an absolute row. Negative values count back from the last
    /// row, `-1` being the last row itself. Targets outside the result park
    /// the window before the first or after the last row.
    pub async fn absolute(&mut self, row: i64) -> Result<bool, CursorError> {
        self.ensure_open()?;
        if row == 0 {
            self.position = Position::Unset(Side::Before);
            return Ok(false);
        }

        let target = if row > 0 {
            row
        } else {
            let last = self.resolve_last_row().await?;
            let target = last + row + 1;
            if target < 1 {
                self.position = Position::Unset(Side::Before);
                return Ok(false);
            }
            target
        };

        self.seek(target).await
    }

    /// Moves `offset` rows from the current row. Requires a current row.
    pub async fn relative(&mut self, offset: i64) -> Result<bool, CursorError> {
        self.ensure_open()?;
        let Position::On(row) = self.position else {
            return Err(CursorError::InvalidCursorPosition);
        };
        if offset == 0 {
            return Ok(true);
        }

        let target = match row.checked_add(offset) {
            Some(target) if target >= 1 => target,
            Some(_) => {
                self.position = Position::Unset(Side::Before);
                return Ok(false);
            }
            None => {
                self.position = Position::Unset(if offset < 0 { Side::Before } else { Side::After });
                return Ok(false);
            }
        };
        self.seek(target).await
    }

    pub fn before_first(&mut self) -> Result<(), CursorError> {
        self.ensure_open()?;
        self.position = Position::Unset(Side::Before);
        Ok(())
    }

    pub fn after_last(&mut self) -> Result<(), CursorError> {
        self.ensure_open()?;
        self.position = Position::Unset(Side::After);
        Ok(())
    }

    pub async fn first(&mut self) -> Result<bool, CursorError> {
        self.absolute(1).await
    }

    pub async fn last(&mut self) -> Result<bool, CursorError> {
        self.absolute(-1).await
    }

    /// Whether a row follows the current position. May fetch the following
    /// block into the cache, never moves.
    pub async fn has_next(&mut self) -> Result<bool, CursorError> {
        self.ensure_open()?;
        let target = match self.position {
            Position::Unset(Side::After) => return Ok(false),
            Position::Unset(Side::Before) => 1,
            Position::On(row) => row + 1,
        };
        if self.beyond_last(target) {
            return Ok(false);
        }
        if self.cache.covers(target) {
            return Ok(true);
        }

        let batch = self
            .fetch(FetchRequest::forward(target, self.options.fetch_size))
            .await?;
        if batch.is_empty() {
            self.known_last_row.get_or_insert(target - 1);
            return Ok(false);
        }
        if !batch.covers(target) {
            return Err(self.protocol_error(target, FetchDirection::Forward, &batch));
        }
        self.insert(batch);
        Ok(true)
    }

    pub async fn has_previous(&mut self) -> Result<bool, CursorError> {
        self.ensure_open()?;
        match self.position {
            Position::Unset(Side::Before) => Ok(false),
            Position::On(row) => Ok(row > 1),
            Position::Unset(Side::After) => Ok(self.resolve_last_row().await? > 0),
        }
    }

    /// Whether the current row is the last one. May fetch to find out.
    pub async fn is_last(&mut self) -> Result<bool, CursorError> {
        self.ensure_open()?;
        match self.position {
            Position::On(row) if self.known_last_row == Some(row) => Ok(true),
            Position::On(_) => Ok(!self.has_next().await?),
            Position::Unset(_) => Ok(false),
        }
    }

    /// Row count of the whole result, scanning forward if not yet known.
    pub async fn resolve_last_row(&mut self) -> Result<i64, CursorError> {
        if let Some(last) = self.known_last_row {
            return Ok(last);
        }

        let mut extent = self.high_water;
        loop {
            let batch = self
                .fetch(FetchRequest::forward(extent + 1, self.options.fetch_size))
                .await?;
            if batch.is_empty() {
                self.known_last_row = Some(extent);
                break;
            }
            if !batch.covers(extent + 1) {
                return Err(self.protocol_error(extent + 1, FetchDirection::Forward, &batch));
            }
            extent = batch.end_row();
            self.insert(batch);
            if self.known_last_row.is_some() {
                break;
            }
        }

        debug!(last_row = extent, "Resolved result extent.");
        Ok(self.known_last_row.unwrap_or(extent))
    }

    /// Drops cached rows and abandons any background fetch. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
        self.cache.clear();
        self.position = Position::Unset(Side::After);
        debug!(
            fetches = self.stats.fetches,
            cache_hits = self.stats.cache_hits,
            evictions = self.stats.evictions,
            "Window closed."
        );
    }

    async fn seek(&mut self, target: i64) -> Result<bool, CursorError> {
        if self.beyond_last(target) {
            self.position = Position::Unset(Side::After);
            return Ok(false);
        }
        if self.cache.covers(target) {
            self.move_cached(target);
            return Ok(true);
        }

        let batch = self
            .fetch(FetchRequest::forward(target, self.options.fetch_size))
            .await?;
        if batch.covers(target) {
            self.insert(batch);
            self.move_to(target);
            return Ok(true);
        }
        if batch.is_empty() || batch.is_last() {
            self.position = Position::Unset(Side::After);
            return Ok(false);
        }
        Err(self.protocol_error(target, FetchDirection::Forward, &batch))
    }

    async fn fetch(&mut self, request: FetchRequest) -> Result<Batch, CursorError> {
        self.ensure_open()?;
        if self.cancel.is_cancelled() {
            return Err(CursorError::Cancelled {
                reason: Interrupted::Cancelled.reason(),
            });
        }

        let limit = self.options.query_timeout;
        let outcome = match self.take_pending(&request) {
            Some(pending) => {
                debug!(request = %request, "Awaiting prefetched block.");
                pending.join(&self.cancel, limit).await
            }
            None => {
                self.stats.fetches += 1;
                debug!(request = %request, "Fetching block.");
                let fetcher = self.fetcher.clone();
                bounded(fetcher.fetch(request), &self.cancel, limit).await
            }
        };

        match outcome {
            Ok(Ok(batch)) => {
                self.observe(&batch, Some(&request));
                Ok(batch)
            }
            Ok(Err(source)) => {
                warn!(request = %request, error = %source, "Block fetch failed.");
                Err(CursorError::Fetch {
                    row: request.begin_row,
                    direction: request.direction,
                    source,
                })
            }
            Err(interrupted) => {
                warn!(request = %request, reason = %interrupted.reason(), "Block fetch abandoned.");
                self.fetcher.cancel().await;
                Err(CursorError::Cancelled {
                    reason: interrupted.reason(),
                })
            }
        }
    }

    fn take_pending(&mut self, request: &FetchRequest) -> Option<PendingFetch> {
        let pending = self.pending.take()?;
        if pending.request() == request {
            return Some(pending);
        }
        debug!(
            prefetched = %pending.request(),
            wanted = %request,
            "Discarding unused prefetch."
        );
        pending.abort();
        None
    }

    fn maybe_prefetch(&mut self) {
        let Some(threshold) = self.options.prefetch_threshold else {
            return;
        };
        if self.pending.is_some() || self.cancel.is_cancelled() {
            return;
        }
        let Position::On(row) = self.position else {
            return;
        };
        let Some(batch) = self.cache.find(row) else {
            return;
        };
        let end_row = batch.end_row();
        if batch.is_last() || self.known_last_row.is_some_and(|last| end_row >= last) {
            return;
        }
        if ((end_row - row) as usize) >= threshold || self.cache.covers(end_row + 1) {
            return;
        }

        let request = FetchRequest::forward(end_row + 1, self.options.fetch_size);
        debug!(request = %request, "Prefetching block.");
        self.stats.fetches += 1;
        self.stats.prefetches += 1;
        self.pending = Some(PendingFetch::spawn(self.fetcher.clone(), request));
    }

    fn observe(&mut self, batch: &Batch, request: Option<&FetchRequest>) {
        if !batch.is_empty() {
            self.high_water = self.high_water.max(batch.end_row());
        }
        if let Some(last) = batch.last_row() {
            self.known_last_row = Some(last);
        } else if batch.is_last() && !batch.is_empty() {
            self.known_last_row = Some(batch.end_row());
        } else if batch.is_empty()
            && request.is_none_or(|r| r.direction == FetchDirection::Forward && r.begin_row == 1)
        {
            self.known_last_row = Some(0);
        }
    }

    fn insert(&mut self, batch: Batch) {
        let pinned = match self.position {
            Position::On(row) => Some(row),
            Position::Unset(_) => None,
        };
        let removed = self.cache.insert(batch, pinned);
        self.stats.evictions += removed.len();
    }

    fn move_to(&mut self, target: i64) {
        self.position = Position::On(target);
        self.cache.touch(target);
    }

    /// Moves onto a row the cache already holds.
    fn move_cached(&mut self, target: i64) {
        if let Position::On(row) = self.position
            && !self.cache.find(row).is_some_and(|b| b.covers(target))
        {
            self.stats.cache_hits += 1;
        }
        self.move_to(target);
    }

    fn beyond_last(&self, target: i64) -> bool {
        self.known_last_row.is_some_and(|last| target > last)
    }

    fn protocol_error(&self, row: i64, direction: FetchDirection, batch: &Batch) -> CursorError {
        warn!(
            row,
            begin_row = batch.begin_row(),
            end_row = batch.end_row(),
            "Fetched block does not cover the requested row."
        );
        CursorError::Fetch {
            row,
            direction,
            source: FetchError::protocol(format!(
                "block {}..={} does not contain row {row}",
                batch.begin_row(),
                batch.end_row()
            )),
        }
    }

    fn ensure_open(&self) -> Result<(), CursorError> {
        if self.closed {
            return Err(CursorError::Closed);
        }
        Ok(())
    }
}

impl Drop for BatchWindow {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use model::core::value::Value;
    use std::sync::Mutex;
    use tracing_test::traced_test;

    struct TableFetcher {
        total: i64,
        log: Mutex<Vec<FetchRequest>>,
        fail: Mutex<Option<FetchError>>,
        delay: Mutex<Option<Duration>>,
    }

    impl TableFetcher {
        fn new(total: i64) -> Self {
            Self {
                total,
                log: Mutex::new(Vec::new()),
                fail: Mutex::new(None),
                delay: Mutex::new(None),
            }
        }

        fn block(&self, begin: i64, end: i64) -> Batch {
            let end = end.min(self.total);
            if begin > end {
                return Batch::empty();
            }
            let rows = (begin..=end).map(|n| Row::new(vec![Value::Int(n)])).collect();
            Batch::new(begin, rows, end == self.total).unwrap()
        }

        fn set_delay(&self, delay: Option<Duration>) {
            *self.delay.lock().unwrap() = delay;
        }

        fn fail_next(&self, err: FetchError) {
            *self.fail.lock().unwrap() = Some(err);
        }

        fn requests(&self) -> Vec<(FetchDirection, i64)> {
            self.log
                .lock()
                .unwrap()
                .iter()
                .map(|r| (r.direction, r.begin_row))
                .collect()
        }
    }

    #[async_trait]
    impl BatchFetcher for TableFetcher {
        async fn fetch(&self, request: FetchRequest) -> Result<Batch, FetchError> {
            self.log.lock().unwrap().push(request);
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(err) = self.fail.lock().unwrap().take() {
                return Err(err);
            }
            let size = request.fetch_size as i64;
            Ok(match request.direction {
                FetchDirection::Forward => {
                    self.block(request.begin_row, request.begin_row.saturating_add(size - 1))
                }
                FetchDirection::Backward => {
                    self.block(request.lowest_row(), request.begin_row)
                }
            })
        }
    }

    fn window(fetcher: &Arc<TableFetcher>, options: WindowOptions) -> BatchWindow {
        let initial = fetcher.block(1, options.fetch_size as i64);
        BatchWindow::new(fetcher.clone(), initial, options)
    }

    fn options(fetch_size: usize) -> WindowOptions {
        WindowOptions::default()
            .with_fetch_size(fetch_size)
            .with_capacity(3)
    }

    fn value(window: &BatchWindow) -> Option<Value> {
        window.current_row().and_then(|r| r.get(0)).cloned()
    }

    #[tokio::test]
    async fn iterates_across_batches() {
        let fetcher = Arc::new(TableFetcher::new(25));
        let mut w = window(&fetcher, options(10));
        let mut seen = Vec::new();
        while w.next().await.unwrap() {
            seen.push(w.row_number());
            assert_eq!(value(&w), Some(Value::Int(w.row_number())));
        }
        assert_eq!(seen, (1..=25).collect::<Vec<_>>());
        assert!(w.is_after_last());
        assert_eq!(w.known_last_row(), Some(25));
        assert_eq!(
            fetcher.requests(),
            vec![(FetchDirection::Forward, 11), (FetchDirection::Forward, 21)]
        );
        assert!(!w.next().await.unwrap());
    }

    #[tokio::test]
    async fn empty_result_is_after_last_immediately() {
        let fetcher = Arc::new(TableFetcher::new(0));
        let mut w = window(&fetcher, options(10));
        assert!(!w.has_next().await.unwrap());
        assert!(!w.next().await.unwrap());
        assert!(w.is_after_last());
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn previous_on_first_row_stays_put() {
        let fetcher = Arc::new(TableFetcher::new(5));
        let mut w = window(&fetcher, options(10));
        assert!(w.next().await.unwrap());
        assert!(!w.previous().await.unwrap());
        assert_eq!(w.row_number(), 1);
        assert!(!w.has_previous().await.unwrap());
    }

    #[tokio::test]
    async fn previous_after_last_lands_on_last_row() {
        let fetcher = Arc::new(TableFetcher::new(23));
        let mut w = window(&fetcher, options(10));
        w.after_last().unwrap();
        assert!(w.has_previous().await.unwrap());
        assert!(w.previous().await.unwrap());
        assert_eq!(w.row_number(), 23);
        assert_eq!(value(&w), Some(Value::Int(23)));
    }

    #[tokio::test]
    async fn backward_walk_fetches_blocks_ending_before_cache() {
        let fetcher = Arc::new(TableFetcher::new(60));
        let mut w = window(&fetcher, options(10));
        assert!(w.absolute(45).await.unwrap());
        for _ in 0..44 {
            assert!(w.previous().await.unwrap());
        }
        assert_eq!(w.row_number(), 1);
        assert_eq!(
            fetcher.requests(),
            vec![
                (FetchDirection::Forward, 45),
                (FetchDirection::Backward, 44),
                (FetchDirection::Backward, 34),
                (FetchDirection::Backward, 24),
                (FetchDirection::Backward, 14),
                (FetchDirection::Backward, 4),
            ]
        );
        assert_eq!(w.cached_ranges(), vec![(1, 4), (5, 14), (15, 24)]);
    }

    #[tokio::test]
    async fn absolute_bounds() {
        let fetcher = Arc::new(TableFetcher::new(30));
        let mut w = window(&fetcher, options(10));
        assert!(!w.absolute(0).await.unwrap());
        assert!(w.is_before_first());
        assert!(w.absolute(-1).await.unwrap());
        assert_eq!(w.row_number(), 30);
        assert!(!w.absolute(31).await.unwrap());
        assert!(w.is_after_last());
        assert!(!w.absolute(-31).await.unwrap());
        assert!(w.is_before_first());
        assert!(w.absolute(-30).await.unwrap());
        assert!(w.is_first());
    }

    #[tokio::test]
    async fn relative_requires_a_row() {
        let fetcher = Arc::new(TableFetcher::new(7));
        let mut w = window(&fetcher, options(10));
        assert!(matches!(
            w.relative(1).await,
            Err(CursorError::InvalidCursorPosition)
        ));
        assert!(w.next().await.unwrap());
        assert!(w.relative(0).await.unwrap());
        assert!(w.relative(6).await.unwrap());
        assert_eq!(w.row_number(), 7);
        assert!(!w.relative(1).await.unwrap());
        assert_eq!(w.row_number(), 0);
    }

    #[tokio::test]
    async fn has_next_fetches_without_moving() {
        let fetcher = Arc::new(TableFetcher::new(15));
        let mut w = window(&fetcher, options(10));
        assert!(w.absolute(10).await.unwrap());
        assert!(w.has_next().await.unwrap());
        assert_eq!(w.row_number(), 10);
        assert!(w.next().await.unwrap());
        assert_eq!(fetcher.requests(), vec![(FetchDirection::Forward, 11)]);
        assert!(!w.is_last().await.unwrap());
        assert!(w.last().await.unwrap());
        assert!(w.is_last().await.unwrap());
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let fetcher = Arc::new(TableFetcher::new(30));
        let mut w = window(&fetcher, options(10));
        assert!(w.absolute(10).await.unwrap());
        fetcher.fail_next(FetchError::Transport("reset".into()));
        let err = w.next().await.unwrap_err();
        assert_eq!(
            err.fetch_error(),
            Some(&FetchError::Transport("reset".into()))
        );
        assert_eq!(w.row_number(), 10);
        assert_eq!(w.cached_ranges(), vec![(1, 10)]);
        assert!(w.next().await.unwrap());
        assert_eq!(w.row_number(), 11);
    }

    #[traced_test]
    #[tokio::test]
    async fn prefetch_is_consumed_by_next_crossing() {
        let fetcher = Arc::new(TableFetcher::new(40));
        let mut w = window(&fetcher, options(10).with_prefetch_threshold(3));
        for _ in 0..8 {
            assert!(w.next().await.unwrap());
        }
        assert_eq!(w.stats().prefetches, 1);
        for _ in 0..3 {
            assert!(w.next().await.unwrap());
        }
        assert_eq!(w.row_number(), 11);
        assert_eq!(fetcher.requests(), vec![(FetchDirection::Forward, 11)]);
        assert!(logs_contain("Awaiting prefetched block."));
    }

    #[tokio::test]
    async fn prefetch_is_discarded_on_mismatch() {
        let fetcher = Arc::new(TableFetcher::new(60));
        let mut w = window(&fetcher, options(10).with_prefetch_threshold(3));
        for _ in 0..8 {
            assert!(w.next().await.unwrap());
        }
        assert!(w.absolute(35).await.unwrap());
        assert_eq!(w.row_number(), 35);
        assert_eq!(value(&w), Some(Value::Int(35)));
    }

    #[tokio::test]
    async fn timeout_cancels_fetch_and_keeps_position() {
        let fetcher = Arc::new(TableFetcher::new(30));
        fetcher.set_delay(Some(Duration::from_millis(200)));
        let mut w = window(
            &fetcher,
            options(10).with_query_timeout(Duration::from_millis(20)),
        );
        assert!(w.absolute(10).await.unwrap());
        let err = w.next().await.unwrap_err();
        assert!(matches!(err, CursorError::Cancelled { .. }));
        assert_eq!(w.row_number(), 10);
        assert_eq!(w.cached_ranges(), vec![(1, 10)]);
        assert_eq!(w.known_last_row(), None);
    }

    #[tokio::test]
    async fn timeout_while_awaiting_prefetch_aborts_it() {
        let fetcher = Arc::new(TableFetcher::new(40));
        fetcher.set_delay(Some(Duration::from_millis(200)));
        let mut w = window(
            &fetcher,
            options(10)
                .with_prefetch_threshold(3)
                .with_query_timeout(Duration::from_millis(30)),
        );
        for _ in 0..10 {
            assert!(w.next().await.unwrap());
        }
        assert_eq!(w.stats().prefetches, 1);

        let err = w.next().await.unwrap_err();
        assert!(matches!(err, CursorError::Cancelled { .. }));
        assert_eq!(w.row_number(), 10);
        assert_eq!(w.cached_ranges(), vec![(1, 10)]);

        fetcher.set_delay(None);
        assert!(w.next().await.unwrap());
        assert_eq!(w.row_number(), 11);
        assert_eq!(
            fetcher.requests(),
            vec![(FetchDirection::Forward, 11), (FetchDirection::Forward, 11)]
        );
        assert_eq!(w.cached_ranges(), vec![(1, 10), (11, 20)]);
    }

    #[tokio::test]
    async fn cancelling_while_awaiting_prefetch_leaves_cache_alone() {
        let fetcher = Arc::new(TableFetcher::new(40));
        fetcher.set_delay(Some(Duration::from_millis(500)));
        let mut w = window(&fetcher, options(10).with_prefetch_threshold(3));
        for _ in 0..10 {
            assert!(w.next().await.unwrap());
        }
        let token = w.cancel_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });
        assert!(matches!(w.next().await, Err(CursorError::Cancelled { .. })));
        assert_eq!(w.row_number(), 10);
        assert_eq!(w.cached_ranges(), vec![(1, 10)]);
    }

    #[tokio::test]
    async fn cancelled_token_stops_fetching() {
        let fetcher = Arc::new(TableFetcher::new(30));
        let mut w = window(&fetcher, options(10));
        w.cancel_token().cancel();
        assert!(w.absolute(5).await.unwrap());
        assert!(matches!(
            w.absolute(15).await,
            Err(CursorError::Cancelled { .. })
        ));
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let fetcher = Arc::new(TableFetcher::new(30));
        let mut w = window(&fetcher, options(10));
        assert!(w.next().await.unwrap());
        w.close();
        w.close();
        assert!(w.is_closed());
        assert_eq!(w.row_number(), 0);
        assert!(w.cached_ranges().is_empty());
        assert!(matches!(w.next().await, Err(CursorError::Closed)));
    }

    #[tokio::test]
    async fn last_row_discovery_scans_forward() {
        let fetcher = Arc::new(TableFetcher::new(27));
        let mut w = window(&fetcher, options(10));
        assert_eq!(w.resolve_last_row().await.unwrap(), 27);
        assert_eq!(
            fetcher.requests(),
            vec![(FetchDirection::Forward, 11), (FetchDirection::Forward, 21)]
        );
    }

    #[tokio::test]
    async fn has_previous_surfaces_discovery_failure() {
        let fetcher = Arc::new(TableFetcher::new(30));
        let mut w = window(&fetcher, options(10));
        w.after_last().unwrap();
        fetcher.fail_next(FetchError::Server("gone".into()));
        let err = w.has_previous().await.unwrap_err();
        assert_eq!(err.fetch_error(), Some(&FetchError::Server("gone".into())));
        assert!(w.is_after_last());
        assert_eq!(w.known_last_row(), None);
        assert!(w.has_previous().await.unwrap());
    }

    #[tokio::test]
    async fn relative_overflow_parks_on_matching_side() {
        let fetcher = Arc::new(TableFetcher::new(30));
        let mut w = window(&fetcher, options(10));
        assert!(w.absolute(5).await.unwrap());
        assert!(!w.relative(i64::MAX).await.unwrap());
        assert!(w.is_after_last());

        assert!(w.absolute(5).await.unwrap());
        assert!(!w.relative(i64::MIN).await.unwrap());
        assert!(w.is_before_first());
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn absolute_far_beyond_the_result() {
        let fetcher = Arc::new(TableFetcher::new(30));
        let mut w = window(&fetcher, options(10));
        assert!(!w.absolute(i64::MAX).await.unwrap());
        assert!(w.is_after_last());
        assert!(!w.absolute(i64::MIN).await.unwrap());
        assert!(w.is_before_first());
    }

    #[test]
    fn zero_fetch_size_from_settings_is_clamped() {
        let settings = CursorSettings::default().with_fetch_size(0);
        assert_eq!(WindowOptions::from_settings(&settings).fetch_size, 1);
    }

    #[tokio::test]
    async fn discovery_resumes_from_highest_row_seen() {
        let fetcher = Arc::new(TableFetcher::new(60));
        let mut w = window(&fetcher, options(10));
        assert!(w.absolute(45).await.unwrap());
        assert!(w.absolute(5).await.unwrap());
        assert!(w.absolute(25).await.unwrap());
        assert!(w.absolute(15).await.unwrap());
        assert_eq!(w.cached_ranges(), vec![(1, 10), (15, 24), (25, 34)]);

        assert!(w.last().await.unwrap());
        assert_eq!(w.row_number(), 60);
        assert_eq!(
            fetcher.requests(),
            vec![
                (FetchDirection::Forward, 45),
                (FetchDirection::Forward, 25),
                (FetchDirection::Forward, 15),
                (FetchDirection::Forward, 55),
            ]
        );
    }
}
