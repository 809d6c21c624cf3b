use async_trait::async_trait;
use cursor_core::{
    error::FetchError,
    fetcher::{BatchFetcher, FetchDirection, FetchRequest},
};
use model::{
    core::{data_type::DataType, value::Value},
    records::{batch::Batch, column::ColumnMeta, row::Row},
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Serves blocks out of an in-memory row vector, honouring the same
/// forward/backward contract a server-side cursor does.
///
/// Every request is recorded so callers can assert on the exact fetch
/// sequence, and failures can be queued for the next requests.
pub struct MemoryFetcher {
    rows: Arc<Vec<Row>>,
    columns: Vec<ColumnMeta>,
    announce_last_row: bool,
    latency: Option<Duration>,
    requests: Mutex<Vec<FetchRequest>>,
    failures: Mutex<VecDeque<FetchError>>,
    cancels: AtomicUsize,
}

impl MemoryFetcher {
    pub fn new(rows: Vec<Row>, columns: Vec<ColumnMeta>) -> Self {
        Self {
            rows: Arc::new(rows),
            columns,
            announce_last_row: false,
            latency: None,
            requests: Mutex::new(Vec::new()),
            failures: Mutex::new(VecDeque::new()),
            cancels: AtomicUsize::new(0),
        }
    }

    /// `total` rows of `(id BIGINT NOT NULL, label VARCHAR)` where `id`
    /// equals the row number.
    pub fn numbered(total: usize) -> Self {
        let rows = (1..=total as i64)
            .map(|id| Row::new(vec![Value::Int(id), Value::String(format!("row {id}"))]))
            .collect();
        let columns = vec![
            ColumnMeta::new("id", DataType::Long).not_null(),
            ColumnMeta::new("label", DataType::VarChar),
        ];
        Self::new(rows, columns)
    }

    /// Attach the total row count to every batch, as a server that knows
    /// its result size would.
    pub fn announce_last_row(mut self) -> Self {
        self.announce_last_row = true;
        self
    }

    /// Delay every fetch by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn total_rows(&self) -> i64 {
        self.rows.len() as i64
    }

    /// Block `begin..=end`, clamped to the available rows.
    pub fn block(&self, begin: i64, end: i64) -> Batch {
        let total = self.total_rows();
        let begin = begin.max(1);
        let end = end.min(total);
        let batch = if begin > end {
            Batch::empty()
        } else {
            let rows = self.rows[(begin - 1) as usize..end as usize].to_vec();
            Batch::new(begin, rows, end == total).unwrap_or_else(|_| Batch::empty())
        };
        if self.announce_last_row {
            batch.with_last_row(total)
        } else {
            batch
        }
    }

    /// The batch a statement hands over with its result: the first
    /// `fetch_size` rows. Not recorded as a request.
    pub fn initial_batch(&self, fetch_size: usize) -> Batch {
        self.block(1, fetch_size as i64)
    }

    /// Fail the next request with `err`. Queued failures are consumed in order.
    pub async fn fail_next(&self, err: FetchError) {
        self.failures.lock().await.push_back(err);
    }

    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().await.clone()
    }

    /// First-row numbers of forward requests, in order.
    pub async fn forward_requests(&self) -> Vec<i64> {
        self.requests_in(FetchDirection::Forward).await
    }

    /// Last-row numbers of backward requests, in order.
    pub async fn backward_requests(&self) -> Vec<i64> {
        self.requests_in(FetchDirection::Backward).await
    }

    async fn requests_in(&self, direction: FetchDirection) -> Vec<i64> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|r| r.direction == direction)
            .map(|r| r.begin_row)
            .collect()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchFetcher for MemoryFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<Batch, FetchError> {
        self.requests.lock().await.push(request);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(err) = self.failures.lock().await.pop_front() {
            debug!(request = %request, error = %err, "Injected fetch failure.");
            return Err(err);
        }

        let batch = match request.direction {
            FetchDirection::Forward => self.block(
                request.begin_row,
                request.begin_row.saturating_add(request.fetch_size as i64 - 1),
            ),
            FetchDirection::Backward => self.block(request.lowest_row(), request.begin_row),
        };
        debug!(
            request = %request,
            begin_row = batch.begin_row(),
            end_row = batch.end_row(),
            "Served block."
        );
        Ok(batch)
    }

    async fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}
