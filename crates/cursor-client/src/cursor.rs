use crate::params::OutputParams;
use crate::zone::ZoneShift;
use cursor_config::settings::{CursorMode, CursorSettings};
use cursor_core::{
    error::CursorError,
    fetcher::BatchFetcher,
    retry::{RetryPolicy, RetryingFetcher},
    window::{BatchWindow, Position, Side, WindowOptions, WindowStats},
};
use model::records::{
    batch::Batch,
    column::{ColumnMeta, find_column},
    row::Row,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    BeforeFirst,
    OnRow,
    AfterLast,
    Closed,
}

/// Scrollable or forward-only cursor over a server-side result.
///
/// Navigation is delegated to a [`BatchWindow`]; the cursor adds the
/// forward-only rules, typed column access and timezone handling.
pub struct Cursor {
    pub(crate) window: BatchWindow,
    pub(crate) columns: Vec<ColumnMeta>,
    pub(crate) mode: CursorMode,
    pub(crate) zones: ZoneShift,
    pub(crate) out_params: Option<OutputParams>,
    pub(crate) was_null: bool,
}

impl Cursor {
    /// Opens a cursor positioned before the first row. `initial` is the
    /// batch delivered with the statement result, possibly empty.
    pub fn open(
        fetcher: Arc<dyn BatchFetcher>,
        initial: Batch,
        columns: Vec<ColumnMeta>,
        settings: &CursorSettings,
    ) -> Self {
        let fetcher: Arc<dyn BatchFetcher> = if settings.retry.max_attempts > 1 {
            Arc::new(RetryingFetcher::new(
                fetcher,
                RetryPolicy::from_settings(&settings.retry),
            ))
        } else {
            fetcher
        };

        debug!(
            mode = ?settings.mode,
            fetch_size = settings.effective_fetch_size(),
            saved_batches = settings.saved_batches,
            initial_rows = initial.len(),
            "Opening cursor."
        );

        Self {
            window: BatchWindow::new(fetcher, initial, WindowOptions::from_settings(settings)),
            columns,
            mode: settings.mode,
            zones: ZoneShift::new(settings.server_time_zone, settings.client_time_zone),
            out_params: None,
            was_null: false,
        }
    }

    /// Callable-statement mode: output parameters resolve through `params`.
    pub fn with_output_params(mut self, params: OutputParams) -> Self {
        self.out_params = Some(params);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.window = self.window.with_cancel_token(token);
        self
    }

    /// Token that aborts whichever navigation is waiting on a fetch.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.window.cancel_token()
    }

    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    pub fn state(&self) -> CursorState {
        if self.window.is_closed() {
            return CursorState::Closed;
        }
        match self.window.position() {
            Position::Unset(Side::Before) => CursorState::BeforeFirst,
            Position::Unset(Side::After) => CursorState::AfterLast,
            Position::On(_) => CursorState::OnRow,
        }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// 1-based index of the column called `name`, ignoring case.
    pub fn find_column(&self, name: &str) -> Result<usize, CursorError> {
        self.ensure_open()?;
        find_column(&self.columns, name).ok_or_else(|| CursorError::UnknownColumn(name.to_string()))
    }

    pub fn stats(&self) -> WindowStats {
        self.window.stats()
    }

    /// Row ranges currently held client-side, in row order.
    pub fn cached_ranges(&self) -> Vec<(i64, i64)> {
        self.window.cached_ranges()
    }

    pub fn fetch_size(&self) -> usize {
        self.window.fetch_size()
    }

    pub fn set_fetch_size(&mut self, rows: usize) {
        self.window.set_fetch_size(rows);
    }

    pub async fn next(&mut self) -> Result<bool, CursorError> {
        self.window.next().await
    }

    /// Moves to the previous row; from the first row this parks the cursor
    /// before the first row and returns `false`.
    pub async fn previous(&mut self) -> Result<bool, CursorError> {
        self.ensure_scrollable("previous")?;
        if self.window.is_first() {
            self.window.before_first()?;
            return Ok(false);
        }
        self.window.previous().await
    }

    pub async fn first(&mut self) -> Result<bool, CursorError> {
        self.ensure_scrollable("first")?;
        self.window.first().await
    }

    pub async fn last(&mut self) -> Result<bool, CursorError> {
        self.ensure_scrollable("last")?;
        self.window.last().await
    }

    pub fn before_first(&mut self) -> Result<(), CursorError> {
        self.ensure_scrollable("beforeFirst")?;
        self.window.before_first()
    }

    pub fn after_last(&mut self) -> Result<(), CursorError> {
        self.ensure_scrollable("afterLast")?;
        self.window.after_last()
    }

    pub async fn absolute(&mut self, row: i64) -> Result<bool, CursorError> {
        self.ensure_scrollable("absolute")?;
        self.window.absolute(row).await
    }

    /// Negative offsets are rejected on forward-only cursors.
    pub async fn relative(&mut self, offset: i64) -> Result<bool, CursorError> {
        if offset < 0 {
            self.ensure_scrollable("relative")?;
        }
        self.window.relative(offset).await
    }

    pub async fn has_next(&mut self) -> Result<bool, CursorError> {
        self.window.has_next().await
    }

    pub async fn has_previous(&mut self) -> Result<bool, CursorError> {
        self.window.has_previous().await
    }

    pub fn is_before_first(&self) -> bool {
        self.state() == CursorState::BeforeFirst
    }

    pub fn is_after_last(&self) -> bool {
        self.state() == CursorState::AfterLast
    }

    pub fn is_first(&self) -> bool {
        !self.window.is_closed() && self.window.is_first()
    }

    pub async fn is_last(&mut self) -> Result<bool, CursorError> {
        self.window.is_last().await
    }

    /// Current 1-based row number, 0 when not on a row.
    pub fn row(&self) -> i64 {
        self.window.row_number()
    }

    pub fn current_row(&self) -> Option<&Row> {
        self.window.current_row()
    }

    pub fn was_null(&self) -> bool {
        self.was_null
    }

    pub fn is_closed(&self) -> bool {
        self.window.is_closed()
    }

    /// Releases cached batches and any in-flight fetch. Safe to repeat.
    pub fn close(&mut self) {
        self.window.close();
    }

    pub(crate) fn ensure_open(&self) -> Result<(), CursorError> {
        if self.window.is_closed() {
            return Err(CursorError::Closed);
        }
        Ok(())
    }

    fn ensure_scrollable(&self, operation: &'static str) -> Result<(), CursorError> {
        self.ensure_open()?;
        if self.mode == CursorMode::ForwardOnly {
            return Err(CursorError::UnsupportedForForwardOnly { operation });
        }
        Ok(())
    }
}
