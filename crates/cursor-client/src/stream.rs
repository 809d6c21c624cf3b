use crate::cursor::Cursor;
use cursor_core::error::CursorError;
use futures::stream::{self, Stream};
use model::records::row::Row;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamControl {
    Continue,
    /// Close the cursor; no further rows are fetched or delivered.
    Close,
}

/// Push-style consumer fed by [`Cursor::stream_to`].
pub trait RowSink {
    fn on_row(&mut self, row_number: i64, row: &Row) -> StreamControl;
}

impl<F> RowSink for F
where
    F: FnMut(i64, &Row) -> StreamControl,
{
    fn on_row(&mut self, row_number: i64, row: &Row) -> StreamControl {
        self(row_number, row)
    }
}

impl Cursor {
    /// Drives the cursor to the end, handing each row to `sink`.
    /// Returns the number of rows delivered.
    pub async fn stream_to<S: RowSink>(&mut self, sink: &mut S) -> Result<usize, CursorError> {
        let mut delivered = 0usize;

        while self.next().await? {
            let Some(row) = self.window.current_row() else {
                break;
            };
            delivered += 1;
            if sink.on_row(self.window.row_number(), row) == StreamControl::Close {
                debug!(row = self.window.row_number(), "Sink closed the cursor.");
                self.close();
                break;
            }
        }

        info!(rows = delivered, stats = ?self.stats(), "Streaming finished.");
        Ok(delivered)
    }

    /// Consumes the cursor as a stream of owned rows. The stream ends after
    /// the last row or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row, CursorError>> {
        stream::unfold(Some(self), |state| async move {
            let mut cursor = state?;
            match cursor.next().await {
                Ok(true) => {
                    let row = cursor.current_row().cloned()?;
                    Some((Ok(row), Some(cursor)))
                }
                Ok(false) => {
                    cursor.close();
                    None
                }
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}
