use crate::records::row::Row;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("batch starting at row {begin_row} must begin at row 1 or later")]
    InvalidBegin { begin_row: i64 },

    #[error("batch {begin_row}..={end_row} holds {rows} rows")]
    LengthMismatch {
        begin_row: i64,
        end_row: i64,
        rows: usize,
    },

    #[error("last row {last_row} contradicts batch ending at row {end_row}")]
    LastRowConflict { end_row: i64, last_row: i64 },
}

/// Immutable slice of result rows with known 1-based row-number bounds.
///
/// The empty batch (`begin_row == end_row == 0`, no rows, `is_last`)
/// stands for "no rows exist at or beyond the requested position".
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    rows: Vec<Row>,
    begin_row: i64,
    end_row: i64,
    is_last: bool,
    last_row: Option<i64>,
}

impl Batch {
    /// Builds a batch whose first row is `begin_row`. An empty `rows`
    /// yields the empty batch.
    pub fn new(begin_row: i64, rows: Vec<Row>, is_last: bool) -> Result<Self, BatchError> {
        if rows.is_empty() {
            return Ok(Self::empty());
        }
        if begin_row < 1 {
            return Err(BatchError::InvalidBegin { begin_row });
        }
        let end_row = begin_row + rows.len() as i64 - 1;
        Ok(Batch {
            rows,
            begin_row,
            end_row,
            is_last,
            last_row: if is_last { Some(end_row) } else { None },
        })
    }

    /// Builds a batch from explicit bounds, checking every invariant.
    pub fn from_parts(
        rows: Vec<Row>,
        begin_row: i64,
        end_row: i64,
        is_last: bool,
        last_row: Option<i64>,
    ) -> Result<Self, BatchError> {
        if rows.is_empty() && begin_row == 0 && end_row == 0 {
            return Ok(Batch {
                last_row,
                ..Self::empty()
            });
        }
        if begin_row < 1 {
            return Err(BatchError::InvalidBegin { begin_row });
        }
        if end_row < begin_row || (end_row - begin_row + 1) as usize != rows.len() {
            return Err(BatchError::LengthMismatch {
                begin_row,
                end_row,
                rows: rows.len(),
            });
        }
        if let Some(last) = last_row
            && (last < end_row || (is_last && last != end_row))
        {
            return Err(BatchError::LastRowConflict {
                end_row,
                last_row: last,
            });
        }
        Ok(Batch {
            rows,
            begin_row,
            end_row,
            is_last,
            last_row: if is_last { Some(end_row) } else { last_row },
        })
    }

    pub fn empty() -> Self {
        Batch {
            rows: Vec::new(),
            begin_row: 0,
            end_row: 0,
            is_last: true,
            last_row: None,
        }
    }

    /// Attaches an authoritative total row count learned out-of-band.
    pub fn with_last_row(mut self, last_row: i64) -> Self {
        self.last_row = Some(last_row);
        if !self.is_empty() && last_row == self.end_row {
            self.is_last = true;
        }
        self
    }

    pub fn begin_row(&self) -> i64 {
        self.begin_row
    }

    pub fn end_row(&self) -> i64 {
        self.end_row
    }

    pub fn is_last(&self) -> bool {
        self.is_last
    }

    pub fn last_row(&self) -> Option<i64> {
        self.last_row
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn covers(&self, row_number: i64) -> bool {
        !self.is_empty() && row_number >= self.begin_row && row_number <= self.end_row
    }

    /// Row by absolute 1-based row number.
    pub fn row(&self, row_number: i64) -> Option<&Row> {
        if !self.covers(row_number) {
            return None;
        }
        self.rows.get((row_number - self.begin_row) as usize)
    }

    pub fn overlaps(&self, other: &Batch) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.begin_row <= other.end_row
            && other.begin_row <= self.end_row
    }
}
