use crate::error::FetchError;
use async_trait::async_trait;
use model::records::batch::Batch;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchDirection {
    Forward,
    Backward,
}

impl fmt::Display for FetchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchDirection::Forward => write!(f, "forward"),
            FetchDirection::Backward => write!(f, "backward"),
        }
    }
}

/// One block request against the server-side result.
///
/// For a forward request `begin_row` is the first row wanted. For a
/// backward request it is the last row wanted, and the server answers with
/// the block of up to `fetch_size` rows ending there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub begin_row: i64,
    pub direction: FetchDirection,
    pub fetch_size: usize,
}

impl FetchRequest {
    pub fn forward(begin_row: i64, fetch_size: usize) -> Self {
        Self {
            begin_row,
            direction: FetchDirection::Forward,
            fetch_size,
        }
    }

    pub fn backward(end_row: i64, fetch_size: usize) -> Self {
        Self {
            begin_row: end_row,
            direction: FetchDirection::Backward,
            fetch_size,
        }
    }

    /// First row number the server may return for this request.
    pub fn lowest_row(&self) -> i64 {
        match self.direction {
            FetchDirection::Forward => self.begin_row,
            FetchDirection::Backward => (self.begin_row - self.fetch_size as i64 + 1).max(1),
        }
    }
}

impl fmt::Display for FetchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from row {} (size {})",
            self.direction, self.begin_row, self.fetch_size
        )
    }
}

/// Server round trip that materializes one block of result rows.
///
/// Implementations return an empty batch when no rows exist at or beyond
/// the requested position.
#[async_trait]
pub trait BatchFetcher: Send + Sync {
    async fn fetch(&self, request: FetchRequest) -> Result<Batch, FetchError>;

    /// Best-effort request to abandon any round trip in flight.
    async fn cancel(&self) {}
}

#[async_trait]
impl<T: BatchFetcher + ?Sized> BatchFetcher for Arc<T> {
    async fn fetch(&self, request: FetchRequest) -> Result<Batch, FetchError> {
        (**self).fetch(request).await
    }

    async fn cancel(&self) {
        (**self).cancel().await
    }
}
