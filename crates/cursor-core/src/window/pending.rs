use crate::error::FetchError;
use crate::fetcher::{BatchFetcher, FetchRequest};
use model::records::batch::Batch;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Forward fetch running in the background ahead of the read position.
pub struct PendingFetch {
    request: FetchRequest,
    handle: JoinHandle<Result<Batch, FetchError>>,
}

impl PendingFetch {
    pub fn spawn(fetcher: Arc<dyn BatchFetcher>, request: FetchRequest) -> Self {
        let handle = tokio::spawn(async move { fetcher.fetch(request).await });
        Self { request, handle }
    }

    pub fn request(&self) -> &FetchRequest {
        &self.request
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Waits for the background fetch, aborting it if interrupted.
    pub async fn join(
        self,
        cancel: &CancellationToken,
        limit: Option<Duration>,
    ) -> Result<Result<Batch, FetchError>, Interrupted> {
        let abort = self.handle.abort_handle();
        let joined = async move {
            self.handle.await.unwrap_or_else(|e| {
                Err(FetchError::Transport(format!("prefetch task failed: {e}")))
            })
        };
        let outcome = bounded(joined, cancel, limit).await;
        if outcome.is_err() {
            abort.abort();
        }
        outcome
    }
}

/// Why a fetch was abandoned before it produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    TimedOut(Duration),
}

impl Interrupted {
    pub fn reason(&self) -> String {
        match self {
            Interrupted::Cancelled => "statement cancelled".to_string(),
            Interrupted::TimedOut(limit) => {
                format!("query timeout of {}ms elapsed", limit.as_millis())
            }
        }
    }
}

/// Races `fut` against the cancellation token and the optional time limit.
pub async fn bounded<F>(
    fut: F,
    cancel: &CancellationToken,
    limit: Option<Duration>,
) -> Result<Result<Batch, FetchError>, Interrupted>
where
    F: Future<Output = Result<Batch, FetchError>>,
{
    let timed = async {
        match limit {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| Interrupted::TimedOut(limit)),
            None => Ok(fut.await),
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        res = timed => res,
    }
}
