use cursor_core::error::FetchError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The connection string could not be parsed.
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    /// Any Postgres driver error.
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// TLS connector setup failed.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),
}

impl From<ConnectorError> for FetchError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Postgres(e) => pg_fetch_error(&e),
            other => FetchError::Transport(other.to_string()),
        }
    }
}

/// Server-reported failures are final; anything else is a transport fault.
pub(crate) fn pg_fetch_error(err: &tokio_postgres::Error) -> FetchError {
    if err.is_closed() {
        return FetchError::Closed;
    }
    match err.as_db_error() {
        Some(db) => FetchError::Server(format!("{} ({})", db.message(), db.code().code())),
        None => FetchError::Transport(err.to_string()),
    }
}
