use crate::fetcher::FetchDirection;
use crate::retry::RetryDisposition;
use model::core::coercion::CoercionError;
use thiserror::Error;

/// Failure reported by a [`BatchFetcher`](crate::fetcher::BatchFetcher).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server error: {0}")]
    Server(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Fetch timed out")]
    Timeout,

    #[error("Result set closed on the server")]
    Closed,
}

impl FetchError {
    pub fn protocol(message: impl Into<String>) -> Self {
        FetchError::Protocol(message.into())
    }

    /// Transport hiccups and server-side timeouts may succeed on a retry;
    /// everything else reflects a state the server will keep reporting.
    pub fn disposition(&self) -> RetryDisposition {
        match self {
            FetchError::Transport(_) | FetchError::Timeout => RetryDisposition::Retry,
            FetchError::Server(_) | FetchError::Protocol(_) | FetchError::Closed => {
                RetryDisposition::Stop
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("The cursor is not on a valid row")]
    InvalidCursorPosition,

    #[error("{operation} is not supported on a forward-only cursor")]
    UnsupportedForForwardOnly { operation: &'static str },

    #[error("Fetch of {direction} block at row {row} failed: {source}")]
    Fetch {
        row: i64,
        direction: FetchDirection,
        source: FetchError,
    },

    #[error("Cannot convert column {column} value {value} to {target}")]
    TypeCoercion {
        column: String,
        target: &'static str,
        value: String,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Parameter not found at index {index}")]
    UnknownOutputParameter { index: usize },

    #[error("Fetch cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("The cursor is closed")]
    Closed,
}

impl CursorError {
    pub fn coercion(column: impl ToString, err: CoercionError) -> Self {
        CursorError::TypeCoercion {
            column: column.to_string(),
            target: err.target,
            value: err.value,
        }
    }

    /// The fetch failure underneath this error, if any.
    pub fn fetch_error(&self) -> Option<&FetchError> {
        match self {
            CursorError::Fetch { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_error_message_is_fixed() {
        assert_eq!(
            CursorError::InvalidCursorPosition.to_string(),
            "The cursor is not on a valid row"
        );
    }

    #[test]
    fn output_parameter_message_names_index() {
        let err = CursorError::UnknownOutputParameter { index: 4 };
        assert_eq!(err.to_string(), "Parameter not found at index 4");
    }

    #[test]
    fn coercion_error_keeps_target_and_value() {
        let err = CursorError::coercion(
            2,
            CoercionError {
                target: "int",
                value: "'abc'".to_string(),
            },
        );
        assert_eq!(err.to_string(), "Cannot convert column 2 value 'abc' to int");
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert_eq!(
            FetchError::Transport("reset".into()).disposition(),
            RetryDisposition::Retry
        );
        assert_eq!(FetchError::Closed.disposition(), RetryDisposition::Stop);
    }
}
