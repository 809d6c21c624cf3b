use connectors::error::ConnectorError;
use cursor_config::error::ConfigError;
use cursor_core::error::CursorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid cursor settings: {0}")]
    Config(#[from] ConfigError),

    #[error("Cursor error: {0}")]
    Cursor(#[from] CursorError),

    #[error("Connection error: {0}")]
    Connector(#[from] ConnectorError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Invalid script step '{0}'")]
    InvalidStep(String),

    #[error("Shutdown requested")]
    ShutdownRequested,
}
