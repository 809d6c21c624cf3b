use thiserror::Error;

/// Errors raised while loading or validating cursor settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings document is not valid JSON for `CursorSettings`.
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment override could not be parsed.
    #[error("Invalid value '{value}' for {key}")]
    InvalidEnv { key: String, value: String },

    /// A time zone name is not a known IANA zone.
    #[error("Unknown time zone: {0}")]
    UnknownTimeZone(String),

    /// A setting is outside its permitted range.
    #[error("Invalid setting {name}: {reason}")]
    OutOfRange { name: &'static str, reason: String },
}
