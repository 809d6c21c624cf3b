use crate::{env::EnvContext, error::ConfigError};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::{path::Path, str::FromStr, time::Duration};
use tracing::warn;

/// Rows per request the server uses when the client-side fetch size is
/// disabled by the `disable_fetch_size` connection property.
pub const SERVER_DEFAULT_FETCH_SIZE: usize = 1000;

/// Window capacity used when none is configured.
pub const DEFAULT_SAVED_BATCHES: usize = 3;

pub const ENV_FETCH_SIZE: &str = "SCROLL_FETCH_SIZE";
pub const ENV_DISABLE_FETCH_SIZE: &str = "SCROLL_DISABLE_FETCH_SIZE";
pub const ENV_MODE: &str = "SCROLL_MODE";
pub const ENV_QUERY_TIMEOUT_MS: &str = "SCROLL_QUERY_TIMEOUT_MS";
pub const ENV_SAVED_BATCHES: &str = "SCROLL_SAVED_BATCHES";
pub const ENV_PREFETCH_THRESHOLD: &str = "SCROLL_PREFETCH_THRESHOLD";
pub const ENV_SERVER_TZ: &str = "SCROLL_SERVER_TZ";
pub const ENV_CLIENT_TZ: &str = "SCROLL_CLIENT_TZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorMode {
    ForwardOnly,
    #[default]
    Scrollable,
}

impl FromStr for CursorMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "forward_only" | "forward" => Ok(CursorMode::ForwardOnly),
            "scrollable" | "scroll" => Ok(CursorMode::Scrollable),
            _ => Err(()),
        }
    }
}

/// Backoff for transient fetch failures. One attempt means no retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Statement-level settings consumed by a cursor and its batch window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorSettings {
    /// Number of rows to request per batch
    pub fetch_size: usize,

    /// Connection property forcing the server-side default fetch size
    pub disable_fetch_size: bool,

    pub mode: CursorMode,

    /// Per-fetch timeout; zero disables it
    pub query_timeout_ms: u64,

    /// Maximum number of batches retained by the window
    pub saved_batches: usize,

    /// Remaining buffered rows that trigger an overlapped fetch
    pub prefetch_threshold: Option<usize>,

    pub server_time_zone: Tz,
    pub client_time_zone: Tz,

    pub retry: RetrySettings,
}

impl Default for CursorSettings {
    fn default() -> Self {
        Self {
            fetch_size: 100,
            disable_fetch_size: false,
            mode: CursorMode::Scrollable,
            query_timeout_ms: 0,
            saved_batches: DEFAULT_SAVED_BATCHES,
            prefetch_threshold: None,
            server_time_zone: chrono_tz::UTC,
            client_time_zone: chrono_tz::UTC,
            retry: RetrySettings::default(),
        }
    }
}

impl CursorSettings {
    /// Parse from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: CursorSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Defaults overridden by `SCROLL_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env(&EnvContext::capture())
    }

    /// Applies `SCROLL_*` overrides on top of these settings.
    pub fn with_env(mut self, env: &EnvContext) -> Result<Self, ConfigError> {
        if let Some(v) = env.parse::<usize>(ENV_FETCH_SIZE)? {
            self.fetch_size = v;
        }
        if let Some(v) = env.flag(ENV_DISABLE_FETCH_SIZE)? {
            self.disable_fetch_size = v;
        }
        if let Some(v) = env.parse::<CursorMode>(ENV_MODE)? {
            self.mode = v;
        }
        if let Some(v) = env.parse::<u64>(ENV_QUERY_TIMEOUT_MS)? {
            self.query_timeout_ms = v;
        }
        if let Some(v) = env.parse::<usize>(ENV_SAVED_BATCHES)? {
            self.saved_batches = v;
        }
        if let Some(v) = env.parse::<usize>(ENV_PREFETCH_THRESHOLD)? {
            self.prefetch_threshold = (v > 0).then_some(v);
        }
        if let Some(v) = env.value(ENV_SERVER_TZ) {
            self.server_time_zone = parse_zone(v)?;
        }
        if let Some(v) = env.value(ENV_CLIENT_TZ) {
            self.client_time_zone = parse_zone(v)?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_size == 0 {
            return Err(ConfigError::OutOfRange {
                name: "fetch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.saved_batches < 2 {
            return Err(ConfigError::OutOfRange {
                name: "saved_batches",
                reason: format!(
                    "window must retain the current batch plus one more, got {}",
                    self.saved_batches
                ),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                name: "retry.max_attempts",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.prefetch_threshold.is_some() && self.mode == CursorMode::Scrollable {
            warn!("prefetch_threshold is ignored for scrollable cursors");
        }
        Ok(())
    }

    pub fn effective_fetch_size(&self) -> usize {
        if self.disable_fetch_size {
            SERVER_DEFAULT_FETCH_SIZE
        } else {
            self.fetch_size
        }
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        (self.query_timeout_ms > 0).then(|| Duration::from_millis(self.query_timeout_ms))
    }

    /// Overlapped fetching only applies to forward-only consumption.
    pub fn effective_prefetch_threshold(&self) -> Option<usize> {
        match self.mode {
            CursorMode::ForwardOnly => self.prefetch_threshold,
            CursorMode::Scrollable => None,
        }
    }

    pub fn is_forward_only(&self) -> bool {
        self.mode == CursorMode::ForwardOnly
    }

    pub fn with_fetch_size(mut self, size: usize) -> Self {
        self.fetch_size = size;
        self
    }

    pub fn with_mode(mut self, mode: CursorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_saved_batches(mut self, capacity: usize) -> Self {
        self.saved_batches = capacity;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_prefetch_threshold(mut self, rows: usize) -> Self {
        self.prefetch_threshold = Some(rows);
        self
    }

    pub fn with_time_zones(mut self, server: Tz, client: Tz) -> Self {
        self.server_time_zone = server;
        self.client_time_zone = client;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }
}

pub fn parse_zone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::UnknownTimeZone(name.to_string()))
}
