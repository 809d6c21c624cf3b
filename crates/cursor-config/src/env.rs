use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Prefix shared by every cursor override variable.
pub const ENV_PREFIX: &str = "SCROLL_";

/// Captured `SCROLL_*` overrides with typed lookups.
///
/// Variables outside the prefix are never captured, and blank values
/// count as unset.
#[derive(Debug, Clone, Default)]
pub struct EnvContext {
    overrides: BTreeMap<String, String>,
}

impl EnvContext {
    /// Captures the overrides present in the process environment.
    pub fn capture() -> Self {
        Self::from_pairs(std::env::vars())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let overrides = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, v)| k.starts_with(ENV_PREFIX) && !v.trim().is_empty())
            .collect();
        Self { overrides }
    }

    /// Raw trimmed value of `key`.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.overrides.get(key).map(|v| v.trim())
    }

    pub fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError> {
        let Some(raw) = self.value(key) else {
            return Ok(None);
        };
        raw.parse::<T>()
            .map(Some)
            .map_err(|_| invalid(key, raw))
    }

    /// Boolean switch spelled `1/0`, `true/false`, `yes/no` or `on/off`.
    pub fn flag(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.value(key) else {
            return Ok(None);
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(invalid(key, raw)),
        }
    }
}

fn invalid(key: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidEnv {
        key: key.to_string(),
        value: raw.to_string(),
    }
}
