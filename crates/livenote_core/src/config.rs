//! Cache configuration.
//!
//! # Invariants
//! - `page_size` is always within `1..=PAGE_SIZE_MAX` after normalization.
//! - `request_timeout_ms` is never zero after normalization.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const PAGE_SIZE_MAX: u32 = 50;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 15_000;

/// Tunables for one note cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Rows requested per page.
    pub page_size: u32,
    /// Upper bound for every remote call issued by the cache.
    pub request_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl CacheConfig {
    /// Parses JSON config; missing keys take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let parsed: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        Ok(parsed.normalized())
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&raw)
    }

    /// Clamps values into their supported ranges.
    ///
    /// - `page_size = 0` -> default, values above the max are capped.
    /// - `request_timeout_ms = 0` -> default.
    pub fn normalized(self) -> Self {
        let page_size = match self.page_size {
            0 => DEFAULT_PAGE_SIZE,
            value if value > PAGE_SIZE_MAX => PAGE_SIZE_MAX,
            value => value,
        };
        let request_timeout_ms = match self.request_timeout_ms {
            0 => DEFAULT_REQUEST_TIMEOUT_MS,
            value => value,
        };
        Self {
            page_size,
            request_timeout_ms,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
