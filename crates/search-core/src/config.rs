//! Configuration for the search core.
//!
//! All sections have defaults, so an empty JSON object is a valid
//! configuration. Durations use the humantime format (`"250ms"`, `"15s"`).
//!
//! ```
//! use helios_search_core::config::SearchCoreConfig;
//!
//! let config: SearchCoreConfig = serde_json::from_str(r#"{
//!     "lock": { "lease_ttl": "30s" },
//!     "paging": { "max_page_size": 500 }
//! }"#).unwrap();
//!
//! assert_eq!(config.lock.lease_ttl.as_secs(), 30);
//! assert_eq!(config.paging.max_page_size, 500);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BackendError, SearchError, StorageError, StorageResult};

#[cfg(feature = "sqlite")]
use crate::backends::sqlite::SqliteBackendConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCoreConfig {
    /// SQLite backend settings.
    #[cfg(feature = "sqlite")]
    #[serde(default)]
    pub sqlite: SqliteBackendConfig,

    /// Distributed lock settings.
    #[serde(default)]
    pub lock: LockConfig,

    /// Retry settings for transient failures.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Page size limits.
    #[serde(default)]
    pub paging: PagingConfig,
}

impl SearchCoreConfig {
    /// Loads configuration from a JSON file.
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let content = std::fs::read_to_string(path).map_err(BackendError::from)?;
        serde_json::from_str(&content).map_err(StorageError::from)
    }
}

/// Lease settings for the distributed lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// How long a lease stays valid without renewal.
    #[serde(with = "humantime_serde", default = "default_lease_ttl")]
    pub lease_ttl: Duration,

    /// How long `acquire` waits before giving up.
    #[serde(with = "humantime_serde", default = "default_acquire_timeout")]
    pub acquire_timeout: Duration,

    /// Delay between acquisition attempts.
    #[serde(with = "humantime_serde", default = "default_retry_interval")]
    pub retry_interval: Duration,
}

fn default_lease_ttl() -> Duration {
    Duration::from_secs(15)
}

fn default_acquire_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_retry_interval() -> Duration {
    Duration::from_millis(50)
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ttl: default_lease_ttl(),
            acquire_timeout: default_acquire_timeout(),
            retry_interval: default_retry_interval(),
        }
    }
}

/// Retry configuration for transient backend failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial delay between retries.
    #[serde(with = "humantime_serde", default = "default_initial_delay")]
    pub initial_delay: Duration,

    /// Maximum delay between retries.
    #[serde(with = "humantime_serde", default = "default_max_delay")]
    pub max_delay: Duration,

    /// Backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// Page size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    /// Page size used when the caller does not ask for one.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Largest page size a caller may ask for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

fn default_page_size() -> usize {
    100
}

fn default_max_page_size() -> usize {
    1000
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl PagingConfig {
    /// Resolves a requested page size against the limits.
    pub fn page_size(&self, requested: Option<usize>) -> Result<usize, SearchError> {
        match requested {
            None => Ok(self.default_page_size),
            Some(n) if n == 0 || n > self.max_page_size => Err(SearchError::InvalidPageSize {
                requested: n,
                max: self.max_page_size,
            }),
            Some(n) => Ok(n),
        }
    }
}

/// Serde module for Duration with humantime format.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
