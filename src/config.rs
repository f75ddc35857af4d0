//! Timeout configuration.
//!
//! Holds the inactivity budget, the warning lead time and the activity
//! debounce window. Values can be loaded from the settings store so each
//! deployment can tune them.

use crate::database::Database;
use serde::Serialize;
use std::time::Duration;

/// Total inactivity budget before the session expires.
pub const TIMEOUT_DURATION: Duration = Duration::from_secs(30 * 60);

/// Lead time before expiry at which the warning fires.
pub const WARNING_BEFORE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Minimum spacing between two recorded activity signals.
pub const ACTIVITY_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Longest accepted inactivity budget (and debounce window).
pub const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Settings store key for the timeout, in seconds.
pub const KEY_TIMEOUT_SECS: &str = "timeout_duration_secs";

/// Settings store key for the warning lead time, in seconds.
pub const KEY_WARNING_SECS: &str = "warning_before_timeout_secs";

/// Settings store key for the debounce window, in milliseconds.
pub const KEY_DEBOUNCE_MS: &str = "activity_debounce_ms";

/// Validated timeout settings for a [`SessionTracker`](crate::tracker::SessionTracker).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeoutConfig {
    /// Inactivity budget before expiry.
    timeout: Duration,

    /// How long before expiry the warning fires.
    warning_before: Duration,

    /// Activity signals closer together than this are ignored.
    debounce: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            timeout: TIMEOUT_DURATION,
            warning_before: WARNING_BEFORE_TIMEOUT,
            debounce: ACTIVITY_DEBOUNCE,
        }
    }
}

impl TimeoutConfig {
    /// Creates a config, checking `0 < warning_before < timeout <= MAX_TIMEOUT`
    /// and `debounce <= MAX_TIMEOUT`.
    pub fn new(
        timeout: Duration,
        warning_before: Duration,
        debounce: Duration,
    ) -> Result<Self, ConfigError> {
        if timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if timeout > MAX_TIMEOUT {
            return Err(ConfigError::TooLong {
                name: "timeout",
                value: timeout,
            });
        }
        if debounce > MAX_TIMEOUT {
            return Err(ConfigError::TooLong {
                name: "debounce",
                value: debounce,
            });
        }
        if warning_before.is_zero() || warning_before >= timeout {
            return Err(ConfigError::WarningNotBeforeTimeout {
                warning_before,
                timeout,
            });
        }

        Ok(Self {
            timeout,
            warning_before,
            debounce,
        })
    }

    /// Loads the config from the settings store.
    ///
    /// Missing keys fall back to the defaults; present but unparsable
    /// values are rejected.
    pub fn from_database(db: &Database) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timeout = read_u64(db, KEY_TIMEOUT_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let warning_before = read_u64(db, KEY_WARNING_SECS)?
            .map(Duration::from_secs)
            .unwrap_or(defaults.warning_before);
        let debounce = read_u64(db, KEY_DEBOUNCE_MS)?
            .map(Duration::from_millis)
            .unwrap_or(defaults.debounce);

        Self::new(timeout, warning_before, debounce)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn warning_before(&self) -> Duration {
        self.warning_before
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// Delay from the last activity until the warning fires.
    pub fn warning_delay(&self) -> Duration {
        self.timeout - self.warning_before
    }

    /// Warning lead time in whole minutes, for "N minutes remaining" text.
    pub fn warning_lead_minutes(&self) -> u64 {
        self.warning_before.as_secs() / 60
    }
}

fn read_u64(db: &Database, key: &str) -> Result<Option<u64>, ConfigError> {
    let value = match db.get_config(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(?e, key, "Failed to read setting, using default");
            None
        }
    };

    match value {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

/// Reasons a timeout configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroTimeout,
    TooLong {
        name: &'static str,
        value: Duration,
    },
    WarningNotBeforeTimeout {
        warning_before: Duration,
        timeout: Duration,
    },
    Invalid {
        key: String,
        value: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ZeroTimeout => write!(f, "Timeout must be greater than zero"),
            ConfigError::TooLong { name, value } => write!(
                f,
                "{} of {}s exceeds the maximum of {}s",
                name,
                value.as_secs(),
                MAX_TIMEOUT.as_secs()
            ),
            ConfigError::WarningNotBeforeTimeout {
                warning_before,
                timeout,
            } => write!(
                f,
                "Warning lead time {}s must be non-zero and shorter than timeout {}s",
                warning_before.as_secs(),
                timeout.as_secs()
            ),
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
