//! Snapshot types and remaining-time formatting.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Callback fired by the tracker on warning or expiry.
pub type SessionCallback = Arc<dyn Fn() + Send + Sync>;

/// Wraps a closure as a [`SessionCallback`].
pub fn callback<F>(f: F) -> SessionCallback
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Where the session currently sits relative to its two thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Timers are not armed.
    Stopped,
    /// Armed, warning threshold not reached yet.
    Active,
    /// Inside the warning window.
    Warning,
    /// The inactivity budget is used up.
    Expired,
}

impl SessionPhase {
    /// Derives the phase from the remaining budget.
    pub fn from_remaining(armed: bool, remaining: Duration, warning_before: Duration) -> Self {
        if !armed {
            SessionPhase::Stopped
        } else if remaining.is_zero() {
            SessionPhase::Expired
        } else if remaining <= warning_before {
            SessionPhase::Warning
        } else {
            SessionPhase::Active
        }
    }
}

/// Point-in-time view of a tracker, for status endpoints and dialogs.
#[derive(Debug, Clone, Serialize)]
pub struct TrackerSnapshot {
    pub armed: bool,
    pub phase: SessionPhase,
    pub remaining_ms: u64,

    /// Remaining time as `MM:SS`.
    pub remaining: String,

    /// Wall-clock time of the last recorded activity.
    pub last_activity_at: DateTime<Utc>,

    pub timeout_secs: u64,
    pub warning_before_secs: u64,
}

/// Formats a duration as `MM:SS`, truncating sub-second parts.
///
/// Minutes are not wrapped into hours, so 125 minutes and 7 seconds
/// renders as `125:07`.
pub fn format_remaining(remaining: Duration) -> String {
    let total_secs = remaining.as_secs();
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
