//! Session inactivity tracking.
//!
//! [`SessionTracker`] watches an [`ActivitySource`](crate::activity::ActivitySource)
//! and fires a warning callback shortly before, and an expiry callback at,
//! the end of the inactivity budget.

pub mod session_tracker;
pub mod types;

pub use session_tracker::*;
pub use types::*;
