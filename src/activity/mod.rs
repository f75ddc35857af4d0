//! User activity signals.
//!
//! This module defines the interaction events that prove a session is in
//! use, the event-source seam the tracker subscribes through, and an
//! in-process hub implementing it.

pub mod hub;
pub mod source;

pub use hub::*;
pub use source::*;
