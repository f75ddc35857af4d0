//! sessionwatch - inactivity timeout tracking.
//!
//! Watches user activity signals and notifies the application shortly
//! before, and at, the end of a configurable inactivity budget.

pub mod activity;
pub mod config;
pub mod controller;
pub mod database;
pub mod server;
pub mod tracker;
