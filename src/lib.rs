//! Aurum mining metrics library
//!
//! Collects company figures from several market and mining sources,
//! reconciles them per fact and serves the comparison table.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod persistence;
pub mod rate_limit;
pub mod retry;
