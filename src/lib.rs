//! TIDEWATCH: trust-scored signal execution agent for EVM swaps.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod chain;
pub mod probe;
pub mod trust;
pub mod signal;
pub mod engine;
pub mod feeds;
pub mod health;
