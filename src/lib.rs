//! Stream-keeper - keep live streams alive with a placeholder image
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod events;
pub mod resolver;
pub mod signal;
pub mod supervisor;
