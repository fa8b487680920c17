//! Common types and utilities for the paiclient crates.

pub mod config;
pub mod env;
pub mod error;
pub mod job;

pub use ::anyhow;
pub use ::serde;
pub use ::serde_json;
pub use ::tracing;
pub use ::tracing_subscriber;
