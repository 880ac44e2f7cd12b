//! Common types and utilities shared by the watcher crates

pub mod config;
pub mod error;
pub mod telemetry;
pub mod types;

pub use config::*;
pub use error::*;
pub use telemetry::*;
pub use types::*;
