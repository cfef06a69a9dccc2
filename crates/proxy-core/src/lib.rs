//! Shared infrastructure for the edge proxy.
//!
//! This crate provides the pieces every other crate and the router depend
//! on: the error taxonomy (§7), structured logging with KV mirroring (§3's
//! `LogEntry`), and the process-wide `AppConfig` singleton (§9).

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppConfig;
pub use error::{ApiError, ErrorCode};
pub use logging::{init_logging, LogEntry, LogLevel};
