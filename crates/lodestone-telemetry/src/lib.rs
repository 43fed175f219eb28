#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Telemetry primitives shared across the Lodestone workspace.
//!
//! This crate centralises logging and metrics so the
//! registry, the HTTP surface and the binary report in one consistent shape.

/// Application-level span helpers.
pub mod context;
/// Error types.
pub mod error;
/// Subscriber installation.
pub mod init;
/// Prometheus registry.
pub mod metrics;

pub use context::GlobalContextGuard;
pub use error::{CollectorStage, Result, TelemetryError};
pub use init::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_id, init_logging};
pub use metrics::{Metrics, MetricsSnapshot};
