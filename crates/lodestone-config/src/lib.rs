#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Configuration for the Lodestone service.
//!
//! Values come from environment variables and are validated once at startup;
//! an invalid value stops the process before anything is bound.

/// Error types.
pub mod error;
/// Environment parsing.
pub mod loader;
/// Typed configuration.
pub mod model;

pub use error::{ConfigError, ConfigResult};
pub use model::{LogStyle, ServiceConfig};
