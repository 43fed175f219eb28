#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Lodestone application bootstrap wiring.
//!
//! Layout: `bootstrap.rs` (service wiring and shutdown), `observer.rs`
//! (registry activity into Prometheus).

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application-level errors.
pub mod error;
/// Registry metrics observer.
pub mod observer;

pub use bootstrap::{BUILD_ID, run_app};
pub use error::{AppError, AppResult};
pub use observer::RegistryMetrics;
