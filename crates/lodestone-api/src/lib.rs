#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! HTTP API for the Lodestone download session manager.
//!
//! Handlers are thin: they parse input, call into
//! [`lodestone_core::SessionRegistry`], and project snapshots into the JSON
//! shapes in [`models`]. Registry errors become RFC9457 problem documents in
//! one place (`http::errors`).

/// Server bootstrap errors.
pub mod error;
/// HTTP routing and handlers.
pub mod http;
/// Request and response bodies.
pub mod models;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::ApiServer;
pub use models::{
    CancelResponse, CreateRequest, CreateResponse, FileView, HealthResponse, ProblemDetails,
    StatusView,
};
