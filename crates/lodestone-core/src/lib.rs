#![forbid(unsafe_code)]
#![deny(unused_must_use, rustdoc::broken_intra_doc_links, rustdoc::bare_urls)]
#![warn(
    missing_docs,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery
)]

//! Download session manager.
//!
//! Layout: `fingerprint.rs` (locator parsing), `registry.rs` (admission and
//! lifecycle), `cleanup.rs` (deferred removal), `progress.rs` (reported
//! percentages), `engine.rs` (engine capability traits), `watcher.rs` (handle
//! notification glue).

/// Deferred cleanup timers.
pub mod cleanup;
/// Engine capability traits and snapshots.
pub mod engine;
/// Error types.
pub mod error;
/// Content fingerprints.
pub mod fingerprint;
/// Session identifiers and snapshots.
pub mod model;
/// Progress normalization.
pub mod progress;
/// The session registry.
pub mod registry;
mod watcher;

pub use cleanup::{CleanupScheduler, CleanupTarget};
pub use engine::{
    AddContent, ContentEngine, ContentHandle, ContentSnapshot, EngineJob, FileSnapshot,
    HandleEvent,
};
pub use error::{BoundsError, EngineError, LocatorError, SessionError, SessionResult};
pub use fingerprint::{Fingerprint, display_name};
pub use model::{LocatedFile, Session, SessionId, SessionState};
pub use progress::{ProgressBounds, normalize};
pub use registry::{RegistryConfig, RegistryObserver, RetireReason, SessionRegistry};
