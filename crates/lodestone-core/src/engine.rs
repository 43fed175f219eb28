//! Capability traits the registry consumes from a content-transfer engine.
//!
//! The registry calls [`ContentEngine::add_content`] while holding its state
//! lock, so implementations must return promptly and defer any network work to
//! their own tasks. Progress flows back through the job's event channel.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

pub use crate::error::EngineError;

/// Request to start fetching content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddContent {
    /// Locator as submitted by the client.
    pub locator: String,
    /// Directory reserved for this session's files.
    pub storage_path: PathBuf,
    /// Whether the engine may upload to peers.
    pub upload_enabled: bool,
}

/// Per-item transfer state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSnapshot {
    /// Display name of the item.
    pub name: String,
    /// Path relative to the session's storage directory.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Completion fraction in `[0, 1]`.
    pub fraction_done: f64,
}

impl FileSnapshot {
    /// Whether every byte of the item is present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fraction_done >= 1.0
    }
}

/// Cached engine view of one transfer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentSnapshot {
    /// Content name once metadata is known.
    pub name: Option<String>,
    /// Items contained in the content.
    pub files: Vec<FileSnapshot>,
    /// Aggregate completion fraction; may drift outside `[0, 1]`.
    pub aggregate_fraction: f64,
    /// Current download rate.
    pub rate_bytes_per_sec: u64,
    /// Bytes sent to peers.
    pub bytes_uploaded: u64,
    /// Bytes received from peers.
    pub bytes_downloaded: u64,
    /// Connected peers.
    pub peer_count: u32,
    /// Engine estimate of the remaining time.
    pub estimated_seconds_remaining: Option<f64>,
    /// Whether the engine considers the transfer finished.
    pub is_done: bool,
}

/// Notifications emitted by a handle.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleEvent {
    /// Content metadata (name, items) became available.
    Metadata,
    /// Transfer progressed.
    Progress {
        /// Aggregate completion fraction.
        fraction: f64,
    },
    /// All content has been fetched.
    Done,
    /// The transfer failed and will not recover.
    Error {
        /// Engine-provided cause.
        message: String,
    },
}

/// Live transfer owned by exactly one session.
pub trait ContentHandle: Send + Sync {
    /// Cached transfer state; must not block.
    fn snapshot(&self) -> ContentSnapshot;

    /// Stop the transfer and release engine resources.
    fn destroy(&self);
}

/// Handle plus the channel carrying its notifications.
pub struct EngineJob {
    /// Handle for the new transfer.
    pub handle: Arc<dyn ContentHandle>,
    /// Notifications for this handle; closes when the engine drops the sender.
    pub events: UnboundedReceiver<HandleEvent>,
}

/// Engine entry point.
pub trait ContentEngine: Send + Sync {
    /// Begin fetching the given content.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] when the engine cannot create a transfer.
    fn add_content(&self, request: AddContent) -> Result<EngineJob, EngineError>;
}
