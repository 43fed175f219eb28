//! Session identifiers, records, and the snapshots handed to callers.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
pub use lodestone_events::SessionState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ContentHandle, ContentSnapshot};
use crate::fingerprint::Fingerprint;

/// Opaque, unguessable session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Mint a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0.simple(), formatter)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

/// Immutable view of a session, captured under a single registry lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Content fingerprint used for deduplication.
    pub fingerprint: Fingerprint,
    /// Locator exactly as submitted.
    pub locator: String,
    /// Current lifecycle state.
    pub state: SessionState,
    /// Admission time.
    pub created_at: DateTime<Utc>,
    /// Time the engine reported completion.
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure cause for `Failed` sessions.
    pub failure: Option<String>,
    /// Friendly name from the locator, used until the engine knows better.
    pub display_name: Option<String>,
    /// Engine-side transfer state.
    pub content: ContentSnapshot,
    /// Directory the engine writes this session's content into.
    pub storage_path: PathBuf,
}

impl Session {
    /// Best available name: engine metadata first, then the locator's `dn`.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.content
            .name
            .as_deref()
            .or(self.display_name.as_deref())
    }
}

/// On-disk location of a completed session item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFile {
    /// Item name as reported by the engine.
    pub name: String,
    /// Absolute path beneath the session's storage directory.
    pub path: PathBuf,
    /// Item size in bytes.
    pub size: u64,
}

pub(crate) struct SessionRecord {
    pub(crate) id: SessionId,
    pub(crate) fingerprint: Fingerprint,
    pub(crate) locator: String,
    pub(crate) display_name: Option<String>,
    pub(crate) storage_path: PathBuf,
    pub(crate) handle: Option<Arc<dyn ContentHandle>>,
    pub(crate) state: SessionState,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) completed_at: Option<DateTime<Utc>>,
    pub(crate) failure: Option<String>,
}

impl SessionRecord {
    pub(crate) fn snapshot(&self) -> Session {
        Session {
            id: self.id,
            fingerprint: self.fingerprint.clone(),
            locator: self.locator.clone(),
            state: self.state,
            created_at: self.created_at,
            completed_at: self.completed_at,
            failure: self.failure.clone(),
            display_name: self.display_name.clone(),
            content: self
                .handle
                .as_ref()
                .map(|handle| handle.snapshot())
                .unwrap_or_default(),
            storage_path: self.storage_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_round_trips_through_display() {
        let id = SessionId::generate();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert!(!text.contains('-'));
        assert_eq!(text.parse::<SessionId>().expect("parse"), id);
    }

    #[test]
    fn session_ids_are_distinct() {
        assert_ne!(SessionId::generate(), SessionId::generate());
        assert!("not-an-id".parse::<SessionId>().is_err());
    }
}
