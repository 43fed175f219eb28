//! Error taxonomy for the session manager.
//!
//! # Design
//! - Messages are constant; identifying context lives in structured fields.
//! - Every variant is a local, recoverable outcome for the caller.

use std::error::Error;

use thiserror::Error;

use crate::model::{SessionId, SessionState};

/// Reasons a locator yields no fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    /// The locator was blank.
    #[error("locator is empty")]
    Empty,
    /// The locator is neither a magnet URI nor a bare info-hash.
    #[error("locator is not a magnet uri")]
    NotMagnet,
    /// The magnet URI carries no exact-topic content identifier.
    #[error("locator has no content identifier")]
    MissingInfoHash,
    /// An exact-topic parameter was present but could not be decoded.
    #[error("locator content identifier is malformed")]
    MalformedInfoHash {
        /// Offending `xt` value.
        value: String,
    },
}

/// Progress clamp bounds were unusable.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum BoundsError {
    /// A bound was NaN or infinite.
    #[error("progress bound is not finite")]
    NotFinite {
        /// Offending value.
        value: f64,
    },
    /// The lower bound exceeds the upper bound.
    #[error("progress bounds are inverted")]
    Inverted {
        /// Configured lower bound.
        low: f64,
        /// Configured upper bound.
        high: f64,
    },
}

/// Failures reported by a content engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine refused the request.
    #[error("content engine rejected the request")]
    Rejected {
        /// Engine-provided explanation.
        reason: String,
    },
    /// The engine could not be reached or initialised.
    #[error("content engine unavailable")]
    Unavailable {
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Outcomes surfaced by [`crate::SessionRegistry`] operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No fingerprint could be derived from the locator.
    #[error("invalid content locator")]
    InvalidLocator {
        /// Parsing failure.
        #[source]
        source: LocatorError,
    },
    /// Admitting the session would exceed the in-flight capacity.
    #[error("session capacity exceeded")]
    CapacityExceeded {
        /// Configured in-flight capacity.
        capacity: usize,
    },
    /// No session with this id is registered.
    #[error("session not found")]
    NotFound {
        /// Requested identifier.
        session_id: SessionId,
    },
    /// The session has no item with this name.
    #[error("session item not found")]
    ItemNotFound {
        /// Session that was searched.
        session_id: SessionId,
        /// Requested item name.
        name: String,
    },
    /// The item exists but has not finished transferring.
    #[error("session item incomplete")]
    ItemIncomplete {
        /// Session owning the item.
        session_id: SessionId,
        /// Requested item name.
        name: String,
    },
    /// A lifecycle notification does not apply to the current state.
    #[error("invalid session state transition")]
    InvalidTransition {
        /// Session the notification targeted.
        session_id: SessionId,
        /// Current state.
        from: SessionState,
        /// Requested state.
        to: SessionState,
    },
}

impl SessionError {
    pub(crate) const fn not_found(session_id: SessionId) -> Self {
        Self::NotFound { session_id }
    }

    /// Short machine-readable label, used for metrics and logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidLocator { .. } => "invalid_locator",
            Self::CapacityExceeded { .. } => "capacity_exceeded",
            Self::NotFound { .. } => "not_found",
            Self::ItemNotFound { .. } => "item_not_found",
            Self::ItemIncomplete { .. } => "item_incomplete",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }
}

/// Convenience alias for registry results.
pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_messages_are_constant() {
        let id = SessionId::generate();
        let err = SessionError::NotFound { session_id: id };
        assert_eq!(err.to_string(), "session not found");
        assert_eq!(err.kind(), "not_found");

        let err = SessionError::InvalidLocator {
            source: LocatorError::MissingInfoHash,
        };
        assert_eq!(err.to_string(), "invalid content locator");
        assert!(err.source().is_some());
    }

    #[test]
    fn engine_error_preserves_source() {
        let err = EngineError::Unavailable {
            source: Box::new(std::io::Error::other("socket closed")),
        };
        assert_eq!(err.to_string(), "content engine unavailable");
        assert!(err.source().is_some());
    }
}
