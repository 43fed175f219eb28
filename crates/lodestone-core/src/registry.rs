//! In-memory session registry: admission control, deduplication and lifecycle.
//!
//! # Design
//! - One mutex guards both the session map and the fingerprint index, so the
//!   dedupe check, the capacity check, the engine call, and the insert form a
//!   single atomic step.
//! - Nothing awaits while the lock is held. Handles are destroyed, events
//!   published and observers notified after it is released.
//! - Lock order is registry state, then cleanup timers.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use lodestone_events::{Event, EventBus};
use tracing::{debug, info, warn};

use crate::cleanup::{CleanupScheduler, CleanupTarget};
use crate::engine::{AddContent, ContentEngine, EngineError};
use crate::error::{SessionError, SessionResult};
use crate::fingerprint::{Fingerprint, display_name};
use crate::model::{LocatedFile, Session, SessionId, SessionRecord, SessionState};
use crate::watcher;

/// Default number of in-flight sessions.
pub const DEFAULT_CAPACITY: usize = 10;
/// Default retention of completed sessions.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3_600);
/// Default storage root.
pub const DEFAULT_STORAGE_ROOT: &str = "/tmp/downloads";

/// Registry tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of `Initializing`/`Active` sessions.
    pub capacity: usize,
    /// How long completed sessions stay registered.
    pub retention: Duration,
    /// Parent directory of every session's storage directory.
    pub storage_root: PathBuf,
    /// Whether engines may upload to peers.
    pub enable_upload: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            retention: DEFAULT_RETENTION,
            storage_root: PathBuf::from(DEFAULT_STORAGE_ROOT),
            enable_upload: false,
        }
    }
}

/// Why a session left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RetireReason {
    /// Explicit cancellation.
    Cancelled,
    /// The retention period after completion elapsed.
    Expired,
    /// The registry was shut down.
    Shutdown,
}

impl RetireReason {
    /// Stable label for metrics and events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for RetireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hooks for counting registry activity; every method defaults to a no-op.
pub trait RegistryObserver: Send + Sync {
    /// A new session was admitted (including ones that failed to start).
    fn session_created(&self) {}
    /// A create request matched an in-flight session.
    fn session_deduplicated(&self) {}
    /// A create request was refused; `reason` is a [`SessionError::kind`] label.
    fn admission_rejected(&self, reason: &'static str) {
        let _ = reason;
    }
    /// A session entered the `Failed` state.
    fn session_failed(&self) {}
    /// A session left the registry.
    fn session_retired(&self, reason: RetireReason) {
        let _ = reason;
    }
    /// The in-flight count changed.
    fn active_sessions(&self, count: usize) {
        let _ = count;
    }
}

struct NoopObserver;

impl RegistryObserver for NoopObserver {}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, SessionRecord>,
    /// In-flight sessions by fingerprint; its length is the admission count.
    active: HashMap<Fingerprint, SessionId>,
}

impl RegistryState {
    fn release(&mut self, fingerprint: &Fingerprint, session_id: SessionId) {
        if self.active.get(fingerprint) == Some(&session_id) {
            self.active.remove(fingerprint);
        }
    }
}

pub(crate) struct Shared {
    config: RegistryConfig,
    engine: Arc<dyn ContentEngine>,
    events: EventBus,
    observer: Arc<dyn RegistryObserver>,
    state: Mutex<RegistryState>,
    scheduler: CleanupScheduler,
}

/// Cloneable handle to the session registry.
#[derive(Clone)]
pub struct SessionRegistry {
    shared: Arc<Shared>,
}

/// Non-owning registry reference held by background tasks.
#[derive(Clone)]
pub(crate) struct WeakRegistry(Weak<Shared>);

impl WeakRegistry {
    pub(crate) fn upgrade(&self) -> Option<SessionRegistry> {
        self.0.upgrade().map(|shared| SessionRegistry { shared })
    }
}

impl SessionRegistry {
    /// Build a registry without activity hooks.
    #[must_use]
    pub fn new(config: RegistryConfig, engine: Arc<dyn ContentEngine>, events: EventBus) -> Self {
        Self::with_observer(config, engine, events, Arc::new(NoopObserver))
    }

    /// Build a registry that reports activity to `observer`.
    #[must_use]
    pub fn with_observer(
        config: RegistryConfig,
        engine: Arc<dyn ContentEngine>,
        events: EventBus,
        observer: Arc<dyn RegistryObserver>,
    ) -> Self {
        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let target: Weak<dyn CleanupTarget> = weak.clone();
            Shared {
                config,
                engine,
                events,
                observer,
                state: Mutex::new(RegistryState::default()),
                scheduler: CleanupScheduler::new(target),
            }
        });
        Self { shared }
    }

    /// Admit a session for `locator`, or return the in-flight one for the same content.
    ///
    /// The boolean is `true` when a new session was registered. An engine
    /// failure still registers a session, in the `Failed` state.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidLocator`] when no fingerprint can be derived and
    /// [`SessionError::CapacityExceeded`] when every slot is taken. Neither
    /// allocates a session.
    pub fn create_session(&self, locator: &str) -> SessionResult<(Session, bool)> {
        let fingerprint = match Fingerprint::from_locator(locator) {
            Ok(fingerprint) => fingerprint,
            Err(source) => {
                let err = SessionError::InvalidLocator { source };
                self.shared.observer.admission_rejected(err.kind());
                debug!(error = %err, "rejected session request");
                return Err(err);
            }
        };
        let shared = &self.shared;

        let mut state = shared.lock_state();
        if let Some(existing) = state.active.get(&fingerprint).copied() {
            if let Some(record) = state.sessions.get(&existing) {
                let session = record.snapshot();
                drop(state);
                shared.observer.session_deduplicated();
                shared.events.publish(Event::SessionDeduplicated {
                    session_id: existing.as_uuid(),
                });
                debug!(
                    session_id = %existing,
                    fingerprint = %fingerprint,
                    "joined in-flight session"
                );
                return Ok((session, false));
            }
            state.active.remove(&fingerprint);
        }

        let capacity = shared.config.capacity;
        if state.active.len() >= capacity {
            drop(state);
            let err = SessionError::CapacityExceeded { capacity };
            shared.observer.admission_rejected(err.kind());
            warn!(fingerprint = %fingerprint, capacity, "session capacity exceeded");
            return Err(err);
        }

        let id = SessionId::generate();
        let storage_path = shared.config.storage_root.join(id.to_string());
        let request = AddContent {
            locator: locator.trim().to_string(),
            storage_path: storage_path.clone(),
            upload_enabled: shared.config.enable_upload,
        };
        let mut record = SessionRecord {
            id,
            fingerprint: fingerprint.clone(),
            locator: locator.to_string(),
            display_name: display_name(locator),
            storage_path,
            handle: None,
            state: SessionState::Initializing,
            created_at: Utc::now(),
            completed_at: None,
            failure: None,
        };
        let notifications = match shared.engine.add_content(request) {
            Ok(job) => {
                record.handle = Some(job.handle);
                state.active.insert(fingerprint.clone(), id);
                Some(job.events)
            }
            Err(err) => {
                record.state = SessionState::Failed;
                record.failure = Some(describe_engine_error(&err));
                None
            }
        };
        let session = record.snapshot();
        state.sessions.insert(id, record);
        let active = state.active.len();
        drop(state);

        shared.observer.session_created();
        shared.observer.active_sessions(active);
        shared.events.publish(Event::SessionCreated {
            session_id: id.as_uuid(),
            fingerprint: fingerprint.to_string(),
            name: session.display_name.clone(),
        });

        match notifications {
            Some(notifications) => {
                info!(session_id = %id, fingerprint = %fingerprint, "session created");
                watcher::spawn(self.downgrade(), id, notifications);
            }
            None => {
                let message = session.failure.clone().unwrap_or_default();
                warn!(
                    session_id = %id,
                    fingerprint = %fingerprint,
                    error = %message,
                    "engine failed to start session"
                );
                shared.observer.session_failed();
                shared.events.publish(Event::SessionFailed {
                    session_id: id.as_uuid(),
                    message,
                });
            }
        }
        Ok((session, true))
    }

    /// Snapshot of one session.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when the id is unknown or already retired.
    pub fn get_session(&self, session_id: SessionId) -> SessionResult<Session> {
        self.shared
            .lock_state()
            .sessions
            .get(&session_id)
            .map(SessionRecord::snapshot)
            .ok_or(SessionError::not_found(session_id))
    }

    /// Snapshot of every registered session, in no particular order.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<Session> {
        self.shared
            .lock_state()
            .sessions
            .values()
            .map(SessionRecord::snapshot)
            .collect()
    }

    /// Remove a session immediately, disarming its cleanup and destroying its handle.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when the id is unknown, including a second cancel.
    pub fn cancel_session(&self, session_id: SessionId) -> SessionResult<()> {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        let record = state
            .sessions
            .remove(&session_id)
            .ok_or(SessionError::not_found(session_id))?;
        state.release(&record.fingerprint, session_id);
        shared.scheduler.cancel(session_id);
        let active = state.active.len();
        drop(state);

        shared.events.publish(Event::StateChanged {
            session_id: session_id.as_uuid(),
            state: SessionState::Cancelled,
        });
        shared.retire(record, RetireReason::Cancelled, active);
        Ok(())
    }

    /// Record that metadata arrived: `Initializing` becomes `Active`.
    ///
    /// Other states are left untouched.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when the id is unknown.
    pub fn mark_active(&self, session_id: SessionId) -> SessionResult<()> {
        let mut state = self.shared.lock_state();
        let record = state
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::not_found(session_id))?;
        if record.state != SessionState::Initializing {
            return Ok(());
        }
        record.state = SessionState::Active;
        drop(state);

        debug!(session_id = %session_id, "session active");
        self.shared.events.publish(Event::StateChanged {
            session_id: session_id.as_uuid(),
            state: SessionState::Active,
        });
        Ok(())
    }

    /// Record that the engine finished: release the fingerprint and arm cleanup.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when the id is unknown and
    /// [`SessionError::InvalidTransition`] when the session is already terminal.
    pub fn mark_completed(&self, session_id: SessionId) -> SessionResult<()> {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        let record = state
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::not_found(session_id))?;
        if !record.state.is_in_flight() {
            return Err(SessionError::InvalidTransition {
                session_id,
                from: record.state,
                to: SessionState::Completed,
            });
        }
        record.state = SessionState::Completed;
        record.completed_at = Some(Utc::now());
        let fingerprint = record.fingerprint.clone();
        state.release(&fingerprint, session_id);
        let armed = shared.scheduler.arm(session_id, shared.config.retention);
        let active = state.active.len();
        drop(state);

        if armed.is_none() {
            warn!(
                session_id = %session_id,
                "cleanup not armed; completed session is retained until cancelled"
            );
        }

        info!(
            session_id = %session_id,
            retention_secs = shared.config.retention.as_secs(),
            "session completed"
        );
        shared.observer.active_sessions(active);
        shared.events.publish(Event::StateChanged {
            session_id: session_id.as_uuid(),
            state: SessionState::Completed,
        });
        Ok(())
    }

    /// Record an unrecoverable engine error. The session stays registered
    /// for inspection until cancelled.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when the id is unknown and
    /// [`SessionError::InvalidTransition`] when the session is already terminal.
    pub fn mark_failed(
        &self,
        session_id: SessionId,
        cause: impl Into<String>,
    ) -> SessionResult<()> {
        let shared = &self.shared;
        let cause = cause.into();
        let mut state = shared.lock_state();
        let record = state
            .sessions
            .get_mut(&session_id)
            .ok_or(SessionError::not_found(session_id))?;
        if record.state.is_terminal() {
            return Err(SessionError::InvalidTransition {
                session_id,
                from: record.state,
                to: SessionState::Failed,
            });
        }
        record.state = SessionState::Failed;
        record.failure = Some(cause.clone());
        let fingerprint = record.fingerprint.clone();
        state.release(&fingerprint, session_id);
        let active = state.active.len();
        drop(state);

        warn!(session_id = %session_id, error = %cause, "session failed");
        shared.observer.session_failed();
        shared.observer.active_sessions(active);
        shared.events.publish(Event::SessionFailed {
            session_id: session_id.as_uuid(),
            message: cause,
        });
        Ok(())
    }

    /// Publish an engine progress report for a registered session.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] when the id is unknown.
    pub fn record_progress(&self, session_id: SessionId, fraction: f64) -> SessionResult<()> {
        if !self.shared.lock_state().sessions.contains_key(&session_id) {
            return Err(SessionError::not_found(session_id));
        }
        self.shared.events.publish(Event::Progress {
            session_id: session_id.as_uuid(),
            fraction,
        });
        Ok(())
    }

    /// Resolve a finished item of a session to its on-disk path.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotFound`] for an unknown session,
    /// [`SessionError::ItemNotFound`] for an unknown or unsafe item path, and
    /// [`SessionError::ItemIncomplete`] when the item is still transferring.
    pub fn locate_file(&self, session_id: SessionId, name: &str) -> SessionResult<LocatedFile> {
        let session = self.get_session(session_id)?;
        let item_not_found = || SessionError::ItemNotFound {
            session_id,
            name: name.to_string(),
        };
        let file = session
            .content
            .files
            .into_iter()
            .find(|file| file.name == name)
            .ok_or_else(item_not_found)?;
        if !file.is_complete() {
            return Err(SessionError::ItemIncomplete {
                session_id,
                name: name.to_string(),
            });
        }
        if !is_contained(&file.path) {
            warn!(
                session_id = %session_id,
                path = %file.path.display(),
                "refusing item outside storage directory"
            );
            return Err(item_not_found());
        }
        Ok(LocatedFile {
            path: session.storage_path.join(&file.path),
            name: file.name,
            size: file.size,
        })
    }

    /// Number of `Initializing`/`Active` sessions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.shared.lock_state().active.len()
    }

    /// Configured in-flight capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.config.capacity
    }

    /// Configuration this registry was built with.
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.shared.config
    }

    /// Whether a cleanup timer is pending for the session.
    #[must_use]
    pub fn cleanup_pending(&self, session_id: SessionId) -> bool {
        self.shared.scheduler.is_armed(session_id)
    }

    /// Remove every session, disarm timers and destroy handles.
    ///
    /// Returns the number of sessions removed.
    pub fn shutdown(&self) -> usize {
        let shared = &self.shared;
        let mut state = shared.lock_state();
        let records: Vec<SessionRecord> =
            state.sessions.drain().map(|(_, record)| record).collect();
        state.active.clear();
        shared.scheduler.cancel_all();
        drop(state);

        let removed = records.len();
        for record in records {
            shared.retire(record, RetireReason::Shutdown, 0);
        }
        info!(removed, "session registry shut down");
        removed
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry(Arc::downgrade(&self.shared))
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Finish removing a record that has already left the maps.
    fn retire(&self, record: SessionRecord, reason: RetireReason, active: usize) {
        if let Some(handle) = record.handle {
            handle.destroy();
        }
        info!(session_id = %record.id, reason = %reason, "session removed");
        self.observer.session_retired(reason);
        self.observer.active_sessions(active);
        self.events.publish(Event::SessionRemoved {
            session_id: record.id.as_uuid(),
            reason: reason.as_str().to_string(),
        });
    }
}

impl CleanupTarget for Shared {
    fn expire(&self, session_id: SessionId, generation: u64) {
        let mut state = self.lock_state();
        if !self.scheduler.claim(session_id, generation) {
            debug!(session_id = %session_id, generation, "stale cleanup timer ignored");
            return;
        }
        let completed = state
            .sessions
            .get(&session_id)
            .is_some_and(|record| record.state == SessionState::Completed);
        if !completed {
            debug!(session_id = %session_id, "cleanup skipped; session no longer completed");
            return;
        }
        let Some(record) = state.sessions.remove(&session_id) else {
            return;
        };
        state.release(&record.fingerprint, session_id);
        let active = state.active.len();
        drop(state);

        self.retire(record, RetireReason::Expired, active);
    }
}

fn describe_engine_error(err: &EngineError) -> String {
    match err {
        EngineError::Rejected { reason } => format!("{err}: {reason}"),
        EngineError::Unavailable { source } => format!("{err}: {source}"),
    }
}

fn is_contained(path: &Path) -> bool {
    path.components().next().is_some()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)))
}
