//! Deferred, cancellable removal of completed sessions.
//!
//! Timers are keyed by session id. Each arm mints a new generation; the target
//! must [`CleanupScheduler::claim`] the generation it was woken with before
//! acting, so a timer that was re-armed or cancelled while already firing
//! becomes a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};
use tracing::warn;

use crate::model::SessionId;

/// Receiver of expired timers.
pub trait CleanupTarget: Send + Sync {
    /// Called once when the timer armed with `generation` elapses.
    fn expire(&self, session_id: SessionId, generation: u64);
}

struct ArmedTimer {
    generation: u64,
    task: AbortHandle,
}

/// Per-session one-shot timers.
pub struct CleanupScheduler {
    target: Weak<dyn CleanupTarget>,
    timers: Mutex<HashMap<SessionId, ArmedTimer>>,
    next_generation: AtomicU64,
}

impl CleanupScheduler {
    /// Build a scheduler that notifies `target`; a dropped target silences every timer.
    #[must_use]
    pub fn new(target: Weak<dyn CleanupTarget>) -> Self {
        Self {
            target,
            timers: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Arm (or re-arm) the timer for a session and return its generation.
    ///
    /// Any timer already armed for the session is aborted. Returns `None` when
    /// called outside a Tokio runtime, in which case nothing is scheduled.
    pub fn arm(&self, session_id: SessionId, after: Duration) -> Option<u64> {
        let Ok(runtime) = Handle::try_current() else {
            warn!(session_id = %session_id, "no runtime available; cleanup not scheduled");
            return None;
        };
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + after;
        let target = self.target.clone();
        // Held across the spawn so a zero-delay timer cannot be claimed
        // before it is recorded.
        let mut timers = self.lock_timers();
        let task = runtime
            .spawn(async move {
                sleep_until(deadline).await;
                if let Some(target) = target.upgrade() {
                    target.expire(session_id, generation);
                }
            })
            .abort_handle();
        if let Some(previous) = timers.insert(session_id, ArmedTimer { generation, task }) {
            previous.task.abort();
        }
        Some(generation)
    }

    /// Disarm the session's timer. Returns whether one was armed.
    pub fn cancel(&self, session_id: SessionId) -> bool {
        let Some(timer) = self.lock_timers().remove(&session_id) else {
            return false;
        };
        timer.task.abort();
        true
    }

    /// Take ownership of a firing timer.
    ///
    /// Succeeds only if `generation` is still the armed one for the session;
    /// the entry is removed so the same timer can never be claimed twice.
    pub fn claim(&self, session_id: SessionId, generation: u64) -> bool {
        let mut timers = self.lock_timers();
        match timers.get(&session_id) {
            Some(timer) if timer.generation == generation => {
                timers.remove(&session_id);
                true
            }
            _ => false,
        }
    }

    /// Whether a timer is pending for the session.
    #[must_use]
    pub fn is_armed(&self, session_id: SessionId) -> bool {
        self.lock_timers().contains_key(&session_id)
    }

    /// Number of pending timers.
    #[must_use]
    pub fn armed_count(&self) -> usize {
        self.lock_timers().len()
    }

    /// Disarm every pending timer.
    pub fn cancel_all(&self) {
        for (_, timer) in self.lock_timers().drain() {
            timer.task.abort();
        }
    }

    fn lock_timers(&self) -> MutexGuard<'_, HashMap<SessionId, ArmedTimer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
