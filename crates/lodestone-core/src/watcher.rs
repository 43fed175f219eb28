//! Background task translating handle notifications into registry transitions.

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::engine::HandleEvent;
use crate::error::SessionError;
use crate::model::SessionId;
use crate::registry::WeakRegistry;

/// Spawn the watcher for one session. Without a runtime the notifications are dropped.
pub(crate) fn spawn(
    registry: WeakRegistry,
    session_id: SessionId,
    events: UnboundedReceiver<HandleEvent>,
) {
    match Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(watch(registry, session_id, events));
        }
        Err(_) => {
            warn!(
                session_id = %session_id,
                "no runtime available; session progress will not be tracked"
            );
        }
    }
}

async fn watch(
    registry: WeakRegistry,
    session_id: SessionId,
    mut events: UnboundedReceiver<HandleEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(registry) = registry.upgrade() else {
            break;
        };
        let outcome = match event {
            HandleEvent::Metadata => registry.mark_active(session_id),
            HandleEvent::Progress { fraction } => registry.record_progress(session_id, fraction),
            HandleEvent::Done => registry.mark_completed(session_id),
            HandleEvent::Error { message } => registry.mark_failed(session_id, message),
        };
        match outcome {
            Ok(()) => {}
            Err(SessionError::NotFound { .. }) => break,
            Err(err) => {
                debug!(session_id = %session_id, error = %err, "ignored handle notification");
            }
        }
    }
    debug!(session_id = %session_id, "session watcher stopped");
}
