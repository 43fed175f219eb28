//! Server-sent session lifecycle events.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::HeaderMap,
    response::sse::{self, Sse},
};
use futures_util::{Stream, stream};
use lodestone_events::{EventBus, EventEnvelope, EventId};
use tracing::error;

use crate::http::constants::{HEADER_LAST_EVENT_ID, SSE_KEEP_ALIVE_SECS};
use crate::state::ApiState;

pub(crate) async fn stream_events(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<sse::Event, Infallible>> + Send> {
    let last_id = last_event_id(&headers);
    Sse::new(event_sse_stream(state.events.clone(), last_id)).keep_alive(
        sse::KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}

fn last_event_id(headers: &HeaderMap) -> Option<EventId> {
    headers
        .get(HEADER_LAST_EVENT_ID)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<EventId>().ok())
}

pub(crate) fn event_sse_stream(
    bus: EventBus,
    since: Option<EventId>,
) -> impl Stream<Item = Result<sse::Event, Infallible>> + Send {
    let subscription = bus.subscribe(since);
    stream::unfold(subscription, |mut subscription| async move {
        loop {
            let envelope = subscription.next().await?;
            if let Some(event) = to_sse_event(&envelope) {
                return Some((Ok(event), subscription));
            }
        }
    })
}

fn to_sse_event(envelope: &EventEnvelope) -> Option<sse::Event> {
    match serde_json::to_string(envelope) {
        Ok(payload) => Some(
            sse::Event::default()
                .id(envelope.id.to_string())
                .event(envelope.event.kind())
                .data(payload),
        ),
        Err(err) => {
            error!(error = %err, "failed to serialise SSE event payload");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use futures_util::StreamExt;
    use lodestone_core::SessionId;
    use lodestone_events::{Event, SessionState};
    use tokio::time::timeout;

    #[test]
    fn last_event_id_parses_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(last_event_id(&headers), None);
        headers.insert(HEADER_LAST_EVENT_ID, HeaderValue::from_static("42"));
        assert_eq!(last_event_id(&headers), Some(42));
        headers.insert(HEADER_LAST_EVENT_ID, HeaderValue::from_static("nope"));
        assert_eq!(last_event_id(&headers), None);
    }

    #[tokio::test]
    async fn stream_replays_after_last_event_id() -> anyhow::Result<()> {
        let bus = EventBus::with_capacity(8);
        let id = SessionId::generate().as_uuid();
        let first = bus.publish(Event::StateChanged {
            session_id: id,
            state: SessionState::Active,
        });
        bus.publish(Event::Progress {
            session_id: id,
            fraction: 0.5,
        });

        let stream = event_sse_stream(bus.clone(), Some(first));
        futures_util::pin_mut!(stream);
        let next = timeout(Duration::from_millis(200), stream.next()).await?;
        assert!(matches!(next, Some(Ok(_))), "expected replayed event");
        Ok(())
    }

    #[tokio::test]
    async fn stream_emits_live_events() -> anyhow::Result<()> {
        let bus = EventBus::with_capacity(8);
        let publisher = bus.clone();
        let stream = event_sse_stream(bus.clone(), None);
        futures_util::pin_mut!(stream);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(Event::SessionRemoved {
                session_id: SessionId::generate().as_uuid(),
                reason: "cancelled".to_string(),
            });
        });
        let next = timeout(Duration::from_millis(500), stream.next()).await?;
        assert!(matches!(next, Some(Ok(_))), "expected live event");
        Ok(())
    }
}
