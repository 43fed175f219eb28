//! Health and metrics endpoints.

use std::sync::Arc;

use axum::{Json, body::Body, extract::State, http::StatusCode, response::Response};
use lodestone_telemetry::build_id;
use tracing::error;

use crate::http::errors::ApiError;
use crate::models::HealthResponse;
use crate::state::ApiState;

pub(crate) async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_sessions: state.registry.active_count(),
        capacity: state.registry.capacity(),
        build: build_id().to_string(),
    })
}

pub(crate) async fn metrics(State(state): State<Arc<ApiState>>) -> Result<Response, ApiError> {
    match state.telemetry.render() {
        Ok(body) => Response::builder()
            .status(StatusCode::OK)
            .header(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")
            .body(Body::from(body))
            .map_err(|err| {
                error!(error = %err, "failed to build metrics response");
                ApiError::internal("failed to build metrics response")
            }),
        Err(err) => {
            error!(error = %err, "failed to render metrics");
            Err(ApiError::internal("failed to render metrics"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use lodestone_core::{ProgressBounds, RegistryConfig, SessionRegistry};
    use lodestone_engine_stub::StubEngine;
    use lodestone_events::EventBus;
    use lodestone_telemetry::Metrics;

    fn state() -> anyhow::Result<Arc<ApiState>> {
        let events = EventBus::with_capacity(4);
        let config = RegistryConfig {
            capacity: 3,
            ..RegistryConfig::default()
        };
        let registry = SessionRegistry::new(config, Arc::new(StubEngine::new()), events.clone());
        Ok(Arc::new(ApiState::new(
            registry,
            ProgressBounds::default(),
            Metrics::new()?,
            events,
        )))
    }

    #[tokio::test]
    async fn health_reports_capacity() -> anyhow::Result<()> {
        let Json(body) = health(State(state()?)).await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.active_sessions, 0);
        assert_eq!(body.capacity, 3);
        Ok(())
    }

    #[tokio::test]
    async fn metrics_renders_prometheus_text() -> anyhow::Result<()> {
        let state = state()?;
        state.telemetry.inc_http_request("/health", 200);
        let response = metrics(State(state)).await?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let text = String::from_utf8(bytes.to_vec())?;
        assert!(text.contains("http_requests_total"));
        Ok(())
    }
}
