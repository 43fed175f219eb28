//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lodestone_core::SessionError;
use tracing::debug;

use crate::http::constants::{
    MESSAGE_CAPACITY, MESSAGE_DOWNLOAD_NOT_FOUND, MESSAGE_FILE_NOT_FOUND, PROBLEM_BAD_REQUEST,
    PROBLEM_CAPACITY, PROBLEM_CONFLICT, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND,
};
use crate::models::ProblemDetails;

/// Structured API error with optional RFC9457 detail.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    pub(crate) detail: Option<String>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, PROBLEM_BAD_REQUEST, "bad request").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, PROBLEM_NOT_FOUND, "resource not found")
            .with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }

    pub(crate) fn capacity_exceeded(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, PROBLEM_CAPACITY, "capacity exceeded")
            .with_detail(detail)
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        debug!(error = %err, kind = err.kind(), "session operation refused");
        match err {
            SessionError::InvalidLocator { source } => {
                Self::bad_request(format!("invalid magnet link: {source}"))
            }
            SessionError::CapacityExceeded { .. } => Self::capacity_exceeded(MESSAGE_CAPACITY),
            SessionError::NotFound { .. } => Self::not_found(MESSAGE_DOWNLOAD_NOT_FOUND),
            SessionError::ItemNotFound { .. } => Self::not_found(MESSAGE_FILE_NOT_FOUND),
            SessionError::ItemIncomplete { name, .. } => {
                Self::conflict(format!("file '{name}' has not finished downloading"))
            }
            SessionError::InvalidTransition { from, to, .. } => Self::conflict(format!(
                "cannot move session from {} to {}",
                from.as_str(),
                to.as_str()
            )),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({}): {detail}", self.title, self.status),
            None => write!(f, "{} ({})", self.title, self.status),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = self
            .detail
            .clone()
            .unwrap_or_else(|| self.title.to_string());
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            error,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use lodestone_core::{LocatorError, SessionId, SessionState};

    #[test]
    fn session_errors_map_to_statuses() {
        let id = SessionId::generate();
        let cases = [
            (
                SessionError::InvalidLocator {
                    source: LocatorError::MissingInfoHash,
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                SessionError::CapacityExceeded { capacity: 1 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                SessionError::NotFound { session_id: id },
                StatusCode::NOT_FOUND,
            ),
            (
                SessionError::ItemNotFound {
                    session_id: id,
                    name: "a".to_string(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                SessionError::ItemIncomplete {
                    session_id: id,
                    name: "a".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                SessionError::InvalidTransition {
                    session_id: id,
                    from: SessionState::Failed,
                    to: SessionState::Active,
                },
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[tokio::test]
    async fn problem_body_carries_flat_error() -> anyhow::Result<()> {
        let response = ApiError::not_found(MESSAGE_DOWNLOAD_NOT_FOUND).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body: ProblemDetails = serde_json::from_slice(&bytes)?;
        assert_eq!(body.kind, PROBLEM_NOT_FOUND);
        assert_eq!(body.status, 404);
        assert_eq!(body.error, MESSAGE_DOWNLOAD_NOT_FOUND);
        assert_eq!(body.detail.as_deref(), Some(MESSAGE_DOWNLOAD_NOT_FOUND));
        Ok(())
    }
}
