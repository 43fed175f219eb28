//! JSON bodies exchanged with the browser UI.
//!
//! Field names are `camelCase` to match the UI's expectations.

use chrono::{DateTime, Utc};
use lodestone_core::{FileSnapshot, ProgressBounds, Session, SessionState};
use serde::{Deserialize, Serialize};

/// RFC9457 problem document, plus a flat `error` string the UI displays.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    /// URI reference identifying the problem type.
    pub kind: String,
    /// Short, human-readable summary of the issue.
    pub title: String,
    /// HTTP status code associated with the error.
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    /// Detailed diagnostic message when available.
    pub detail: Option<String>,
    /// Message shown to the user.
    pub error: String,
}

/// Body of `POST /api/download`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRequest {
    /// Magnet locator; absent or blank is rejected.
    #[serde(default)]
    pub magnet: Option<String>,
}

/// Response to `POST /api/download`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    /// Identifier to poll.
    pub download_id: String,
    /// Best known name.
    pub name: String,
    /// `false` when an in-flight session for the same content was returned.
    pub is_new: bool,
    /// Coarse status label.
    pub status: &'static str,
}

/// Response to `DELETE /api/download/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CancelResponse {
    /// Confirmation text.
    pub message: String,
}

impl CancelResponse {
    pub(crate) fn cancelled() -> Self {
        Self {
            message: "Download cancelled".to_string(),
        }
    }
}

/// Per-item row of a status view.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileView {
    /// Item name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Completion percentage in `[0, 100]`.
    pub progress: f64,
    /// Whether the item can be downloaded.
    pub completed: bool,
    /// Download link for completed items.
    pub download_url: Option<String>,
}

/// Response to `GET /api/status/{id}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    /// Session identifier.
    pub id: String,
    /// `initializing`, `downloading`, `completed` or `failed`.
    pub status: &'static str,
    /// Best known name.
    pub name: Option<String>,
    /// Items in the content.
    pub files: Vec<FileView>,
    /// Normalized aggregate percentage.
    pub progress: f64,
    /// Download rate in MiB/s with two decimals.
    pub download_speed: String,
    /// Bytes sent to peers.
    pub uploaded: u64,
    /// Bytes received.
    pub downloaded: u64,
    /// Connected peers.
    pub peers: u32,
    /// Estimated milliseconds remaining.
    pub time_remaining: Option<u64>,
    /// Admission time.
    pub created_at: DateTime<Utc>,
    /// Failure cause for failed sessions.
    pub error: Option<String>,
}

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

impl StatusView {
    /// Project a registry snapshot, normalizing the aggregate progress with `bounds`.
    #[must_use]
    pub fn from_session(session: &Session, bounds: &ProgressBounds) -> Self {
        let id = session.id.to_string();
        let content = &session.content;
        let files = content
            .files
            .iter()
            .map(|file| FileView::from_snapshot(&id, file))
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let speed = content.rate_bytes_per_sec as f64 / BYTES_PER_MIB;
        Self {
            status: status_label(session.state),
            name: session.name().map(str::to_string),
            files,
            progress: bounds.normalize(content.aggregate_fraction),
            download_speed: format!("{speed:.2}"),
            uploaded: content.bytes_uploaded,
            downloaded: content.bytes_downloaded,
            peers: content.peer_count,
            time_remaining: content.estimated_seconds_remaining.and_then(remaining_millis),
            created_at: session.created_at,
            error: session.failure.clone(),
            id,
        }
    }
}

impl FileView {
    fn from_snapshot(session_id: &str, file: &FileSnapshot) -> Self {
        let completed = file.is_complete();
        let progress = if file.fraction_done.is_nan() {
            0.0
        } else {
            (file.fraction_done * 100.0).clamp(0.0, 100.0)
        };
        Self {
            name: file.name.clone(),
            size: file.size,
            progress,
            completed,
            download_url: completed.then(|| download_url(session_id, &file.name)),
        }
    }
}

/// Relative link that streams one completed item.
#[must_use]
pub fn download_url(session_id: &str, name: &str) -> String {
    format!("/api/download/{session_id}/{}", urlencoding::encode(name))
}

pub(crate) const fn status_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Initializing => "initializing",
        SessionState::Active => "downloading",
        SessionState::Completed => "completed",
        SessionState::Cancelled => "cancelled",
        SessionState::Failed => "failed",
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn remaining_millis(seconds: f64) -> Option<u64> {
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1_000.0).round() as u64)
}

/// Response to `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `ok` while the process serves requests.
    pub status: String,
    /// Sessions initializing or transferring.
    pub active_sessions: usize,
    /// Configured in-flight capacity.
    pub capacity: usize,
    /// Build identifier.
    pub build: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_core::{ContentSnapshot, Fingerprint, SessionId};
    use std::path::PathBuf;

    fn session(content: ContentSnapshot) -> Session {
        let locator = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=demo";
        Session {
            id: SessionId::generate(),
            fingerprint: Fingerprint::from_locator(locator).expect("valid locator"),
            locator: locator.to_string(),
            state: SessionState::Active,
            created_at: Utc::now(),
            completed_at: None,
            failure: None,
            display_name: Some("demo".to_string()),
            content,
            storage_path: PathBuf::from("/tmp/downloads/x"),
        }
    }

    #[test]
    fn status_view_formats_rates_and_links() {
        let content = ContentSnapshot {
            name: None,
            files: vec![
                FileSnapshot {
                    name: "a b.txt".to_string(),
                    path: PathBuf::from("a b.txt"),
                    size: 10,
                    fraction_done: 1.0,
                },
                FileSnapshot {
                    name: "c.bin".to_string(),
                    path: PathBuf::from("c.bin"),
                    size: 20,
                    fraction_done: 0.25,
                },
            ],
            aggregate_fraction: 1.37,
            rate_bytes_per_sec: 3 * 1024 * 1024 / 2,
            bytes_uploaded: 0,
            bytes_downloaded: 15,
            peer_count: 4,
            estimated_seconds_remaining: Some(1.5),
            is_done: false,
        };
        let session = session(content);
        let view = StatusView::from_session(&session, &ProgressBounds::default());

        assert_eq!(view.status, "downloading");
        assert_eq!(view.name.as_deref(), Some("demo"));
        assert!((view.progress - 100.0).abs() < f64::EPSILON);
        assert_eq!(view.download_speed, "1.50");
        assert_eq!(view.time_remaining, Some(1_500));
        assert_eq!(
            view.files[0].download_url,
            Some(format!("/api/download/{}/a%20b.txt", session.id))
        );
        assert!(view.files[1].download_url.is_none());
        assert!((view.files[1].progress - 25.0).abs() < 1e-9);
    }

    #[test]
    fn status_view_serializes_camel_case() -> anyhow::Result<()> {
        let session = session(ContentSnapshot::default());
        let view = StatusView::from_session(&session, &ProgressBounds::default());
        let value = serde_json::to_value(&view)?;
        assert_eq!(value["downloadSpeed"], "0.00");
        assert!(value["timeRemaining"].is_null());
        assert!(value.get("createdAt").is_some());
        Ok(())
    }

    #[test]
    fn negative_estimates_are_dropped() {
        assert_eq!(remaining_millis(-1.0), None);
        assert_eq!(remaining_millis(f64::INFINITY), None);
        assert_eq!(remaining_millis(0.25), Some(250));
    }
}
