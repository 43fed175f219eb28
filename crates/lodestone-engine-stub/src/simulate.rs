//! Self-driving engine used when no transfer backend is wired in.
//!
//! Every accepted locator becomes a single-item transfer that progresses on a
//! fixed tick and writes a zero-filled file of the configured size into the
//! session's storage directory before reporting completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use lodestone_core::{
    AddContent, ContentEngine, EngineError, EngineJob, FileSnapshot, Fingerprint, display_name,
};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::stub::StubHandle;

/// Shape of a simulated transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationProfile {
    /// Size of the produced file in bytes.
    pub file_size: u64,
    /// Number of progress reports before completion.
    pub steps: u32,
    /// Delay between reports.
    pub tick: Duration,
}

impl Default for SimulationProfile {
    fn default() -> Self {
        Self {
            file_size: 1024 * 1024,
            steps: 20,
            tick: Duration::from_millis(500),
        }
    }
}

/// Engine that fabricates transfers according to a [`SimulationProfile`].
#[derive(Debug, Clone, Default)]
pub struct SimulatedEngine {
    profile: SimulationProfile,
}

impl SimulatedEngine {
    /// Build an engine with the given profile.
    #[must_use]
    pub const fn new(profile: SimulationProfile) -> Self {
        Self { profile }
    }

    /// Active profile.
    #[must_use]
    pub const fn profile(&self) -> SimulationProfile {
        self.profile
    }
}

impl ContentEngine for SimulatedEngine {
    fn add_content(&self, request: AddContent) -> Result<EngineJob, EngineError> {
        let runtime = Handle::try_current().map_err(|err| EngineError::Unavailable {
            source: Box::new(err),
        })?;
        let name = content_name(&request.locator);
        let (handle, events) = StubHandle::new(request);
        runtime.spawn(drive(Arc::clone(&handle), name, self.profile));
        Ok(EngineJob { handle, events })
    }
}

fn content_name(locator: &str) -> String {
    display_name(locator).unwrap_or_else(|| {
        Fingerprint::from_locator(locator).map_or_else(
            |_| "content".to_string(),
            |fingerprint| format!("content-{}", &fingerprint.as_str()[..8]),
        )
    })
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
async fn drive(handle: Arc<StubHandle>, name: String, profile: SimulationProfile) {
    let file_name = format!("{}.bin", name.replace(['/', '\\'], "_"));
    let file = FileSnapshot {
        name: file_name.clone(),
        path: PathBuf::from(&file_name),
        size: profile.file_size,
        fraction_done: 0.0,
    };
    tokio::time::sleep(profile.tick).await;
    if !handle.emit_metadata(&name, vec![file]) {
        return;
    }

    let steps = profile.steps.max(1);
    let step_bytes = profile.file_size / u64::from(steps);
    let rate = (step_bytes as f64 / profile.tick.as_secs_f64().max(f64::EPSILON)) as u64;
    for step in 1..steps {
        tokio::time::sleep(profile.tick).await;
        let fraction = f64::from(step) / f64::from(steps);
        let remaining = f64::from(steps - step) * profile.tick.as_secs_f64();
        handle.update_snapshot(|snapshot| {
            snapshot.rate_bytes_per_sec = rate;
            snapshot.bytes_downloaded = step_bytes * u64::from(step);
            snapshot.peer_count = 1;
            snapshot.estimated_seconds_remaining = Some(remaining);
        });
        if !handle.update_progress(fraction) {
            debug!(storage = %handle.storage_path().display(), "simulated transfer stopped");
            return;
        }
    }

    tokio::time::sleep(profile.tick).await;
    if handle.is_destroyed() {
        return;
    }
    let target = handle.storage_path().join(&file_name);
    if let Err(err) = write_content(&target, profile.file_size).await {
        warn!(error = %err, path = %target.display(), "simulated transfer could not write content");
        handle.fail(format!("failed to write {}: {err}", target.display()));
        return;
    }
    handle.update_snapshot(|snapshot| {
        snapshot.bytes_downloaded = profile.file_size;
        snapshot.peer_count = 0;
    });
    handle.complete();
}

async fn write_content(path: &std::path::Path, size: u64) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = tokio::fs::File::create(path).await?;
    file.set_len(size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_core::{ContentHandle, HandleEvent};

    const LOCATOR: &str = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=demo";

    #[test]
    fn names_fall_back_to_fingerprint() {
        assert_eq!(content_name(LOCATOR), "demo");
        assert_eq!(
            content_name("0123456789abcdef0123456789abcdef01234567"),
            "content-01234567"
        );
    }

    #[test]
    fn requires_runtime() {
        let engine = SimulatedEngine::default();
        let result = engine.add_content(AddContent {
            locator: LOCATOR.into(),
            storage_path: PathBuf::from("/nonexistent"),
            upload_enabled: false,
        });
        assert!(matches!(result, Err(EngineError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn runs_to_completion_and_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = SimulatedEngine::new(SimulationProfile {
            file_size: 64,
            steps: 3,
            tick: Duration::from_millis(1),
        });
        let mut job = engine
            .add_content(AddContent {
                locator: LOCATOR.into(),
                storage_path: dir.path().join("session"),
                upload_enabled: false,
            })
            .expect("job");

        let mut seen = Vec::new();
        while let Some(event) = job.events.recv().await {
            let done = event == HandleEvent::Done;
            seen.push(event);
            if done {
                break;
            }
        }
        assert_eq!(seen.first(), Some(&HandleEvent::Metadata));
        assert_eq!(seen.last(), Some(&HandleEvent::Done));

        let snapshot = job.handle.snapshot();
        assert!(snapshot.is_done);
        assert_eq!(snapshot.name.as_deref(), Some("demo"));
        let written = std::fs::metadata(dir.path().join("session").join("demo.bin"))
            .expect("content written");
        assert_eq!(written.len(), 64);
    }
}
