//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges that describe session admission and retirement.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    sessions_created_total: IntCounter,
    sessions_deduplicated_total: IntCounter,
    admission_rejected_total: IntCounterVec,
    sessions_retired_total: IntCounterVec,
    sessions_failed_total: IntCounter,
    active_sessions: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Sessions currently initializing or transferring.
    pub active_sessions: i64,
    /// Sessions admitted since start.
    pub sessions_created_total: u64,
    /// Create requests answered with an in-flight session.
    pub sessions_deduplicated_total: u64,
    /// Sessions that entered the failed state.
    pub sessions_failed_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let sessions_created_total =
            counter("sessions_created_total", "Download sessions admitted")?;
        let sessions_deduplicated_total = counter(
            "sessions_deduplicated_total",
            "Create requests joined to an in-flight session",
        )?;
        let admission_rejected_total = counter_vec(
            "admission_rejected_total",
            "Create requests refused by reason",
            &["reason"],
        )?;
        let sessions_retired_total = counter_vec(
            "sessions_retired_total",
            "Sessions removed from the registry by reason",
            &["reason"],
        )?;
        let sessions_failed_total = counter("sessions_failed_total", "Sessions that failed")?;
        let active_sessions = IntGauge::with_opts(Opts::new(
            "active_sessions",
            "Sessions initializing or transferring",
        ))
        .map_err(|source| TelemetryError::build("active_sessions", source))?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "sessions_created_total", &sessions_created_total)?;
        register(
            &registry,
            "sessions_deduplicated_total",
            &sessions_deduplicated_total,
        )?;
        register(
            &registry,
            "admission_rejected_total",
            &admission_rejected_total,
        )?;
        register(&registry, "sessions_retired_total", &sessions_retired_total)?;
        register(&registry, "sessions_failed_total", &sessions_failed_total)?;
        register(&registry, "active_sessions", &active_sessions)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                sessions_created_total,
                sessions_deduplicated_total,
                admission_rejected_total,
                sessions_retired_total,
                sessions_failed_total,
                active_sessions,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count an admitted session.
    pub fn inc_session_created(&self) {
        self.inner.sessions_created_total.inc();
    }

    /// Count a create request joined to an in-flight session.
    pub fn inc_session_deduplicated(&self) {
        self.inner.sessions_deduplicated_total.inc();
    }

    /// Count a refused create request.
    pub fn inc_admission_rejected(&self, reason: &str) {
        self.inner
            .admission_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Count a session leaving the registry.
    pub fn inc_session_retired(&self, reason: &str) {
        self.inner
            .sessions_retired_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Count a failed session.
    pub fn inc_session_failed(&self) {
        self.inner.sessions_failed_total.inc();
    }

    /// Set the active session gauge.
    pub fn set_active_sessions(&self, count: i64) {
        self.inner.active_sessions.set(count);
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderEncoding { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_sessions: self.inner.active_sessions.get(),
            sessions_created_total: self.inner.sessions_created_total.get(),
            sessions_deduplicated_total: self.inner.sessions_deduplicated_total.get(),
            sessions_failed_total: self.inner.sessions_failed_total.get(),
        }
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::build(name, source))
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::build(name, source))
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::register(name, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_http_request("/health", 200);
        metrics.inc_session_created();
        metrics.inc_session_created();
        metrics.inc_session_deduplicated();
        metrics.inc_admission_rejected("capacity_exceeded");
        metrics.inc_session_retired("expired");
        metrics.inc_session_failed();
        metrics.set_active_sessions(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.active_sessions, 1);
        assert_eq!(snapshot.sessions_created_total, 2);
        assert_eq!(snapshot.sessions_deduplicated_total, 1);
        assert_eq!(snapshot.sessions_failed_total, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("http_requests_total"));
        assert!(rendered.contains("admission_rejected_total{reason=\"capacity_exceeded\"} 1"));
        assert!(rendered.contains("sessions_retired_total{reason=\"expired\"} 1"));
        assert!(rendered.contains("active_sessions 1"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_session_created();
        assert_eq!(second.snapshot().sessions_created_total, 0);
        Ok(())
    }
}
