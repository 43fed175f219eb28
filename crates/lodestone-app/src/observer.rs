//! Prometheus reporting for registry activity.

use lodestone_core::{RegistryObserver, RetireReason};
use lodestone_telemetry::Metrics;

/// Forwards registry hooks to the shared [`Metrics`] registry.
#[derive(Clone)]
pub struct RegistryMetrics {
    metrics: Metrics,
}

impl RegistryMetrics {
    /// Wrap the process metrics handle.
    #[must_use]
    pub const fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl RegistryObserver for RegistryMetrics {
    fn session_created(&self) {
        self.metrics.inc_session_created();
    }

    fn session_deduplicated(&self) {
        self.metrics.inc_session_deduplicated();
    }

    fn admission_rejected(&self, reason: &'static str) {
        self.metrics.inc_admission_rejected(reason);
    }

    fn session_failed(&self) {
        self.metrics.inc_session_failed();
    }

    fn session_retired(&self, reason: RetireReason) {
        self.metrics.inc_session_retired(reason.as_str());
    }

    fn active_sessions(&self, count: usize) {
        self.metrics
            .set_active_sessions(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use lodestone_core::{RegistryConfig, SessionRegistry};
    use lodestone_engine_stub::StubEngine;
    use lodestone_events::EventBus;

    const MAGNET: &str = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567";

    #[tokio::test]
    async fn registry_activity_reaches_prometheus() -> anyhow::Result<()> {
        let metrics = Metrics::new()?;
        let config = RegistryConfig {
            capacity: 1,
            ..RegistryConfig::default()
        };
        let registry = SessionRegistry::with_observer(
            config,
            Arc::new(StubEngine::new()),
            EventBus::with_capacity(8),
            Arc::new(RegistryMetrics::new(metrics.clone())),
        );

        let (session, _) = registry.create_session(MAGNET)?;
        registry.create_session(MAGNET)?;
        let rejected =
            registry.create_session("magnet:?xt=urn:btih:ffffffffffffffffffffffffffffffffffffffff");
        assert!(rejected.is_err());
        registry.cancel_session(session.id)?;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sessions_created_total, 1);
        assert_eq!(snapshot.sessions_deduplicated_total, 1);
        assert_eq!(snapshot.active_sessions, 0);
        let rendered = metrics.render()?;
        assert!(rendered.contains("admission_rejected_total{reason=\"capacity_exceeded\"} 1"));
        assert!(rendered.contains("sessions_retired_total{reason=\"cancelled\"} 1"));
        Ok(())
    }
}
