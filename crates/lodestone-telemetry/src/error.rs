//! Error types for telemetry operations.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Step of collector setup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorStage {
    /// Constructing the collector from its options.
    Build,
    /// Adding the collector to the registry.
    Register,
}

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A Prometheus collector could not be set up.
    #[error("failed to set up metrics collector")]
    Collector {
        /// Metric name tied to the failure.
        name: &'static str,
        /// Setup step that failed.
        stage: CollectorStage,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Rendering the exposition text failed.
    #[error("failed to render metrics")]
    Render {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// Rendered exposition text was not UTF-8.
    #[error("rendered metrics were not valid utf-8")]
    RenderEncoding {
        /// Underlying conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) const fn build(name: &'static str, source: PrometheusError) -> Self {
        Self::Collector {
            name,
            stage: CollectorStage::Build,
            source,
        }
    }

    pub(crate) const fn register(name: &'static str, source: PrometheusError) -> Self {
        Self::Collector {
            name,
            stage: CollectorStage::Register,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn collector_errors_name_the_metric_and_stage() {
        let err = TelemetryError::register("sessions_created_total", PrometheusError::AlreadyReg);
        assert_eq!(err.to_string(), "failed to set up metrics collector");
        assert!(err.source().is_some());
        assert!(matches!(
            err,
            TelemetryError::Collector {
                name: "sessions_created_total",
                stage: CollectorStage::Register,
                ..
            }
        ));
    }

    #[test]
    fn render_errors_keep_their_source() {
        let utf8 = String::from_utf8(vec![0, 159]).expect_err("invalid utf-8");
        let err = TelemetryError::RenderEncoding { source: utf8 };
        assert_eq!(err.to_string(), "rendered metrics were not valid utf-8");
        assert!(err.source().is_some());

        let err = TelemetryError::Render {
            source: PrometheusError::Msg("encode".to_string()),
        };
        assert_eq!(err.to_string(), "failed to render metrics");
    }
}
