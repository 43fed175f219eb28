//! Errors that stop the service from booting or end it early.
//!
//! Messages are constant; the failing step and its cause travel as fields.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Environment configuration was rejected.
    #[error("invalid service configuration")]
    Config {
        /// Source configuration error.
        #[source]
        source: lodestone_config::ConfigError,
    },
    /// Logging or metrics could not be set up.
    #[error("telemetry setup failed")]
    Telemetry {
        /// Setup step that failed.
        operation: &'static str,
        /// Source telemetry error.
        #[source]
        source: lodestone_telemetry::TelemetryError,
    },
    /// The download directory could not be prepared.
    #[error("storage root is not usable")]
    StorageRoot {
        /// Directory that was being created.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// The HTTP listener failed.
    #[error("api server failed")]
    ApiServer {
        /// Source API server error.
        #[source]
        source: lodestone_api::ApiServerError,
    },
}

impl AppError {
    pub(crate) const fn config(source: lodestone_config::ConfigError) -> Self {
        Self::Config { source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: lodestone_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn storage_root(path: PathBuf, source: io::Error) -> Self {
        Self::StorageRoot { path, source }
    }

    pub(crate) const fn api_server(source: lodestone_api::ApiServerError) -> Self {
        Self::ApiServer { source }
    }
}
