use std::future::Future;
use std::sync::Arc;

use lodestone_api::ApiServer;
use lodestone_config::{LogStyle, ServiceConfig};
use lodestone_core::{ContentEngine, SessionRegistry};
use lodestone_engine_stub::{SimulatedEngine, SimulationProfile};
use lodestone_events::EventBus;
use lodestone_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::observer::RegistryMetrics;

/// Build identifier reported in logs and `/health`.
pub const BUILD_ID: &str = match option_env!("LODESTONE_BUILD_ID") {
    Some(id) => id,
    None => env!("CARGO_PKG_VERSION"),
};

/// Dependencies required to bootstrap the Lodestone service.
pub(crate) struct BootstrapDependencies {
    config: ServiceConfig,
    engine: Arc<dyn ContentEngine>,
    events: EventBus,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment for the binary entrypoint.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config = ServiceConfig::from_env().map_err(AppError::config)?;
        let engine = SimulatedEngine::new(SimulationProfile::default());
        Self::with_config(config, Arc::new(engine))
    }

    pub(crate) fn with_config(
        config: ServiceConfig,
        engine: Arc<dyn ContentEngine>,
    ) -> AppResult<Self> {
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            engine,
            events: EventBus::new(),
            telemetry,
        })
    }
}

/// Entry point for the Lodestone boot sequence.
///
/// # Errors
///
/// Returns an error if configuration is invalid, logging cannot be installed,
/// the storage root cannot be created, or the listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    let logging = LoggingConfig {
        level: &dependencies.config.log_level,
        format: log_format(dependencies.config.log_style),
        build_id: BUILD_ID,
    };
    lodestone_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    let _context = GlobalContextGuard::new("lodestone");
    run_app_with(dependencies, shutdown_signal()).await
}

/// Boot sequence over injected dependencies; returns once `shutdown` resolves
/// and every session has been released.
pub(crate) async fn run_app_with<F>(
    dependencies: BootstrapDependencies,
    shutdown: F,
) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let BootstrapDependencies {
        config,
        engine,
        events,
        telemetry,
    } = dependencies;
    info!(
        capacity = config.max_downloads,
        retention_secs = config.cleanup_timeout.as_secs(),
        storage_root = %config.download_path.display(),
        upload = config.enable_upload,
        "Lodestone bootstrap starting"
    );

    tokio::fs::create_dir_all(&config.download_path)
        .await
        .map_err(|err| AppError::storage_root(config.download_path.clone(), err))?;

    let registry = SessionRegistry::with_observer(
        config.registry_config(),
        engine,
        events.clone(),
        Arc::new(RegistryMetrics::new(telemetry.clone())),
    );
    let api = ApiServer::new(registry.clone(), config.progress, telemetry, events);

    let addr = config.socket_addr();
    info!(addr = %addr, "Launching API listener");
    let serve_result = api.serve(addr, shutdown).await;

    let removed = registry.shutdown();
    info!(removed, "sessions released");

    match serve_result {
        Ok(()) => {
            info!("Lodestone stopped");
            Ok(())
        }
        Err(err) => {
            error!(error = %err, "API server exited with error");
            Err(AppError::api_server(err))
        }
    }
}

const fn log_format(style: Option<LogStyle>) -> LogFormat {
    match style {
        Some(LogStyle::Json) => LogFormat::Json,
        Some(LogStyle::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
