//! Subscriber installation and the process build identifier.

use once_cell::sync::OnceCell;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Filter used when neither `RUST_LOG` nor the configured level parses.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Directives appended to the configured level so transport chatter stays out
/// of session logs unless `RUST_LOG` asks for it.
const QUIET_DEPENDENCIES: &str = "hyper=warn,h2=warn,tower_http=info";

static BUILD_ID: OnceCell<String> = OnceCell::new();

/// What to install as the global subscriber.
#[derive(Debug, Clone, Copy)]
pub struct LoggingConfig<'a> {
    /// Level or filter directives, e.g. `info` or `lodestone_core=debug`.
    pub level: &'a str,
    /// Output encoding.
    pub format: LogFormat,
    /// Identifier reported by `/health` and the global span.
    pub build_id: &'a str,
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, fields flattened, current span attached.
    Json,
    /// Human-readable lines.
    Pretty,
}

impl LogFormat {
    /// Pretty in debug builds, JSON otherwise.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Record the build id and install the global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`.
///
/// # Errors
///
/// [`TelemetryError::SubscriberInstall`] when a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<()> {
    let _ = BUILD_ID.set(config.build_id.to_string());
    let filter = env_filter(config.level);
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })
}

/// Build identifier recorded by [`init_logging`], or `dev` before logging is installed.
#[must_use]
pub fn build_id() -> &'static str {
    BUILD_ID.get().map_or("dev", String::as_str)
}

fn env_filter(level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::try_new(format!("{level},{QUIET_DEPENDENCIES}"))
        .unwrap_or_else(|_| EnvFilter::new(format!("{DEFAULT_LOG_LEVEL},{QUIET_DEPENDENCIES}")))
}
