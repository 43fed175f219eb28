//! Typed service configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use lodestone_core::registry::{DEFAULT_CAPACITY, DEFAULT_RETENTION, DEFAULT_STORAGE_ROOT};
use lodestone_core::{ProgressBounds, RegistryConfig};

/// Default bind port.
pub const DEFAULT_PORT: u16 = 3000;
/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Requested log output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStyle {
    /// One JSON object per line.
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

/// Fully validated service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Maximum number of in-flight sessions.
    pub max_downloads: usize,
    /// Retention of completed sessions.
    pub cleanup_timeout: Duration,
    /// Clamp applied to reported progress.
    pub progress: ProgressBounds,
    /// Storage root for session content.
    pub download_path: PathBuf,
    /// Whether engines may upload to peers.
    pub enable_upload: bool,
    /// Bind address.
    pub host: IpAddr,
    /// Bind port.
    pub port: u16,
    /// Default log filter directive.
    pub log_level: String,
    /// Log style; `None` lets the telemetry layer pick one for the build.
    pub log_style: Option<LogStyle>,
}

impl ServiceConfig {
    /// Address the HTTP listener binds to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Registry settings derived from this configuration.
    #[must_use]
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            capacity: self.max_downloads,
            retention: self.cleanup_timeout,
            storage_root: self.download_path.clone(),
            enable_upload: self.enable_upload,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_downloads: DEFAULT_CAPACITY,
            cleanup_timeout: DEFAULT_RETENTION,
            progress: ProgressBounds::default(),
            download_path: PathBuf::from(DEFAULT_STORAGE_ROOT),
            enable_upload: false,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_style: None,
        }
    }
}
