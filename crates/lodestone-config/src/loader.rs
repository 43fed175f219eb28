//! Environment variable parsing.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lodestone_core::ProgressBounds;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{LogStyle, ServiceConfig};

/// Concurrent session capacity.
pub const ENV_MAX_DOWNLOADS: &str = "MAX_DOWNLOADS";
/// Retention after completion, in seconds.
pub const ENV_CLEANUP_TIMEOUT: &str = "CLEANUP_TIMEOUT";
/// Lower progress clamp.
pub const ENV_MIN_PERCENTAGE: &str = "MIN_PERCENTAGE";
/// Upper progress clamp.
pub const ENV_MAX_PERCENTAGE: &str = "MAX_PERCENTAGE";
/// Storage root.
pub const ENV_DOWNLOAD_PATH: &str = "DOWNLOAD_PATH";
/// Upload toggle.
pub const ENV_ENABLE_UPLOAD: &str = "ENABLE_UPLOAD";
/// Bind address.
pub const ENV_HOST: &str = "HOST";
/// Bind port.
pub const ENV_PORT: &str = "PORT";
/// Default log filter.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Log output style.
pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";

impl ServiceConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for any unparsable or out-of-range value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary lookup; unset and blank
    /// variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for any unparsable or out-of-range value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let max_downloads = match read(ENV_MAX_DOWNLOADS) {
            Some(raw) => positive::<usize>(ENV_MAX_DOWNLOADS, &raw)?,
            None => defaults.max_downloads,
        };
        let cleanup_timeout = match read(ENV_CLEANUP_TIMEOUT) {
            Some(raw) => Duration::from_secs(positive::<u64>(ENV_CLEANUP_TIMEOUT, &raw)?),
            None => defaults.cleanup_timeout,
        };
        let low = match read(ENV_MIN_PERCENTAGE) {
            Some(raw) => parse::<f64>(ENV_MIN_PERCENTAGE, &raw)?,
            None => defaults.progress.low(),
        };
        let high = match read(ENV_MAX_PERCENTAGE) {
            Some(raw) => parse::<f64>(ENV_MAX_PERCENTAGE, &raw)?,
            None => defaults.progress.high(),
        };
        let progress = ProgressBounds::new(low, high)
            .map_err(|source| ConfigError::InvalidProgressBounds { source })?;
        let download_path = read(ENV_DOWNLOAD_PATH).map_or(defaults.download_path, PathBuf::from);
        let enable_upload = match read(ENV_ENABLE_UPLOAD) {
            Some(raw) => parse_bool(ENV_ENABLE_UPLOAD, &raw)?,
            None => defaults.enable_upload,
        };
        let host = match read(ENV_HOST) {
            Some(raw) => parse::<IpAddr>(ENV_HOST, &raw)?,
            None => defaults.host,
        };
        let port = match read(ENV_PORT) {
            Some(raw) => positive::<u16>(ENV_PORT, &raw)?,
            None => defaults.port,
        };
        let log_level = read(ENV_LOG_LEVEL).unwrap_or(defaults.log_level);
        let log_style = match read(ENV_LOG_FORMAT) {
            Some(raw) => Some(parse_log_style(&raw)?),
            None => defaults.log_style,
        };

        Ok(Self {
            max_downloads,
            cleanup_timeout,
            progress,
            download_path,
            enable_upload,
            host,
            port,
            log_level,
            log_style,
        })
    }
}

fn parse<T: FromStr>(field: &'static str, raw: &str) -> ConfigResult<T> {
    raw.parse()
        .map_err(|_| ConfigError::invalid(field, raw, "unparsable"))
}

fn positive<T>(field: &'static str, raw: &str) -> ConfigResult<T>
where
    T: FromStr + Default + PartialEq,
{
    let value = parse::<T>(field, raw)?;
    if value == T::default() {
        return Err(ConfigError::invalid(field, raw, "must be greater than zero"));
    }
    Ok(value)
}

fn parse_bool(field: &'static str, raw: &str) -> ConfigResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(field, raw, "expected a boolean")),
    }
}

fn parse_log_style(raw: &str) -> ConfigResult<LogStyle> {
    match raw.to_ascii_lowercase().as_str() {
        "json" => Ok(LogStyle::Json),
        "pretty" | "text" => Ok(LogStyle::Pretty),
        _ => Err(ConfigError::invalid(
            ENV_LOG_FORMAT,
            raw,
            "expected json or pretty",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::{Ipv4Addr, SocketAddr};

    fn load(pairs: &[(&str, &str)]) -> ConfigResult<ServiceConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).expect("defaults");
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.max_downloads, 10);
        assert_eq!(config.cleanup_timeout, Duration::from_secs(3_600));
        assert_eq!(config.download_path, PathBuf::from("/tmp/downloads"));
        assert_eq!(
            config.socket_addr(),
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 3000))
        );
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_style, None);
    }

    #[test]
    fn blank_values_fall_back_to_defaults() {
        let config = load(&[(ENV_MAX_DOWNLOADS, "  "), (ENV_PORT, "")]).expect("blank");
        assert_eq!(config.max_downloads, 10);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            (ENV_MAX_DOWNLOADS, "3"),
            (ENV_CLEANUP_TIMEOUT, "120"),
            (ENV_MIN_PERCENTAGE, "1.5"),
            (ENV_MAX_PERCENTAGE, "99"),
            (ENV_DOWNLOAD_PATH, "/srv/lodestone"),
            (ENV_ENABLE_UPLOAD, "TRUE"),
            (ENV_HOST, "127.0.0.1"),
            (ENV_PORT, "8080"),
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FORMAT, "pretty"),
        ])
        .expect("overrides");

        let registry = config.registry_config();
        assert_eq!(registry.capacity, 3);
        assert_eq!(registry.retention, Duration::from_secs(120));
        assert_eq!(registry.storage_root, PathBuf::from("/srv/lodestone"));
        assert!(registry.enable_upload);
        assert!((config.progress.low() - 1.5).abs() < f64::EPSILON);
        assert!((config.progress.high() - 99.0).abs() < f64::EPSILON);
        assert_eq!(config.socket_addr(), SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_style, Some(LogStyle::Pretty));
    }

    #[test]
    fn invalid_values_name_the_field() {
        let cases = [
            (ENV_MAX_DOWNLOADS, "0", "must be greater than zero"),
            (ENV_MAX_DOWNLOADS, "ten", "unparsable"),
            (ENV_CLEANUP_TIMEOUT, "-5", "unparsable"),
            (ENV_PORT, "0", "must be greater than zero"),
            (ENV_PORT, "70000", "unparsable"),
            (ENV_HOST, "localhost:3000", "unparsable"),
            (ENV_ENABLE_UPLOAD, "maybe", "expected a boolean"),
            (ENV_LOG_FORMAT, "xml", "expected json or pretty"),
        ];
        for (key, value, expected) in cases {
            match load(&[(key, value)]) {
                Err(ConfigError::InvalidField {
                    field,
                    value: got,
                    reason,
                }) => {
                    assert_eq!(field, key);
                    assert_eq!(got, value);
                    assert_eq!(reason, expected, "{key}={value}");
                }
                other => panic!("{key}={value} produced {other:?}"),
            }
        }
    }

    #[test]
    fn inverted_progress_bounds_are_rejected() {
        let err = load(&[(ENV_MIN_PERCENTAGE, "80"), (ENV_MAX_PERCENTAGE, "20")])
            .expect_err("inverted bounds");
        assert!(matches!(err, ConfigError::InvalidProgressBounds { .. }));
        assert!(std::error::Error::source(&err).is_some());

        let err = load(&[(ENV_MAX_PERCENTAGE, "inf")]).expect_err("infinite bound");
        assert!(matches!(err, ConfigError::InvalidProgressBounds { .. }));
    }
}
