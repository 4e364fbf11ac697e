//! Configuration for the query pipeline.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Configuration shared by the pipeline and the service wrapping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Root of the asset tree.
    pub data_path: PathBuf,

    /// Ceiling for a single request, after which it is abandoned.
    #[serde(with = "secs")]
    pub default_timeout: Duration,

    /// How long a cached response stays fresh.
    #[serde(with = "secs")]
    pub stale_after: Duration,

    /// Memory budget for cached responses.
    pub cache_capacity_bytes: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("/data/maps"),
            default_timeout: Duration::from_secs(5),
            stale_after: Duration::from_secs(1_296_000),
            cache_capacity_bytes: 256 * 1024 * 1024,
        }
    }
}

/// Configuration values the pipeline cannot run with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("data_path must not be empty")]
    EmptyDataPath,

    #[error("default_timeout must be > 0")]
    ZeroTimeout,
}

impl CoreConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    /// Apply any `STMAP_*` environment overrides to `self`.
    pub fn with_env(self) -> Self {
        self.with_vars(|name| std::env::var(name).ok())
    }

    /// Apply `STMAP_*` overrides read through `lookup`.
    ///
    /// Values that do not parse are logged and leave the setting unchanged.
    pub fn with_vars(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = self;

        if let Some(val) = lookup("STMAP_DATA_PATH") {
            config.data_path = PathBuf::from(val);
        }

        if let Some(secs) = parse_var(&lookup, "STMAP_REQUEST_TIMEOUT_SECS") {
            config.default_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_var(&lookup, "STMAP_CACHE_STALE_SECS") {
            config.stale_after = Duration::from_secs(secs);
        }

        if let Some(mb) = parse_var::<usize>(&lookup, "STMAP_CACHE_MB") {
            match mb.checked_mul(1024 * 1024) {
                Some(bytes) => config.cache_capacity_bytes = bytes,
                None => {
                    warn!(var = "STMAP_CACHE_MB", value = mb, "cache size overflows, ignoring")
                }
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataPath);
        }

        if self.default_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let val = lookup(name)?;
    match val.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(
                var = name,
                value = %val,
                error = %e,
                "ignoring malformed environment override"
            );
            None
        }
    }
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.data_path, PathBuf::from("/data/maps"));
        assert_eq!(config.default_timeout, Duration::from_secs(5));
        assert_eq!(config.stale_after.as_secs(), 15 * 24 * 3600);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = CoreConfig {
            default_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTimeout));
    }

    #[test]
    fn test_yaml_uses_seconds() {
        let config: CoreConfig =
            serde_yaml::from_str("data_path: /srv/maps\ndefault_timeout: 9\n").unwrap();
        assert_eq!(config.data_path, PathBuf::from("/srv/maps"));
        assert_eq!(config.default_timeout, Duration::from_secs(9));
        assert_eq!(config.stale_after, CoreConfig::default().stale_after);
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let config = CoreConfig::default().with_vars(vars(&[
            ("STMAP_DATA_PATH", "/srv/maps"),
            ("STMAP_REQUEST_TIMEOUT_SECS", "30"),
            ("STMAP_CACHE_STALE_SECS", " 60 "),
            ("STMAP_CACHE_MB", "16"),
        ]));
        assert_eq!(config.data_path, PathBuf::from("/srv/maps"));
        assert_eq!(config.default_timeout, Duration::from_secs(30));
        assert_eq!(config.stale_after, Duration::from_secs(60));
        assert_eq!(config.cache_capacity_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_malformed_timeout_is_ignored() {
        let config =
            CoreConfig::default().with_vars(vars(&[("STMAP_REQUEST_TIMEOUT_SECS", "soon")]));
        assert_eq!(config.default_timeout, CoreConfig::default().default_timeout);
    }

    #[test]
    fn test_malformed_stale_is_ignored() {
        let config = CoreConfig::default().with_vars(vars(&[("STMAP_CACHE_STALE_SECS", "-5")]));
        assert_eq!(config.stale_after, CoreConfig::default().stale_after);
    }

    #[test]
    fn test_malformed_cache_size_is_ignored() {
        let config = CoreConfig::default().with_vars(vars(&[("STMAP_CACHE_MB", "lots")]));
        assert_eq!(config.cache_capacity_bytes, CoreConfig::default().cache_capacity_bytes);
    }

    #[test]
    fn test_overflowing_cache_size_is_ignored() {
        let huge = usize::MAX.to_string();
        let config = CoreConfig::default().with_vars(vars(&[("STMAP_CACHE_MB", huge.as_str())]));
        assert_eq!(config.cache_capacity_bytes, CoreConfig::default().cache_capacity_bytes);
    }
}
