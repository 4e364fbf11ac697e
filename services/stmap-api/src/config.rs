//! Service configuration loading.
//!
//! Precedence, lowest first: built-in defaults, the YAML config file,
//! `STMAP_*` environment variables, command line flags.

use std::path::Path;

use anyhow::{Context, Result};
use stmap_core::CoreConfig;

/// Load the pipeline configuration, reading `file` when given.
pub fn load_config(file: Option<&Path>) -> Result<CoreConfig> {
    let base = match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: CoreConfig = serde_yaml::from_str(&text)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        None => CoreConfig::default(),
    };
    Ok(base.with_env())
}

/// Reject configurations the service cannot run with.
pub fn validate(config: &CoreConfig) -> Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;
    if !config.data_path.is_dir() {
        tracing::warn!(
            data_path = %config.data_path.display(),
            "data path does not exist yet; every asset lookup will fail"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stmap.yaml");
        std::fs::write(&path, "data_path: /srv/maps\nstale_after: 60\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        if std::env::var("STMAP_DATA_PATH").is_err() {
            assert_eq!(config.data_path, Path::new("/srv/maps"));
        }
        if std::env::var("STMAP_CACHE_STALE_SECS").is_err() {
            assert_eq!(config.stale_after, Duration::from_secs(60));
        }
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_config(Some(Path::new("/nonexistent/stmap.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_bad_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stmap.yaml");
        std::fs::write(&path, "default_timeout: soon\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
