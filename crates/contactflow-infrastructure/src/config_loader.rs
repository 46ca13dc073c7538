//! TOML configuration loader.
//!
//! Resolves the configuration file from, in order: an explicit path, the
//! `CONTACTFLOW_CONFIG` environment variable, `<config dir>/contactflow/config.toml`.
//! A missing or empty file yields the defaults.

use contactflow_core::{FlowError, OrchestratorConfig, Result};
use std::fs::{self, File};
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV_VAR: &str = "CONTACTFLOW_CONFIG";
const APP_DIR: &str = "contactflow";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader bound to `explicit`, or to the resolved default location.
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            path: explicit.or_else(Self::default_path),
        }
    }

    /// `$CONTACTFLOW_CONFIG`, else the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(from_env) = std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(from_env));
        }
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads, fills defaults and validates.
    pub fn load(&self) -> Result<OrchestratorConfig> {
        let Some(path) = self.path.as_deref() else {
            tracing::debug!("No configuration path resolved, using defaults");
            return Ok(OrchestratorConfig::default());
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Configuration file absent, using defaults");
            return Ok(OrchestratorConfig::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            FlowError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: OrchestratorConfig = if content.trim().is_empty() {
            OrchestratorConfig::default()
        } else {
            toml::from_str(&content)?
        };
        config.validate()?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Writes `config` through a temporary file and an atomic rename.
    pub fn save(&self, config: &OrchestratorConfig) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| FlowError::config("No configuration path to save to"))?;
        config.validate()?;

        let parent = path
            .parent()
            .ok_or_else(|| FlowError::config(format!("{} has no parent directory", path.display())))?;
        let file_name = path
            .file_name()
            .ok_or_else(|| FlowError::config(format!("{} has no file name", path.display())))?;
        let io_err = |e: std::io::Error| FlowError::config(format!("Failed to write {}: {}", path.display(), e));

        fs::create_dir_all(parent).map_err(io_err)?;
        let body = toml::to_string_pretty(config)?;
        let tmp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));
        let mut tmp = File::create(&tmp_path).map_err(io_err)?;
        tmp.write_all(body.as_bytes()).map_err(io_err)?;
        tmp.sync_all().map_err(io_err)?;
        drop(tmp);
        fs::rename(&tmp_path, path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contactflow_core::config::{ManualReviewPolicy, WritePolicy};
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(Some(dir.path().join("nope.toml")));
        assert_eq!(loader.load().unwrap(), OrchestratorConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "session_ttl_secs = 600\nmanual_review_policy = \"auto_suffix\"\nwrite_policy = \"compare_and_swap\"\n",
        )
        .unwrap();

        let config = ConfigLoader::new(Some(path)).load().unwrap();
        assert_eq!(config.session_ttl_secs, 600);
        assert_eq!(config.manual_review_policy, ManualReviewPolicy::AutoSuffix);
        assert_eq!(config.write_policy, WritePolicy::CompareAndSwap);
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_out_of_bounds_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_batch_size = 500\n").unwrap();
        let err = ConfigLoader::new(Some(path)).load().unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let loader = ConfigLoader::new(Some(dir.path().join("nested").join("config.toml")));
        let config = OrchestratorConfig {
            max_retries: 5,
            ..Default::default()
        };
        loader.save(&config).unwrap();
        assert_eq!(loader.load().unwrap(), config);
    }
}
