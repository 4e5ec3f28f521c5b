//! Configuration Loader
//!
//! Environment-aware configuration loading. Sources are layered, later ones
//! winning:
//!
//! 1. built-in defaults
//! 2. `{config_dir}/ingestion.toml`
//! 3. `{config_dir}/ingestion.{environment}.toml`
//! 4. `INGESTION__SECTION__KEY` environment variables

use super::error::{ConfigResult, ConfigurationError};
use super::IngestionConfig;
use crate::constants::env_vars;
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const BASE_FILE_STEM: &str = "ingestion";

#[derive(Debug)]
pub struct ConfigManager {
    config: IngestionConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load the layers for `environment` from `config_dir`, or the default
    /// directory when `None`
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            config_directory = %config_directory.display(),
            "Loading ingestion configuration"
        );

        let config = Self::load_layers(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            config_directory = %config_directory.display(),
            polling_interval_ms = config.polling.interval_ms,
            default_mode = %config.selection.default_mode,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    pub fn config(&self) -> &IngestionConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    fn load_layers(config_directory: &Path, environment: &str) -> ConfigResult<IngestionConfig> {
        let base = config_directory.join(format!("{BASE_FILE_STEM}.toml"));
        let overlay = config_directory.join(format!("{BASE_FILE_STEM}.{environment}.toml"));

        debug!(
            base = %base.display(),
            overlay = %overlay.display(),
            "Resolving configuration layers"
        );

        let layered = Config::builder()
            .add_source(File::from(base.clone()).required(false))
            .add_source(File::from(overlay).required(false))
            .add_source(
                Environment::with_prefix(env_vars::CONFIG_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::load_failed(base.display().to_string(), e))?;

        layered
            .try_deserialize::<IngestionConfig>()
            .map_err(|e| ConfigurationError::load_failed(config_directory.display().to_string(), e))
    }

    fn detect_environment() -> String {
        env::var(env_vars::ENVIRONMENT)
            .or_else(|_| env::var(env_vars::ENVIRONMENT_FALLBACK))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    fn default_config_directory() -> PathBuf {
        env::var(env_vars::CONFIG_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}
