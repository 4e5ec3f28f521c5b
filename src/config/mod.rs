//! # Ingestion Configuration
//!
//! Typed configuration for the ingestion workflow. Every section has
//! defaults, so an empty configuration is valid; files and environment
//! variables only override what they name.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use raster_ingestion::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let interval = manager.config().polling.interval();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::models::{FileLabels, SelectionMode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/ingestion.toml`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Job polling loop settings
    pub polling: PollingConfig,

    /// Actor channel sizing
    pub channels: ChannelConfig,

    /// File selection defaults and automatic discovery
    pub selection: SelectionConfig,

    /// Local filesystem backend used by the CLI
    pub local: LocalBackendConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Fixed delay spent in `jobPollingWait` between two polls
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 2000 }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Capacity of the orchestrator's external event inbox
    pub event_buffer_size: usize,
    /// Capacity of the transition broadcast channel
    pub transition_event_capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 64,
            transition_event_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionConfig {
    pub default_mode: SelectionMode,
    pub labels: FileLabels,
    pub auto_discovery: AutoDiscoveryConfig,
}

/// Where automatic discovery looks for the shape files.
///
/// `shapes_directory` is resolved relative to the directory holding the
/// primary data file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoDiscoveryConfig {
    pub shapes_directory: String,
    pub product_outline_file: String,
    pub shape_metadata_file: String,
}

impl Default for AutoDiscoveryConfig {
    fn default() -> Self {
        Self {
            shapes_directory: "../Shapes".to_string(),
            product_outline_file: "Product.shp".to_string(),
            shape_metadata_file: "ShapeMetadata.shp".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalBackendConfig {
    /// Directory all local paths are resolved against
    pub root: PathBuf,
    /// Percentage a local job advances on every poll
    pub progress_step: u8,
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            progress_step: 25,
        }
    }
}

impl IngestionConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.polling.interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "polling.interval_ms",
                "0",
                "polling interval must be greater than 0",
            ));
        }

        if self.channels.event_buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "channels.event_buffer_size",
                "0",
                "buffer size must be greater than 0",
            ));
        }

        if self.channels.transition_event_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "channels.transition_event_capacity",
                "0",
                "capacity must be greater than 0",
            ));
        }

        let labels = &self.selection.labels;
        for (field, value) in [
            ("selection.labels.primary_data", &labels.primary_data),
            ("selection.labels.product_outline", &labels.product_outline),
            ("selection.labels.shape_metadata", &labels.shape_metadata),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    field,
                    "selection configuration",
                ));
            }
        }

        let discovery = &self.selection.auto_discovery;
        for (field, value) in [
            (
                "selection.auto_discovery.product_outline_file",
                &discovery.product_outline_file,
            ),
            (
                "selection.auto_discovery.shape_metadata_file",
                &discovery.shape_metadata_file,
            ),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    field,
                    "auto discovery configuration",
                ));
            }
        }

        if self.local.progress_step == 0 || self.local.progress_step > 100 {
            return Err(ConfigurationError::invalid_value(
                "local.progress_step",
                self.local.progress_step.to_string(),
                "progress step must be between 1 and 100",
            ));
        }

        Ok(())
    }
}
