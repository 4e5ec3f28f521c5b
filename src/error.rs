//! Crate-level error types.

use crate::config::ConfigurationError;
use crate::services::ServiceError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
    #[error("Channel closed: {actor} is no longer running")]
    ChannelClosed { actor: &'static str },
    #[error("Timed out after {waited:?} waiting for orchestrator state")]
    Timeout { waited: Duration },
    #[error("State transition error: {0}")]
    StateTransition(String),
}

impl IngestionError {
    pub fn channel_closed(actor: &'static str) -> Self {
        Self::ChannelClosed { actor }
    }
}

pub type Result<T> = std::result::Result<T, IngestionError>;
