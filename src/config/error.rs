//! Configuration Error Types
//!
//! Specific, actionable errors for configuration loading and validation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The layered sources could not be read or deserialized
    #[error("Failed to load configuration from {source_description}: {error}")]
    LoadFailed {
        source_description: String,
        error: String,
    },

    /// Missing required configuration field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid configuration value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },
}

impl ConfigurationError {
    pub fn load_failed(source_description: impl Into<String>, error: impl ToString) -> Self {
        Self::LoadFailed {
            source_description: source_description.into(),
            error: error.to_string(),
        }
    }

    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
