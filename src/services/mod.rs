//! # Ingestion Services
//!
//! The external operations the orchestrator depends on. The orchestrator
//! receives an `Arc<dyn IngestionServices>` at construction and never reaches
//! for a backend any other way.
//!
//! Every operation reports failure through [`ServiceError`], which the state
//! machines normalise into [`ErrorEntry`] values at the boundary where the
//! call was made.

pub mod local;

use crate::constants::error_codes;
use crate::models::{
    ErrorEntry, FileSet, FlowKind, FormData, Geometry, JobHandle, JobProgress, ValidationResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use local::LocalIngestionServices;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    #[error("Invalid source file: {message}")]
    InvalidSourceFile { message: String },
    #[error("File not found: {path}")]
    FileNotFound { path: String },
    #[error("Request failed: {message}")]
    Api { message: String, response: Value },
    #[error("Request timed out: {operation}")]
    Timeout { operation: String },
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    pub fn api(message: impl Into<String>, response: Value) -> Self {
        Self::Api {
            message: message.into(),
            response,
        }
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSourceFile {
            message: message.into(),
        }
    }

    /// Normalise into an [`ErrorEntry`].
    ///
    /// Errors carrying a response payload become `api` entries, everything
    /// else is a `logic` entry. `operation_code` is used unless the error
    /// has a more specific code of its own.
    pub fn to_error_entry(&self, operation_code: &str) -> ErrorEntry {
        match self {
            Self::InvalidSourceFile { message } => {
                ErrorEntry::logic(error_codes::INVALID_SOURCE_FILE, message.clone())
            }
            Self::FileNotFound { path } => {
                ErrorEntry::logic(error_codes::MISSING_FILE, self.to_string()).with_field(path.clone())
            }
            Self::Api { message, response } => {
                ErrorEntry::api(operation_code, message.clone(), response.clone())
            }
            Self::Timeout { .. } | Self::Unavailable(_) => {
                ErrorEntry::logic(operation_code, self.to_string())
            }
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOutline {
    pub outline_geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub file_set: FileSet,
    pub resolution_value: Option<f64>,
    pub form_data: FormData,
    pub flow_kind: FlowKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub job_id: String,
}

/// Everything needed to resume a previously submitted job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredJob {
    pub flow_kind: FlowKind,
    pub file_set: FileSet,
    pub form_data: FormData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_value: Option<f64>,
    pub job: JobHandle,
}

/// Backend operations consumed by the ingestion workflow
#[async_trait]
pub trait IngestionServices: Send + Sync {
    /// Validate the primary data file at `path`
    async fn validate_primary_file(&self, path: &str) -> ServiceResult<ValidationResult>;

    /// Read the footprint geometry of a product outline shape
    async fn fetch_product_outline(&self, path: &str) -> ServiceResult<ProductOutline>;

    /// Succeeds iff the shape metadata file exists
    async fn check_shape_metadata_exists(&self, path: &str) -> ServiceResult<()>;

    async fn fetch_directory_listing(&self, directory: &str) -> ServiceResult<Vec<DirectoryEntry>>;

    /// Id of an in-flight job for `product_id`, if there is one
    async fn fetch_active_job_for_product(&self, product_id: &str)
        -> ServiceResult<Option<String>>;

    async fn submit_ingestion_job(
        &self,
        request: SubmissionRequest,
    ) -> ServiceResult<SubmissionReceipt>;

    /// Fetch the current progress of a job once
    async fn poll_job_once(&self, job_id: &str) -> ServiceResult<JobProgress>;

    async fn restore_job_by_id(&self, job_id: &str) -> ServiceResult<RestoredJob>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ErrorSource;

    #[test]
    fn test_api_errors_normalise_to_api_source() {
        let err = ServiceError::api("gateway exploded", serde_json::json!({"status": 502}));
        let entry = err.to_error_entry(error_codes::JOB_SUBMISSION);
        assert_eq!(entry.source, ErrorSource::Api);
        assert_eq!(entry.code, error_codes::JOB_SUBMISSION);
        assert_eq!(entry.response, Some(serde_json::json!({"status": 502})));
    }

    #[test]
    fn test_payloadless_errors_normalise_to_logic_source() {
        let entry = ServiceError::invalid_source("bad gpkg").to_error_entry(error_codes::JOB_POLLING);
        assert_eq!(entry.source, ErrorSource::Logic);
        assert_eq!(entry.code, error_codes::INVALID_SOURCE_FILE);
        assert_eq!(entry.message, "bad gpkg");

        let entry = ServiceError::Timeout {
            operation: "poll".into(),
        }
        .to_error_entry(error_codes::JOB_POLLING);
        assert_eq!(entry.source, ErrorSource::Logic);
        assert_eq!(entry.code, error_codes::JOB_POLLING);

        let entry = ServiceError::file_not_found("/x/Product.shp")
            .to_error_entry(error_codes::PRODUCT_OUTLINE);
        assert_eq!(entry.code, error_codes::MISSING_FILE);
        assert_eq!(entry.field.as_deref(), Some("/x/Product.shp"));
    }
}
