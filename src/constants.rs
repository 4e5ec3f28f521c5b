//! # Constants
//!
//! Error codes surfaced to the presentation layer, job status groups and the
//! environment variables the crate reads.

/// Error codes carried by [`crate::models::ErrorEntry::code`].
pub mod error_codes {
    pub const INVALID_SOURCE_FILE: &str = "ingestion.error.invalid-source-file";
    pub const VALIDATION_REQUEST: &str = "ingestion.error.validation-request";
    pub const MISSING_FILE: &str = "ingestion.error.missing-file";
    pub const PRIMARY_FILE_REQUIRED: &str = "ingestion.error.primary-file-required";
    pub const PRODUCT_OUTLINE: &str = "ingestion.error.product-outline";
    pub const SHAPE_METADATA: &str = "ingestion.error.shape-metadata";
    pub const DIRECTORY_LISTING: &str = "ingestion.error.directory-listing";
    pub const ACTIVE_JOB_LOOKUP: &str = "ingestion.error.active-job";
    pub const JOB_SUBMISSION: &str = "ingestion.error.job-submission";
    pub const JOB_POLLING: &str = "ingestion.error.job-polling";
    pub const JOB_RESTORE: &str = "ingestion.error.job-restore";
}

/// Job statuses grouped by whether polling should continue.
pub mod status_groups {
    use crate::models::JobStatus;

    /// Statuses that keep the polling loop alive.
    pub const TRANSIENT: [JobStatus; 3] = [
        JobStatus::Pending,
        JobStatus::InProgress,
        JobStatus::Suspended,
    ];
}

/// Environment variables consulted at startup.
pub mod env_vars {
    pub const ENVIRONMENT: &str = "INGESTION_ENV";
    pub const ENVIRONMENT_FALLBACK: &str = "APP_ENV";
    pub const LOG_FORMAT: &str = "INGESTION_LOG_FORMAT";
    pub const CONFIG_DIR: &str = "INGESTION_CONFIG_DIR";
    /// Prefix for `INGESTION__SECTION__KEY` overrides.
    pub const CONFIG_PREFIX: &str = "INGESTION";
}

/// Default human-readable labels of the three file slots.
pub mod labels {
    pub const PRIMARY_DATA: &str = "Primary data";
    pub const PRODUCT_OUTLINE: &str = "Product outline";
    pub const SHAPE_METADATA: &str = "Shape metadata";
}

/// Form data key the local backend reads the product id from.
pub const PRODUCT_ID_FIELD: &str = "productId";
