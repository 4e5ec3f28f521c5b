//! Scripted service backend and helpers shared by the integration tests.
//!
//! Every response is scripted up front; anything not scripted fails the way
//! a real backend would when the file or job does not exist.

#![allow(dead_code)]

use async_trait::async_trait;
use raster_ingestion::config::IngestionConfig;
use raster_ingestion::models::{
    build_found_descriptor, FileSet, FlowKind, FormData, Geometry, JobHandle, JobProgress,
    JobStatus, ValidationResult,
};
use raster_ingestion::services::{
    DirectoryEntry, IngestionServices, ProductOutline, RestoredJob, ServiceError, ServiceResult,
    SubmissionReceipt, SubmissionRequest,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(5);

pub const PRIMARY: &str = "/in/GeoPkg/area.gpkg";
pub const SHAPES_DIR: &str = "/in/Shapes";
pub const OUTLINE: &str = "/in/Shapes/Product.shp";
pub const METADATA: &str = "/in/Shapes/ShapeMetadata.shp";

/// A call received by the scripted backend
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCall {
    ValidatePrimary(String),
    FetchOutline(String),
    CheckMetadata(String),
    ListDirectory(String),
    FetchActiveJob(String),
    Submit(SubmissionRequest),
    Poll(String),
    Restore(String),
}

#[derive(Debug, Default)]
struct Script {
    validations: HashMap<String, ServiceResult<ValidationResult>>,
    outlines: HashMap<String, ServiceResult<ProductOutline>>,
    metadata: HashMap<String, ServiceResult<()>>,
    listings: HashMap<String, ServiceResult<Vec<DirectoryEntry>>>,
    active_jobs: HashMap<String, String>,
    submission: Option<ServiceResult<SubmissionReceipt>>,
    polls: VecDeque<ServiceResult<JobProgress>>,
    restores: HashMap<String, ServiceResult<RestoredJob>>,
    poll_delay: Option<Duration>,
    calls: Vec<ServiceCall>,
}

/// Mock backend whose responses are scripted per path or job id
#[derive(Debug, Default, Clone)]
pub struct ScriptedServices {
    script: Arc<Mutex<Script>>,
}

impl ScriptedServices {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    pub fn with_valid_primary(self, path: &str) -> Self {
        let result = ValidationResult {
            extent_polygon: Some(square(34.0, 31.0, 1.0)),
            resolution: Some(0.5),
            ..ValidationResult::valid()
        };
        self.script().validations.insert(path.into(), Ok(result));
        self
    }

    pub fn with_invalid_primary(self, path: &str, message: &str) -> Self {
        self.script()
            .validations
            .insert(path.into(), Ok(ValidationResult::invalid(message)));
        self
    }

    pub fn with_validation_error(self, path: &str, error: ServiceError) -> Self {
        self.script().validations.insert(path.into(), Err(error));
        self
    }

    pub fn with_outline(self, path: &str, geometry: Geometry) -> Self {
        self.script().outlines.insert(
            path.into(),
            Ok(ProductOutline {
                outline_geometry: geometry,
            }),
        );
        self
    }

    pub fn with_metadata(self, path: &str) -> Self {
        self.script().metadata.insert(path.into(), Ok(()));
        self
    }

    pub fn with_listing(self, directory: &str, names: &[&str]) -> Self {
        let entries = names
            .iter()
            .map(|name| DirectoryEntry {
                name: name.to_string(),
                is_directory: false,
                size: Some(1024),
                modified_at: None,
            })
            .collect();
        self.script().listings.insert(directory.into(), Ok(entries));
        self
    }

    /// Primary, listing, outline and metadata for a successful auto discovery
    pub fn with_discoverable_files(self) -> Self {
        self.with_valid_primary(PRIMARY)
            .with_listing(SHAPES_DIR, &["product.SHP", "ShapeMetadata.shp", "readme.txt"])
            .with_outline("/in/Shapes/product.SHP", square(34.2, 31.2, 0.5))
            .with_metadata(METADATA)
    }

    pub fn with_active_job(self, product_id: &str, job_id: &str) -> Self {
        self.script()
            .active_jobs
            .insert(product_id.into(), job_id.into());
        self
    }

    pub fn with_submission(self, result: ServiceResult<SubmissionReceipt>) -> Self {
        self.script().submission = Some(result);
        self
    }

    pub fn with_polls(self, statuses: &[JobStatus]) -> Self {
        {
            let mut script = self.script();
            for (index, status) in statuses.iter().enumerate() {
                script.polls.push_back(Ok(JobProgress {
                    percentage: Some(((index + 1) * 100 / statuses.len()) as u8),
                    status: status.clone(),
                    task_id: Some("T1".into()),
                    validation_report: None,
                }));
            }
        }
        self
    }

    pub fn with_poll_error(self, error: ServiceError) -> Self {
        self.script().polls.push_back(Err(error));
        self
    }

    pub fn with_poll_delay(self, delay: Duration) -> Self {
        self.script().poll_delay = Some(delay);
        self
    }

    pub fn with_restore(self, job_id: &str, result: ServiceResult<RestoredJob>) -> Self {
        self.script().restores.insert(job_id.into(), result);
        self
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.script().calls.clone()
    }

    pub fn count(&self, predicate: impl Fn(&ServiceCall) -> bool) -> usize {
        self.script().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.script()
            .calls
            .iter()
            .filter_map(|call| match call {
                ServiceCall::Submit(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ServiceCall) {
        self.script().calls.push(call);
    }
}

#[async_trait]
impl IngestionServices for ScriptedServices {
    async fn validate_primary_file(&self, path: &str) -> ServiceResult<ValidationResult> {
        self.record(ServiceCall::ValidatePrimary(path.into()));
        self.script()
            .validations
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::file_not_found(path)))
    }

    async fn fetch_product_outline(&self, path: &str) -> ServiceResult<ProductOutline> {
        self.record(ServiceCall::FetchOutline(path.into()));
        self.script()
            .outlines
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::file_not_found(path)))
    }

    async fn check_shape_metadata_exists(&self, path: &str) -> ServiceResult<()> {
        self.record(ServiceCall::CheckMetadata(path.into()));
        self.script()
            .metadata
            .get(path)
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::file_not_found(path)))
    }

    async fn fetch_directory_listing(&self, directory: &str) -> ServiceResult<Vec<DirectoryEntry>> {
        self.record(ServiceCall::ListDirectory(directory.into()));
        self.script()
            .listings
            .get(directory)
            .cloned()
            .unwrap_or_else(|| Err(ServiceError::file_not_found(directory)))
    }

    async fn fetch_active_job_for_product(&self, product_id: &str) -> ServiceResult<Option<String>> {
        self.record(ServiceCall::FetchActiveJob(product_id.into()));
        Ok(self.script().active_jobs.get(product_id).cloned())
    }

    async fn submit_ingestion_job(&self, request: SubmissionRequest) -> ServiceResult<SubmissionReceipt> {
        self.record(ServiceCall::Submit(request));
        self.script()
            .submission
            .clone()
            .unwrap_or_else(|| Err(ServiceError::Unavailable("no submission scripted".into())))
    }

    async fn poll_job_once(&self, job_id: &str) -> ServiceResult<JobProgress> {
        self.record(ServiceCall::Poll(job_id.into()));
        let delay = self.script().poll_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.script()
            .polls
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::Unavailable("no poll scripted".into())))
    }

    async fn restore_job_by_id(&self, job_id: &str) -> ServiceResult<RestoredJob> {
        self.record(ServiceCall::Restore(job_id.into()));
        self.script()
            .restores
            .get(job_id)
            .cloned()
            .unwrap_or_else(|| {
                Err(ServiceError::api(
                    format!("job {job_id} not found"),
                    serde_json::json!({"status": 404}),
                ))
            })
    }
}

/// Configuration with a short polling interval
pub fn fast_config() -> IngestionConfig {
    let mut config = IngestionConfig::default();
    config.polling.interval_ms = 20;
    config
}

/// Closed square ring with its lower-left corner at `(x, y)`
pub fn square(x: f64, y: f64, size: f64) -> Geometry {
    Geometry::Polygon(vec![vec![
        [x, y],
        [x + size, y],
        [x + size, y + size],
        [x, y + size],
        [x, y],
    ]])
}

pub fn complete_file_set() -> FileSet {
    FileSet {
        primary_data: Some(
            build_found_descriptor("Primary data", PRIMARY, None)
                .with_validation(ValidationResult::valid()),
        ),
        product_outline: Some(build_found_descriptor("Product outline", OUTLINE, None)),
        shape_metadata: Some(build_found_descriptor("Shape metadata", METADATA, None)),
    }
}

pub fn restored_job(job_id: &str) -> RestoredJob {
    let mut form_data = FormData::new();
    form_data.insert("productId".into(), serde_json::json!("P1"));
    RestoredJob {
        flow_kind: FlowKind::Update,
        file_set: complete_file_set(),
        form_data,
        resolution_value: Some(0.02),
        job: JobHandle {
            percentage: Some(40),
            status: Some(JobStatus::InProgress),
            ..JobHandle::for_job(job_id)
        },
    }
}
