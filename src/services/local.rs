//! # Local Ingestion Backend
//!
//! Filesystem-backed implementation of [`IngestionServices`] used by the CLI
//! and by integration tests.
//!
//! - Paths are resolved against a root directory; a leading `/` is relative
//!   to that root.
//! - A primary data file is valid iff it is a `.gpkg` file. Its extent comes
//!   from a sibling `<stem>.geojson`, when there is one.
//! - Product outlines are read as GeoJSON: the selected file itself, or a
//!   sibling `<stem>.geojson` next to a shapefile.
//! - Jobs live in memory and advance by a fixed step on every poll.

use super::{
    DirectoryEntry, IngestionServices, ProductOutline, RestoredJob, ServiceError, ServiceResult,
    SubmissionReceipt, SubmissionRequest,
};
use crate::config::LocalBackendConfig;
use crate::constants::PRODUCT_ID_FIELD;
use crate::models::{
    DerivedGeometry, FileSlot, Geometry, JobHandle, JobProgress, JobStatus, ValidationResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct LocalJob {
    request: SubmissionRequest,
    task_id: String,
    percentage: u8,
    status: JobStatus,
}

impl LocalJob {
    fn progress(&self) -> JobProgress {
        JobProgress {
            percentage: Some(self.percentage),
            status: self.status.clone(),
            task_id: Some(self.task_id.clone()),
            validation_report: None,
        }
    }
}

#[derive(Debug)]
pub struct LocalIngestionServices {
    root: PathBuf,
    progress_step: u8,
    jobs: RwLock<HashMap<String, LocalJob>>,
}

impl LocalIngestionServices {
    pub fn new(root: impl Into<PathBuf>, progress_step: u8) -> Self {
        Self {
            root: root.into(),
            progress_step: progress_step.clamp(1, 100),
            jobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &LocalBackendConfig) -> Self {
        Self::new(config.root.clone(), config.progress_step)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    async fn require_file(&self, path: &str) -> ServiceResult<PathBuf> {
        let resolved = self.resolve(path);
        match tokio::fs::metadata(&resolved).await {
            Ok(metadata) if metadata.is_file() => Ok(resolved),
            Ok(_) => Err(ServiceError::file_not_found(path)),
            Err(e) => Err(io_error(path, e)),
        }
    }

    async fn read_geometry(&self, resolved: &Path, display: &str) -> ServiceResult<Geometry> {
        let bytes = tokio::fs::read(resolved).await.map_err(|e| io_error(display, e))?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            ServiceError::api(
                format!("{display} is not valid GeoJSON"),
                json!({ "path": display, "error": e.to_string() }),
            )
        })?;
        // Accept a Feature as well as a bare geometry
        let geometry = match value.get("geometry") {
            Some(geometry) => geometry.clone(),
            None => value,
        };
        serde_json::from_value(geometry).map_err(|e| {
            ServiceError::api(
                format!("{display} holds no supported geometry"),
                json!({ "path": display, "error": e.to_string() }),
            )
        })
    }

    fn geojson_sidecar(resolved: &Path) -> Option<PathBuf> {
        let is_geojson = resolved
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("geojson"));
        if is_geojson {
            Some(resolved.to_path_buf())
        } else {
            let sidecar = resolved.with_extension("geojson");
            sidecar.is_file().then_some(sidecar)
        }
    }

    async fn with_job<T>(&self, job_id: &str, f: impl FnOnce(&mut LocalJob) -> T) -> ServiceResult<T> {
        let mut jobs = self.jobs.write().await;
        jobs.get_mut(job_id)
            .map(f)
            .ok_or_else(|| job_not_found(job_id))
    }
}

#[async_trait]
impl IngestionServices for LocalIngestionServices {
    async fn validate_primary_file(&self, path: &str) -> ServiceResult<ValidationResult> {
        let resolved = self.require_file(path).await?;
        let is_geopackage = resolved
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gpkg"));
        if !is_geopackage {
            return Ok(ValidationResult::invalid(format!("{path} is not a GeoPackage")));
        }

        let sidecar = resolved.with_extension("geojson");
        let extent_polygon = if sidecar.is_file() {
            Some(self.read_geometry(&sidecar, path).await?)
        } else {
            None
        };

        debug!(path = %path, has_extent = extent_polygon.is_some(), "Validated primary data file");
        Ok(ValidationResult {
            extent_polygon,
            ..ValidationResult::valid()
        })
    }

    async fn fetch_product_outline(&self, path: &str) -> ServiceResult<ProductOutline> {
        let resolved = self.require_file(path).await?;
        let source = Self::geojson_sidecar(&resolved).ok_or_else(|| {
            ServiceError::Unavailable(format!("no outline geometry found for {path}"))
        })?;
        let outline_geometry = self.read_geometry(&source, path).await?;
        Ok(ProductOutline { outline_geometry })
    }

    async fn check_shape_metadata_exists(&self, path: &str) -> ServiceResult<()> {
        self.require_file(path).await.map(|_| ())
    }

    async fn fetch_directory_listing(&self, directory: &str) -> ServiceResult<Vec<DirectoryEntry>> {
        let resolved = self.resolve(directory);
        let mut reader = tokio::fs::read_dir(&resolved)
            .await
            .map_err(|e| io_error(directory, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| io_error(directory, e))? {
            let metadata = entry.metadata().await.map_err(|e| io_error(directory, e))?;
            let is_directory = metadata.is_dir();
            entries.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory,
                size: (!is_directory).then_some(metadata.len()),
                modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn fetch_active_job_for_product(&self, product_id: &str) -> ServiceResult<Option<String>> {
        let jobs = self.jobs.read().await;
        let active = jobs.iter().find_map(|(job_id, job)| {
            let matches = job
                .request
                .form_data
                .get(PRODUCT_ID_FIELD)
                .and_then(Value::as_str)
                == Some(product_id);
            (matches && !job.status.is_terminal()).then(|| job_id.clone())
        });
        Ok(active)
    }

    async fn submit_ingestion_job(&self, request: SubmissionRequest) -> ServiceResult<SubmissionReceipt> {
        let missing: Vec<String> = FileSlot::ALL
            .into_iter()
            .filter(|slot| !request.file_set.slot(*slot).is_some_and(|d| d.is_present()))
            .map(|slot| slot.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::api(
                "ingestion request is missing files",
                json!({ "status": 422, "missing": missing }),
            ));
        }

        let job_id = Uuid::new_v4().to_string();
        let job = LocalJob {
            request,
            task_id: Uuid::new_v4().to_string(),
            percentage: 0,
            status: JobStatus::Pending,
        };
        self.jobs.write().await.insert(job_id.clone(), job);

        info!(job_id = %job_id, "Local ingestion job created");
        Ok(SubmissionReceipt { job_id })
    }

    async fn poll_job_once(&self, job_id: &str) -> ServiceResult<JobProgress> {
        let step = self.progress_step;
        self.with_job(job_id, |job| {
            if !job.status.is_terminal() {
                job.percentage = job.percentage.saturating_add(step).min(100);
                job.status = if job.percentage == 100 {
                    JobStatus::Completed
                } else {
                    JobStatus::InProgress
                };
            }
            job.progress()
        })
        .await
    }

    async fn restore_job_by_id(&self, job_id: &str) -> ServiceResult<RestoredJob> {
        let job = self.with_job(job_id, |job| job.clone()).await?;
        let mut file_set = job.request.file_set.clone();

        if let Some(primary) = file_set.primary_data.take() {
            let validation = self.validate_primary_file(&primary.path).await?;
            let geometry = validation
                .extent_polygon
                .clone()
                .and_then(DerivedGeometry::from_outline);
            file_set.primary_data = Some(primary.with_validation(validation).with_geometry(geometry));
        }
        if let Some(outline) = file_set.product_outline.take() {
            let fetched = self.fetch_product_outline(&outline.path).await?;
            file_set.product_outline =
                Some(outline.with_geometry(DerivedGeometry::from_outline(fetched.outline_geometry)));
        }

        let progress = job.progress();
        Ok(RestoredJob {
            flow_kind: job.request.flow_kind,
            file_set,
            form_data: job.request.form_data,
            resolution_value: job.request.resolution_value,
            job: JobHandle {
                job_id: Some(job_id.to_string()),
                task_id: progress.task_id,
                percentage: progress.percentage,
                status: Some(progress.status),
                validation_report: None,
            },
        })
    }
}

fn io_error(path: &str, error: std::io::Error) -> ServiceError {
    match error.kind() {
        ErrorKind::NotFound => ServiceError::file_not_found(path),
        _ => ServiceError::Unavailable(format!("{path}: {error}")),
    }
}

fn job_not_found(job_id: &str) -> ServiceError {
    ServiceError::api(
        format!("job {job_id} not found"),
        json!({ "status": 404, "jobId": job_id }),
    )
}
