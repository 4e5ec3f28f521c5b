//! End-to-end runs of the orchestrator over the local filesystem backend.

use raster_ingestion::config::ConfigManager;
use raster_ingestion::models::{FormData, JobStatus};
use raster_ingestion::state_machine::{
    IngestionOrchestrator, OrchestratorEvent, OrchestratorHandle, RootState, SelectedFile,
};
use raster_ingestion::LocalIngestionServices;
use serde_json::json;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_test::assert_ok;

const WAIT: Duration = Duration::from_secs(5);

const OUTLINE: &str =
    r#"{"type":"Polygon","coordinates":[[[34.0,31.0],[35.0,31.0],[35.0,32.0],[34.0,31.0]]]}"#;

fn write_layout(root: &Path) {
    fs::create_dir_all(root.join("in/GeoPkg")).unwrap();
    fs::create_dir_all(root.join("in/Shapes")).unwrap();
    fs::write(root.join("in/GeoPkg/area.gpkg"), b"gpkg").unwrap();
    fs::write(root.join("in/GeoPkg/area.geojson"), OUTLINE).unwrap();
    fs::write(root.join("in/Shapes/PRODUCT.shp"), b"shp").unwrap();
    fs::write(root.join("in/Shapes/PRODUCT.geojson"), OUTLINE).unwrap();
    fs::write(root.join("in/Shapes/ShapeMetadata.shp"), b"shp").unwrap();
}

/// Orchestrator over `data`, configured from a `test` overlay in `config_dir`
fn spawn(data: &TempDir, config_dir: &TempDir) -> OrchestratorHandle {
    fs::write(
        config_dir.path().join("ingestion.toml"),
        "[polling]\ninterval_ms = 2000\n",
    )
    .unwrap();
    fs::write(
        config_dir.path().join("ingestion.test.toml"),
        "[polling]\ninterval_ms = 10\n\n[local]\nprogress_step = 50\n",
    )
    .unwrap();

    let manager =
        ConfigManager::load_from_directory_with_env(Some(config_dir.path().to_path_buf()), "test")
            .unwrap();
    let mut config = manager.config().clone();
    assert_eq!(config.polling.interval_ms, 10);
    config.local.root = data.path().to_path_buf();

    let services = Arc::new(LocalIngestionServices::from_config(&config.local));
    IngestionOrchestrator::new(services, config).spawn()
}

fn product_form(product_id: &str) -> FormData {
    let mut form_data = FormData::new();
    form_data.insert("productId".into(), json!(product_id));
    form_data
}

#[tokio::test]
async fn test_new_ingestion_runs_to_completion() {
    let data = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    write_layout(data.path());
    let handle = spawn(&data, &config_dir);

    handle.send(OrchestratorEvent::StartNew).await.unwrap();
    handle
        .send(OrchestratorEvent::SelectPrimary {
            file: SelectedFile::new("/in/GeoPkg/area.gpkg"),
        })
        .await
        .unwrap();
    let snapshot = handle
        .wait_for(|s| s.state == RootState::Idle && s.files_selected(), WAIT)
        .await
        .unwrap();
    assert_eq!(
        snapshot.context.file_set.product_outline.unwrap().path,
        "/in/Shapes/PRODUCT.shp"
    );

    handle
        .send(OrchestratorEvent::Submit {
            form_data: product_form("P1"),
            resolution_value: Some(0.01),
        })
        .await
        .unwrap();
    let snapshot = handle.wait_for_state(RootState::Done, WAIT).await.unwrap();
    let job = snapshot.context.job.unwrap();
    assert_eq!(job.status, Some(JobStatus::Completed));
    assert_eq!(job.percentage, Some(100));
    assert_ok!(handle.shutdown().await);
}

#[tokio::test]
async fn test_wrong_primary_format_is_rejected() {
    let data = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    write_layout(data.path());
    fs::write(data.path().join("in/GeoPkg/area.tif"), b"tif").unwrap();
    let handle = spawn(&data, &config_dir);

    handle.send(OrchestratorEvent::StartNew).await.unwrap();
    handle
        .send(OrchestratorEvent::SelectPrimary {
            file: SelectedFile::new("/in/GeoPkg/area.tif"),
        })
        .await
        .unwrap();
    let snapshot = handle
        .wait_for(|s| s.context.has_errors(), WAIT)
        .await
        .unwrap();
    assert_eq!(
        snapshot.context.errors[0].code,
        raster_ingestion::constants::error_codes::INVALID_SOURCE_FILE
    );
    assert_ok!(handle.shutdown().await);
}

#[tokio::test]
async fn test_browse_lists_shapes_directory() {
    let data = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    write_layout(data.path());
    let handle = spawn(&data, &config_dir);

    let names: Vec<String> = handle
        .browse("/in/Shapes")
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["PRODUCT.geojson", "PRODUCT.shp", "ShapeMetadata.shp"]);
    assert_ok!(handle.shutdown().await);
}
