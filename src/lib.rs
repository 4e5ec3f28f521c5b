#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Raster Ingestion
//!
//! Workflow core for ingesting raster products into a catalog: choose and
//! validate the source files, submit an ingestion or update job, and poll it
//! until it reaches a terminal status.
//!
//! ## Architecture
//!
//! The workflow is a hierarchical state machine built from two actors:
//!
//! - [`IngestionOrchestrator`] owns the [`OrchestratorContext`], runs the
//!   submission and polling steps, and can resume a previously submitted job.
//! - [`state_machine::FileSelectionActor`] resolves the primary data file,
//!   product outline and shape metadata, automatically or one by one, and
//!   proposes every change to the orchestrator as a message.
//!
//! Every external operation goes through the [`IngestionServices`] trait,
//! injected at construction. [`LocalIngestionServices`] implements it over a
//! local directory tree.
//!
//! ## Module Organization
//!
//! - [`models`] - Errors, file descriptors, geometries, jobs and the context
//! - [`services`] - Service contracts and the local backend
//! - [`state_machine`] - States, events, the two actors and selectors
//! - [`events`] - Broadcast of state transitions
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Crate error type
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use raster_ingestion::{
//!     IngestionConfig, IngestionOrchestrator, LocalIngestionServices, OrchestratorEvent, RootState,
//! };
//!
//! # async fn example() -> raster_ingestion::Result<()> {
//! let config = IngestionConfig::default();
//! let services = Arc::new(LocalIngestionServices::from_config(&config.local));
//! let handle = IngestionOrchestrator::new(services, config).spawn();
//!
//! handle.send(OrchestratorEvent::StartNew).await?;
//! handle
//!     .wait_for_state(RootState::FileSelection, Duration::from_secs(1))
//!     .await?;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod services;
pub mod state_machine;

pub use config::{ConfigManager, IngestionConfig};
pub use error::{IngestionError, Result};
pub use events::{EventPublisher, TransitionEvent};
pub use models::{
    ErrorEntry, FileDescriptor, FileSet, FlowKind, JobHandle, JobStatus, OrchestratorContext,
    SelectionMode,
};
pub use services::{IngestionServices, LocalIngestionServices, ServiceError};
pub use state_machine::{
    IngestionOrchestrator, OrchestratorEvent, OrchestratorHandle, OrchestratorSnapshot, RootState,
};
