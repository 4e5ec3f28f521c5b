//! # File Selection Actor
//!
//! Child state machine that resolves the three ingestion files, either by
//! automatic discovery from the primary data file or one file at a time.
//!
//! The actor starts from a read-only projection of the orchestrator's
//! context and reports every change back as a [`ChildMessage`]. Service
//! failures are normalised into error entries, reported, and the actor
//! returns to the idle substate of its branch; it never halts on its own.
//!
//! Events are handled one at a time. While a service call is outstanding,
//! further events wait in the inbox.

use super::actor::WorkflowActor;
use super::events::{ChildMessage, FileSelectionEvent, SelectedFile};
use super::states::{AutoState, FileSelectionState, ManualState};
use crate::config::SelectionConfig;
use crate::constants::error_codes;
use crate::error::{IngestionError, Result};
use crate::logging::{log_service_call, log_transition};
use crate::models::{
    build_found_descriptor, build_missing_descriptor, DerivedGeometry, ErrorEntry, FileDescriptor,
    FileDetails, FileSet, FileSlot, MergePolicy, SelectionMode,
};
use crate::services::{DirectoryEntry, IngestionServices, ServiceError};
use crate::state_machine::merge::apply_file_set;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Projection of the orchestrator context the actor starts from
#[derive(Debug, Clone, PartialEq)]
pub struct FileSelectionInput {
    pub selection_mode: SelectionMode,
    pub file_set: FileSet,
}

/// Owning handle to a running file-selection actor.
///
/// Dropping the handle stops the actor.
#[derive(Debug)]
pub struct FileSelectionHandle {
    events: mpsc::UnboundedSender<FileSelectionEvent>,
    task: JoinHandle<()>,
}

impl FileSelectionHandle {
    pub fn send(&self, event: FileSelectionEvent) -> Result<()> {
        self.events
            .send(event)
            .map_err(|_| IngestionError::channel_closed(FileSelectionActor::NAME))
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for FileSelectionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct FileSelectionActor {
    services: Arc<dyn IngestionServices>,
    selection: SelectionConfig,
    state: FileSelectionState,
    file_set: FileSet,
    outbox: mpsc::UnboundedSender<ChildMessage>,
}

impl WorkflowActor for FileSelectionActor {
    fn name(&self) -> &'static str {
        Self::NAME
    }
}

impl FileSelectionActor {
    pub const NAME: &'static str = "FileSelectionActor";

    pub fn new(
        services: Arc<dyn IngestionServices>,
        selection: SelectionConfig,
        file_set: FileSet,
        outbox: mpsc::UnboundedSender<ChildMessage>,
    ) -> Self {
        Self {
            services,
            selection,
            state: FileSelectionState::SelectionModeDecision,
            file_set,
            outbox,
        }
    }

    /// Spawn the actor; its messages arrive on `outbox`.
    pub fn start(
        services: Arc<dyn IngestionServices>,
        selection: SelectionConfig,
        input: FileSelectionInput,
        outbox: mpsc::UnboundedSender<ChildMessage>,
    ) -> FileSelectionHandle {
        let (events, inbox) = mpsc::unbounded_channel();
        let actor = Self::new(services, selection, input.file_set, outbox);
        let task = tokio::spawn(actor.run(input.selection_mode, inbox));
        FileSelectionHandle { events, task }
    }

    async fn run(
        mut self,
        initial_mode: SelectionMode,
        mut inbox: mpsc::UnboundedReceiver<FileSelectionEvent>,
    ) {
        if let Err(e) = self.started() {
            warn!(actor = %self.name(), error = %e, "Actor failed to start");
            return;
        }

        let files = self.file_set.clone();
        self.enter_mode(initial_mode, files);

        while let Some(event) = inbox.recv().await {
            self.handle(event).await;
        }

        if let Err(e) = self.stopped() {
            warn!(actor = %self.name(), error = %e, "Actor failed to stop cleanly");
        }
    }

    pub async fn handle(&mut self, event: FileSelectionEvent) {
        debug!(
            actor = %self.name(),
            state = %self.state,
            event = event.event_type(),
            "Handling file selection event"
        );

        match (self.state, event) {
            (_, FileSelectionEvent::SwitchMode(mode)) => {
                let reset = self.file_set.reset(&self.selection.labels);
                self.enter_mode(mode, reset);
            }
            (FileSelectionState::Auto(AutoState::Idle), FileSelectionEvent::SelectPrimary(file)) => {
                self.discover_from_primary(file).await;
            }
            (FileSelectionState::Manual(ManualState::Idle), FileSelectionEvent::SelectPrimary(file)) => {
                self.select_primary_manually(file).await;
            }
            (
                FileSelectionState::Manual(ManualState::Idle),
                FileSelectionEvent::SelectProductOutline(file),
            ) => {
                self.select_product_outline_manually(file).await;
            }
            (
                FileSelectionState::Manual(ManualState::Idle),
                FileSelectionEvent::SelectShapeMetadata(file),
            ) => {
                self.select_shape_metadata_manually(file).await;
            }
            (state, event) => {
                debug!(
                    actor = %self.name(),
                    state = %state,
                    event = event.event_type(),
                    "Event not accepted in current state, ignoring"
                );
            }
        }
    }

    /// `selectionModeDecision`: pick the branch and publish the projection.
    ///
    /// Files rehydrated from a job are edited one by one, so `Restore`
    /// lands in the manual branch.
    fn enter_mode(&mut self, mode: SelectionMode, files: FileSet) {
        self.transition(FileSelectionState::SelectionModeDecision, "enter");

        let (mode, idle) = match mode {
            SelectionMode::Auto => (SelectionMode::Auto, FileSelectionState::Auto(AutoState::Idle)),
            SelectionMode::Manual | SelectionMode::Restore => (
                SelectionMode::Manual,
                FileSelectionState::Manual(ManualState::Idle),
            ),
        };

        self.file_set = files;
        self.emit(ChildMessage::SetSelectionMode(mode));
        self.emit(ChildMessage::SetFiles {
            files: self.file_set.clone(),
            policy: MergePolicy::Override,
        });
        self.transition(idle, "selection_mode");
    }

    async fn discover_from_primary(&mut self, file: SelectedFile) {
        self.transition(FileSelectionState::Auto(AutoState::SelectingPrimary), "SELECT_PRIMARY");
        let primary = match self.validate_primary(&file).await {
            Ok(descriptor) => descriptor,
            Err(entry) => return self.fail(entry, FileSelectionState::Auto(AutoState::Idle)),
        };

        // The shape files of a previous primary no longer apply
        let mut update = FileSet::single(FileSlot::PrimaryData, primary);
        update.product_outline = Some(build_missing_descriptor(self.label(FileSlot::ProductOutline)));
        update.shape_metadata = Some(build_missing_descriptor(self.label(FileSlot::ShapeMetadata)));
        self.commit(update);

        self.transition(
            FileSelectionState::Auto(AutoState::FetchingProductOutline),
            "primary_validated",
        );
        let discovery = &self.selection.auto_discovery;
        let shapes_directory = resolve_relative(parent_directory(&file.path), &discovery.shapes_directory);
        let outline_name = discovery.product_outline_file.clone();
        let metadata_name = discovery.shape_metadata_file.clone();

        log_service_call(self.name(), "fetch_directory_listing", Some(&shapes_directory), None);
        let listing = match self.services.fetch_directory_listing(&shapes_directory).await {
            Ok(listing) => listing,
            Err(e) => {
                let entry = e.to_error_entry(error_codes::DIRECTORY_LISTING);
                return self.fail(entry, FileSelectionState::Auto(AutoState::Idle));
            }
        };

        let outline = match locate(&listing, &shapes_directory, &outline_name) {
            Ok(found) => self.resolve_product_outline(found).await,
            Err(e) => Err(e.to_error_entry(error_codes::PRODUCT_OUTLINE)),
        };
        match outline {
            Ok(descriptor) => self.commit(FileSet::single(FileSlot::ProductOutline, descriptor)),
            Err(entry) => return self.fail(entry, FileSelectionState::Auto(AutoState::Idle)),
        }

        self.transition(
            FileSelectionState::Auto(AutoState::CheckingShapeMetadata),
            "product_outline_fetched",
        );
        let metadata = match locate(&listing, &shapes_directory, &metadata_name) {
            Ok(found) => self.resolve_shape_metadata(found).await,
            Err(e) => Err(e.to_error_entry(error_codes::SHAPE_METADATA)),
        };
        match metadata {
            Ok(descriptor) => {
                self.commit(FileSet::single(FileSlot::ShapeMetadata, descriptor));
                self.notify_if_complete();
                self.transition(FileSelectionState::Auto(AutoState::Idle), "shape_metadata_found");
            }
            Err(entry) => self.fail(entry, FileSelectionState::Auto(AutoState::Idle)),
        }
    }

    async fn select_primary_manually(&mut self, file: SelectedFile) {
        self.transition(
            FileSelectionState::Manual(ManualState::SelectingPrimary),
            "SELECT_PRIMARY",
        );
        match self.validate_primary(&file).await {
            Ok(descriptor) => {
                self.commit(FileSet::single(FileSlot::PrimaryData, descriptor));
                self.notify_if_complete();
                self.transition(FileSelectionState::Manual(ManualState::Idle), "primary_validated");
            }
            Err(entry) => self.fail(entry, FileSelectionState::Manual(ManualState::Idle)),
        }
    }

    async fn select_product_outline_manually(&mut self, file: SelectedFile) {
        if let Err(entry) = self.require_validated_primary(FileSlot::ProductOutline) {
            return self.report(entry);
        }
        self.transition(
            FileSelectionState::Manual(ManualState::SelectingProductOutline),
            "SELECT_PRODUCT_OUTLINE",
        );
        match self.resolve_product_outline(file).await {
            Ok(descriptor) => {
                self.commit(FileSet::single(FileSlot::ProductOutline, descriptor));
                self.notify_if_complete();
                self.transition(
                    FileSelectionState::Manual(ManualState::Idle),
                    "product_outline_fetched",
                );
            }
            Err(entry) => self.fail(entry, FileSelectionState::Manual(ManualState::Idle)),
        }
    }

    async fn select_shape_metadata_manually(&mut self, file: SelectedFile) {
        if let Err(entry) = self.require_validated_primary(FileSlot::ShapeMetadata) {
            return self.report(entry);
        }
        self.transition(
            FileSelectionState::Manual(ManualState::SelectingShapeMetadata),
            "SELECT_SHAPE_METADATA",
        );
        match self.resolve_shape_metadata(file).await {
            Ok(descriptor) => {
                self.commit(FileSet::single(FileSlot::ShapeMetadata, descriptor));
                self.notify_if_complete();
                self.transition(
                    FileSelectionState::Manual(ManualState::Idle),
                    "shape_metadata_found",
                );
            }
            Err(entry) => self.fail(entry, FileSelectionState::Manual(ManualState::Idle)),
        }
    }

    async fn validate_primary(&self, file: &SelectedFile) -> std::result::Result<FileDescriptor, ErrorEntry> {
        log_service_call(self.name(), "validate_primary_file", Some(&file.path), None);
        let result = self
            .services
            .validate_primary_file(&file.path)
            .await
            .map_err(|e| e.to_error_entry(error_codes::VALIDATION_REQUEST).with_field(FileSlot::PrimaryData.to_string()))?;

        if !result.is_valid {
            let message = result
                .message
                .clone()
                .unwrap_or_else(|| format!("{} is not a valid source file", file.path));
            return Err(ErrorEntry::logic(error_codes::INVALID_SOURCE_FILE, message)
                .with_field(FileSlot::PrimaryData.to_string()));
        }

        let geometry = result.extent_polygon.clone().and_then(DerivedGeometry::from_outline);
        Ok(build_found_descriptor(
            self.label(FileSlot::PrimaryData),
            file.path.clone(),
            file.details.clone(),
        )
        .with_validation(result)
        .with_geometry(geometry))
    }

    async fn resolve_product_outline(
        &self,
        file: SelectedFile,
    ) -> std::result::Result<FileDescriptor, ErrorEntry> {
        log_service_call(self.name(), "fetch_product_outline", Some(&file.path), None);
        let outline = self
            .services
            .fetch_product_outline(&file.path)
            .await
            .map_err(|e| {
                e.to_error_entry(error_codes::PRODUCT_OUTLINE)
                    .with_field(FileSlot::ProductOutline.to_string())
            })?;

        Ok(
            build_found_descriptor(self.label(FileSlot::ProductOutline), file.path, file.details)
                .with_geometry(DerivedGeometry::from_outline(outline.outline_geometry)),
        )
    }

    async fn resolve_shape_metadata(
        &self,
        file: SelectedFile,
    ) -> std::result::Result<FileDescriptor, ErrorEntry> {
        log_service_call(self.name(), "check_shape_metadata_exists", Some(&file.path), None);
        self.services
            .check_shape_metadata_exists(&file.path)
            .await
            .map_err(|e| {
                e.to_error_entry(error_codes::SHAPE_METADATA)
                    .with_field(FileSlot::ShapeMetadata.to_string())
            })?;

        Ok(build_found_descriptor(
            self.label(FileSlot::ShapeMetadata),
            file.path,
            file.details,
        ))
    }

    fn require_validated_primary(&self, slot: FileSlot) -> std::result::Result<(), ErrorEntry> {
        let validated = self
            .file_set
            .slot(FileSlot::PrimaryData)
            .is_some_and(FileDescriptor::is_validated);
        if validated {
            Ok(())
        } else {
            Err(ErrorEntry::logic(
                error_codes::PRIMARY_FILE_REQUIRED,
                format!("Select a valid primary data file before the {slot}"),
            )
            .with_field(slot.to_string()))
        }
    }

    /// Keep the local projection and the parent in step
    fn commit(&mut self, update: FileSet) {
        self.file_set = apply_file_set(&self.file_set, &update, MergePolicy::Merge);
        self.emit(ChildMessage::ClearErrors);
        self.emit(ChildMessage::SetFiles {
            files: update,
            policy: MergePolicy::Merge,
        });
    }

    fn notify_if_complete(&self) {
        if self.file_set.is_complete() {
            self.emit(ChildMessage::FilesSelected);
        }
    }

    fn fail(&mut self, entry: ErrorEntry, back_to: FileSelectionState) {
        self.report(entry);
        self.transition(back_to, "error");
    }

    fn report(&self, entry: ErrorEntry) {
        debug!(actor = %self.name(), code = %entry.code, message = %entry.message, "Reporting error to parent");
        self.emit(ChildMessage::ReportError(entry));
    }

    fn label(&self, slot: FileSlot) -> String {
        self.file_set
            .slot(slot)
            .map(|d| d.label.clone())
            .unwrap_or_else(|| self.selection.labels.for_slot(slot).to_string())
    }

    fn transition(&mut self, to: FileSelectionState, trigger: &str) {
        log_transition(self.name(), &self.state.to_string(), &to.to_string(), trigger);
        self.state = to;
        self.emit(ChildMessage::StateChanged(to));
    }

    fn emit(&self, message: ChildMessage) {
        // The parent drops its receiver when it stops this actor
        if self.outbox.send(message).is_err() {
            debug!(actor = %self.name(), "Parent no longer listening, dropping message");
        }
    }
}

/// Find `name` in a listing of `directory`, ignoring ASCII case
fn locate(
    listing: &[DirectoryEntry],
    directory: &str,
    name: &str,
) -> std::result::Result<SelectedFile, ServiceError> {
    listing
        .iter()
        .find(|entry| !entry.is_directory && entry.name.eq_ignore_ascii_case(name))
        .map(|entry| {
            let file = SelectedFile::new(join_path(directory, &entry.name));
            match (entry.size, entry.modified_at) {
                (None, None) => file,
                (size, last_modified) => file.with_details(FileDetails {
                    size,
                    last_modified,
                }),
            }
        })
        .ok_or_else(|| ServiceError::file_not_found(join_path(directory, name)))
}

fn parent_directory(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(index) => &path[..index],
        None => "",
    }
}

fn join_path(directory: &str, name: &str) -> String {
    if directory.is_empty() {
        name.to_string()
    } else if directory.ends_with('/') {
        format!("{directory}{name}")
    } else {
        format!("{directory}/{name}")
    }
}

/// Resolve `relative` against `directory`, honouring `.` and `..`
fn resolve_relative(directory: &str, relative: &str) -> String {
    let absolute = directory.starts_with('/');
    let mut segments: Vec<&str> = directory.split('/').filter(|s| !s.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_directory() {
        assert_eq!(parent_directory("/in/GeoPkg/a.gpkg"), "/in/GeoPkg");
        assert_eq!(parent_directory("/a.gpkg"), "/");
        assert_eq!(parent_directory("a.gpkg"), "");
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(resolve_relative("/in/GeoPkg", "../Shapes"), "/in/Shapes");
        assert_eq!(resolve_relative("/in/GeoPkg", "./Shapes"), "/in/GeoPkg/Shapes");
        assert_eq!(resolve_relative("in/GeoPkg", "../../Shapes"), "Shapes");
        assert_eq!(resolve_relative("/", "../Shapes"), "/Shapes");
    }

    #[test]
    fn test_locate_is_case_insensitive() {
        let listing = vec![
            DirectoryEntry {
                name: "PRODUCT.shp".into(),
                is_directory: false,
                size: Some(42),
                modified_at: None,
            },
            DirectoryEntry {
                name: "ShapeMetadata.shp".into(),
                is_directory: true,
                size: None,
                modified_at: None,
            },
        ];

        let found = locate(&listing, "/in/Shapes", "Product.shp").unwrap();
        assert_eq!(found.path, "/in/Shapes/PRODUCT.shp");
        assert_eq!(found.details.unwrap().size, Some(42));

        let missing = locate(&listing, "/in/Shapes", "ShapeMetadata.shp").unwrap_err();
        assert_eq!(missing, ServiceError::file_not_found("/in/Shapes/ShapeMetadata.shp"));
    }
}
