use super::states::FileSelectionState;
use crate::models::{ErrorEntry, FileDetails, FileSet, FormData, MergePolicy, SelectionMode};
use serde::{Deserialize, Serialize};

/// A file picked by the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<FileDetails>,
}

impl SelectedFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: FileDetails) -> Self {
        self.details = Some(details);
        self
    }
}

/// Events accepted by the root orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorEvent {
    /// Begin a brand-new ingestion
    StartNew,
    /// Begin an update of an existing product
    #[serde(rename_all = "camelCase")]
    StartUpdate { product_id: String },
    /// Resume a previously submitted job
    #[serde(rename_all = "camelCase")]
    Restore { job_id: String },
    SelectPrimary { file: SelectedFile },
    SelectProductOutline { file: SelectedFile },
    SelectShapeMetadata { file: SelectedFile },
    /// Switch to automatic discovery
    Auto,
    /// Switch to manual per-file selection
    Manual,
    #[serde(rename_all = "camelCase")]
    Submit {
        form_data: FormData,
        resolution_value: Option<f64>,
    },
    /// Clear errors and return to idle from anywhere
    Retry,
}

impl OrchestratorEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StartNew => "START_NEW",
            Self::StartUpdate { .. } => "START_UPDATE",
            Self::Restore { .. } => "RESTORE",
            Self::SelectPrimary { .. } => "SELECT_PRIMARY",
            Self::SelectProductOutline { .. } => "SELECT_PRODUCT_OUTLINE",
            Self::SelectShapeMetadata { .. } => "SELECT_SHAPE_METADATA",
            Self::Auto => "AUTO",
            Self::Manual => "MANUAL",
            Self::Submit { .. } => "SUBMIT",
            Self::Retry => "RETRY",
        }
    }

    /// The child-bound form of this event, if it belongs to file selection
    pub fn as_file_selection(&self) -> Option<FileSelectionEvent> {
        match self {
            Self::SelectPrimary { file } => Some(FileSelectionEvent::SelectPrimary(file.clone())),
            Self::SelectProductOutline { file } => {
                Some(FileSelectionEvent::SelectProductOutline(file.clone()))
            }
            Self::SelectShapeMetadata { file } => {
                Some(FileSelectionEvent::SelectShapeMetadata(file.clone()))
            }
            Self::Auto => Some(FileSelectionEvent::SwitchMode(SelectionMode::Auto)),
            Self::Manual => Some(FileSelectionEvent::SwitchMode(SelectionMode::Manual)),
            _ => None,
        }
    }
}

/// Events forwarded by the root to the file-selection child
#[derive(Debug, Clone, PartialEq)]
pub enum FileSelectionEvent {
    SelectPrimary(SelectedFile),
    SelectProductOutline(SelectedFile),
    SelectShapeMetadata(SelectedFile),
    SwitchMode(SelectionMode),
}

impl FileSelectionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SelectPrimary(_) => "SELECT_PRIMARY",
            Self::SelectProductOutline(_) => "SELECT_PRODUCT_OUTLINE",
            Self::SelectShapeMetadata(_) => "SELECT_SHAPE_METADATA",
            Self::SwitchMode(SelectionMode::Auto) => "AUTO",
            Self::SwitchMode(_) => "MANUAL",
        }
    }
}

/// Messages the file-selection child sends to its parent.
///
/// The child never touches the parent's context; it proposes changes with
/// these messages and the parent applies them in emission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChildMessage {
    SetSelectionMode(SelectionMode),
    SetFiles { files: FileSet, policy: MergePolicy },
    /// The file set is complete
    FilesSelected,
    ReportError(ErrorEntry),
    ClearErrors,
    StateChanged(FileSelectionState),
}
