// State machines of the ingestion workflow
//
// The root orchestrator and the file-selection child each run as an actor
// owning its state; they talk only through the message types in `events`.

pub mod actor;
pub mod events;
pub mod file_selection;
pub mod merge;
pub mod orchestrator;
pub mod selectors;
pub mod states;

// Re-export main types for convenient access
pub use actor::WorkflowActor;
pub use events::{ChildMessage, FileSelectionEvent, OrchestratorEvent, SelectedFile};
pub use file_selection::{FileSelectionActor, FileSelectionHandle, FileSelectionInput};
pub use merge::{apply_file_set, REPLACED_WHOLESALE};
pub use orchestrator::{IngestionOrchestrator, OrchestratorHandle, OrchestratorSnapshot};
pub use states::{AutoState, FileSelectionState, ManualState, RootState, StateTag};
