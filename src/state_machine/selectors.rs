//! Predicates over orchestrator state and context for the presentation layer.

use super::states::{FileSelectionState, RootState, StateTag};
use crate::models::{is_file_set_complete, OrchestratorContext};

/// All three files are present
pub fn files_selected(context: &OrchestratorContext) -> bool {
    is_file_set_complete(&context.file_set)
}

/// A loading tag is active on the root state or on the child state
pub fn is_loading(state: RootState, child_state: Option<FileSelectionState>) -> bool {
    state.has_tag(StateTag::Loading)
        || child_state.is_some_and(|child| child.has_tag(StateTag::Loading))
}

/// `RETRY` is worth offering when something failed and the workflow is not finished
pub fn can_retry(state: RootState, context: &OrchestratorContext) -> bool {
    !state.is_terminal() && !context.errors.is_empty()
}

/// Gate for the submit control; the orchestrator itself accepts `SUBMIT` in `idle`
pub fn can_submit(state: RootState, context: &OrchestratorContext) -> bool {
    state == RootState::Idle && files_selected(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{build_found_descriptor, ErrorEntry, FileDescriptor, FileSet};
    use crate::state_machine::states::{AutoState, ManualState};

    fn complete_context() -> OrchestratorContext {
        let found = |path: &str| Some(build_found_descriptor("f", path, None));
        OrchestratorContext {
            file_set: FileSet {
                primary_data: found("/in/a.gpkg"),
                product_outline: found("/in/Shapes/Product.shp"),
                shape_metadata: found("/in/Shapes/ShapeMetadata.shp"),
            },
            ..OrchestratorContext::default()
        }
    }

    #[test]
    fn test_is_loading_walks_hierarchy() {
        assert!(is_loading(RootState::JobSubmission, None));
        assert!(!is_loading(RootState::JobPolling, None));
        assert!(!is_loading(
            RootState::FileSelection,
            Some(FileSelectionState::Manual(ManualState::Idle))
        ));
        assert!(is_loading(
            RootState::FileSelection,
            Some(FileSelectionState::Auto(AutoState::SelectingPrimary))
        ));
    }

    #[test]
    fn test_can_submit_requires_complete_files_in_idle() {
        let mut context = complete_context();
        assert!(can_submit(RootState::Idle, &context));
        assert!(!can_submit(RootState::FileSelection, &context));

        context.file_set.shape_metadata = Some(FileDescriptor {
            exists: false,
            ..build_found_descriptor("m", "/in/Shapes/ShapeMetadata.shp", None)
        });
        assert!(!files_selected(&context));
        assert!(!can_submit(RootState::Idle, &context));
    }

    #[test]
    fn test_can_retry() {
        let mut context = OrchestratorContext::default();
        assert!(!can_retry(RootState::Idle, &context));

        context.record_error(ErrorEntry::logic("ingestion.error.job-polling", "boom"));
        assert!(can_retry(RootState::Idle, &context));
        assert!(!can_retry(RootState::Done, &context));
    }
}
