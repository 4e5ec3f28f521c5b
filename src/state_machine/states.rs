use serde::{Deserialize, Serialize};
use std::fmt;

/// Tags attached to states, queried by the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateTag {
    /// A service call is outstanding
    Loading,
}

/// States of the root ingestion orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RootState {
    /// Waiting for the user
    #[default]
    Idle,
    /// Looking up an in-flight job for the product being updated
    StartUpdate,
    /// File-selection child actor is driving
    FileSelection,
    JobSubmission,
    JobPolling,
    /// Delay between two polls
    JobPollingWait,
    /// Rehydrating a previously submitted job
    RestoreJob,
    /// Job reached a terminal status
    Done,
}

impl RootState {
    pub fn tags(&self) -> &'static [StateTag] {
        match self {
            Self::StartUpdate | Self::JobSubmission | Self::RestoreJob => &[StateTag::Loading],
            _ => &[],
        }
    }

    pub fn has_tag(&self, tag: StateTag) -> bool {
        self.tags().contains(&tag)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// States belonging to the submission/polling sub-workflow
    pub fn is_job_phase(&self) -> bool {
        matches!(
            self,
            Self::JobSubmission | Self::JobPolling | Self::JobPollingWait | Self::Done
        )
    }
}

impl fmt::Display for RootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::StartUpdate => write!(f, "startUpdate"),
            Self::FileSelection => write!(f, "fileSelection"),
            Self::JobSubmission => write!(f, "jobSubmission"),
            Self::JobPolling => write!(f, "jobPolling"),
            Self::JobPollingWait => write!(f, "jobPollingWait"),
            Self::RestoreJob => write!(f, "restoreJob"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Substates of the automatic discovery branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AutoState {
    Idle,
    SelectingPrimary,
    FetchingProductOutline,
    CheckingShapeMetadata,
}

/// Substates of the manual per-file branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ManualState {
    Idle,
    SelectingPrimary,
    SelectingProductOutline,
    SelectingShapeMetadata,
}

/// States of the file-selection child actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "branch", content = "state", rename_all = "camelCase")]
pub enum FileSelectionState {
    /// Transient: branches on the selection mode it was started with
    SelectionModeDecision,
    Auto(AutoState),
    Manual(ManualState),
}

impl FileSelectionState {
    pub fn tags(&self) -> &'static [StateTag] {
        match self {
            Self::SelectionModeDecision
            | Self::Auto(AutoState::Idle)
            | Self::Manual(ManualState::Idle) => &[],
            Self::Auto(_) | Self::Manual(_) => &[StateTag::Loading],
        }
    }

    pub fn has_tag(&self, tag: StateTag) -> bool {
        self.tags().contains(&tag)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Auto(AutoState::Idle) | Self::Manual(ManualState::Idle))
    }
}

impl fmt::Display for FileSelectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectionModeDecision => write!(f, "selectionModeDecision"),
            Self::Auto(state) => {
                let name = match state {
                    AutoState::Idle => "idle",
                    AutoState::SelectingPrimary => "selectingPrimary",
                    AutoState::FetchingProductOutline => "fetchingProductOutline",
                    AutoState::CheckingShapeMetadata => "checkingShapeMetadata",
                };
                write!(f, "auto.{name}")
            }
            Self::Manual(state) => {
                let name = match state {
                    ManualState::Idle => "idle",
                    ManualState::SelectingPrimary => "selectingPrimary",
                    ManualState::SelectingProductOutline => "selectingProductOutline",
                    ManualState::SelectingShapeMetadata => "selectingShapeMetadata",
                };
                write!(f, "manual.{name}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loading_tags() {
        assert!(RootState::StartUpdate.has_tag(StateTag::Loading));
        assert!(RootState::JobSubmission.has_tag(StateTag::Loading));
        assert!(RootState::RestoreJob.has_tag(StateTag::Loading));
        assert!(!RootState::Idle.has_tag(StateTag::Loading));
        assert!(!RootState::JobPollingWait.has_tag(StateTag::Loading));

        assert!(FileSelectionState::Auto(AutoState::FetchingProductOutline).has_tag(StateTag::Loading));
        assert!(!FileSelectionState::Manual(ManualState::Idle).has_tag(StateTag::Loading));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(RootState::JobPollingWait.to_string(), "jobPollingWait");
        assert_eq!(
            FileSelectionState::Auto(AutoState::CheckingShapeMetadata).to_string(),
            "auto.checkingShapeMetadata"
        );
        assert_eq!(
            FileSelectionState::Manual(ManualState::SelectingPrimary).to_string(),
            "manual.selectingPrimary"
        );
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&RootState::RestoreJob).unwrap();
        assert_eq!(json, "\"restoreJob\"");
        let json = serde_json::to_value(FileSelectionState::Auto(AutoState::Idle)).unwrap();
        assert_eq!(json, serde_json::json!({"branch": "auto", "state": "idle"}));
    }
}
