use super::error_entry::{accumulate, ErrorEntry};
use super::file::FileSet;
use super::job::JobHandle;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Free-form layer metadata entered by the user
pub type FormData = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    /// Brand-new ingestion
    #[default]
    New,
    /// Update of an existing layer
    Update,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Update => write!(f, "update"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Auto,
    Manual,
    /// Files were rehydrated from an existing job
    Restore,
}

impl fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
            Self::Restore => write!(f, "restore"),
        }
    }
}

impl std::str::FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            "restore" => Ok(Self::Restore),
            _ => Err(format!("Invalid selection mode: {s}")),
        }
    }
}

/// Aggregate root of the ingestion workflow.
///
/// Owned and mutated only by the root orchestrator; everything else sees
/// clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorContext {
    pub flow_kind: FlowKind,
    pub selection_mode: SelectionMode,
    pub file_set: FileSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_data: Option<FormData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobHandle>,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

impl OrchestratorContext {
    pub fn new(flow_kind: FlowKind, selection_mode: SelectionMode, file_set: FileSet) -> Self {
        Self {
            flow_kind,
            selection_mode,
            file_set,
            ..Self::default()
        }
    }

    pub fn record_error(&mut self, error: ErrorEntry) {
        self.errors = accumulate(&self.errors, error);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(ErrorEntry::is_error)
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.as_ref().and_then(|job| job.job_id.as_deref())
    }
}
