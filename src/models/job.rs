use crate::constants::status_groups;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Status reported by the job service.
///
/// Parsing is lenient about case and separators, so `InProgress`,
/// `In-Progress` and `in_progress` are all [`JobStatus::InProgress`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    InProgress,
    Suspended,
    Completed,
    Failed,
    Aborted,
    Expired,
    /// Any status this crate does not know about; treated as terminal
    Other(String),
}

impl JobStatus {
    /// Anything other than pending, in-progress or suspended
    pub fn is_terminal(&self) -> bool {
        !status_groups::TRANSIENT.contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::InProgress => write!(f, "In-Progress"),
            Self::Suspended => write!(f, "Suspended"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
            Self::Aborted => write!(f, "Aborted"),
            Self::Expired => write!(f, "Expired"),
            Self::Other(status) => write!(f, "{status}"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .flat_map(char::to_lowercase)
            .collect();
        Ok(match normalized.as_str() {
            "pending" => Self::Pending,
            "inprogress" => Self::InProgress,
            "suspended" => Self::Suspended,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "aborted" => Self::Aborted,
            "expired" => Self::Expired,
            _ => Self::Other(s.to_string()),
        })
    }
}

impl Serialize for JobStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_else(|never| match never {}))
    }
}

/// Result of a single poll of the job service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub percentage: Option<u8>,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_report: Option<Value>,
}

/// The orchestrator's view of a submitted job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobHandle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_report: Option<Value>,
}

impl JobHandle {
    pub fn for_job(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Self::default()
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.as_ref().is_some_and(JobStatus::is_terminal)
    }

    /// Apply a poll result, producing the next snapshot.
    ///
    /// A handle that already reached a terminal status is returned unchanged.
    pub fn advanced(&self, progress: JobProgress) -> Self {
        if self.is_terminal() {
            return self.clone();
        }
        Self {
            job_id: self.job_id.clone(),
            task_id: progress.task_id.or_else(|| self.task_id.clone()),
            percentage: progress.percentage.or(self.percentage),
            status: Some(progress.status),
            validation_report: progress
                .validation_report
                .or_else(|| self.validation_report.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!("InProgress".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert_eq!("In-Progress".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert_eq!("in_progress".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert_eq!("COMPLETED".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert_eq!(
            "Rolled-Back".parse::<JobStatus>().unwrap(),
            JobStatus::Other("Rolled-Back".to_string())
        );
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(!JobStatus::Suspended.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Aborted.is_terminal());
        assert!(JobStatus::Expired.is_terminal());
        assert!(JobStatus::Other("weird".into()).is_terminal());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"In-Progress\"");
        let parsed: JobStatus = serde_json::from_str("\"Completed\"").unwrap();
        assert_eq!(parsed, JobStatus::Completed);
    }

    #[test]
    fn test_advanced_is_frozen_after_terminal() {
        let handle = JobHandle::for_job("J1").advanced(JobProgress {
            percentage: Some(100),
            status: JobStatus::Completed,
            task_id: Some("T1".into()),
            validation_report: None,
        });
        let again = handle.advanced(JobProgress {
            percentage: Some(3),
            status: JobStatus::InProgress,
            task_id: None,
            validation_report: None,
        });
        assert_eq!(again, handle);
        assert_eq!(again.job_id.as_deref(), Some("J1"));
        assert_eq!(again.task_id.as_deref(), Some("T1"));
    }
}
