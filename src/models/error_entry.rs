use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Where an error originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    /// Service or transport failure carrying a diagnostic payload
    Api,
    /// Client-side validation or business-rule failure
    Logic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorLevel {
    Error,
    Warning,
}

/// How an incoming value combines with what is already held.
///
/// Shared by error accumulation and by `SET_FILES` context updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    #[default]
    Merge,
    Override,
}

/// A single error surfaced to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    pub source: ErrorSource,
    pub level: ErrorLevel,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub merge_policy: MergePolicy,
    /// Opaque diagnostic payload returned by the failing service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl ErrorEntry {
    pub fn logic(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: ErrorSource::Logic,
            level: ErrorLevel::Error,
            code: code.into(),
            message: message.into(),
            field: None,
            merge_policy: MergePolicy::Merge,
            response: None,
        }
    }

    pub fn api(code: impl Into<String>, message: impl Into<String>, response: Value) -> Self {
        Self {
            source: ErrorSource::Api,
            response: Some(response),
            ..Self::logic(code, message)
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_policy(mut self, merge_policy: MergePolicy) -> Self {
        self.merge_policy = merge_policy;
        self
    }

    pub fn as_warning(mut self) -> Self {
        self.level = ErrorLevel::Warning;
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == ErrorLevel::Error
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Fold a new error into the current list.
///
/// `Override` replaces the list wholesale, `Merge` appends.
pub fn accumulate(current: &[ErrorEntry], new_error: ErrorEntry) -> Vec<ErrorEntry> {
    match new_error.merge_policy {
        MergePolicy::Override => vec![new_error],
        MergePolicy::Merge => {
            let mut errors = Vec::with_capacity(current.len() + 1);
            errors.extend_from_slice(current);
            errors.push(new_error);
            errors
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_appends() {
        let first = ErrorEntry::logic("a", "first");
        let second = ErrorEntry::logic("b", "second");

        let errors = accumulate(&[], first.clone());
        let errors = accumulate(&errors, second.clone());

        assert_eq!(errors, vec![first, second]);
    }

    #[test]
    fn test_override_replaces_everything() {
        let errors = vec![ErrorEntry::logic("a", "one"), ErrorEntry::logic("b", "two")];
        let replacement = ErrorEntry::logic("c", "three").with_policy(MergePolicy::Override);

        let errors = accumulate(&errors, replacement.clone());

        assert_eq!(errors, vec![replacement]);
    }

    #[test]
    fn test_api_entry_keeps_response() {
        let entry = ErrorEntry::api("x", "boom", serde_json::json!({"status": 500}));
        assert_eq!(entry.source, ErrorSource::Api);
        assert_eq!(entry.response, Some(serde_json::json!({"status": 500})));
        assert!(entry.is_error());
        assert!(!entry.as_warning().is_error());
    }

    #[test]
    fn test_error_entry_serde_shape() {
        let entry = ErrorEntry::logic("code", "msg").with_field("path");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["source"], "logic");
        assert_eq!(json["mergePolicy"], "merge");
        assert_eq!(json["field"], "path");
        assert!(json.get("response").is_none());
    }
}
