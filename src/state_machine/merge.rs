//! # Context Merge
//!
//! The one place that decides how `SET_FILES` payloads combine with the
//! file set the orchestrator already holds.
//!
//! `Merge` combines descriptors of the same file key by key: scalars and present optional
//! values from the incoming descriptor win, absent optional values keep
//! what was there, and `details` is merged field by field. The keys listed
//! in [`REPLACED_WHOLESALE`] are the exception: they are always taken from
//! the incoming descriptor, even when absent there, because a partially
//! merged geometry is meaningless. A descriptor for a different path
//! replaces the existing one outright.
//!
//! `Override` replaces the whole file set.

use crate::models::{FileDescriptor, FileDetails, FileSet, FileSlot, MergePolicy};

/// Descriptor keys never merged field by field
pub const REPLACED_WHOLESALE: &[&str] = &["derivedGeometry"];

/// Apply a `SET_FILES` payload to `current`.
pub fn apply_file_set(current: &FileSet, incoming: &FileSet, policy: MergePolicy) -> FileSet {
    match policy {
        MergePolicy::Override => incoming.clone(),
        MergePolicy::Merge => {
            let mut merged = current.clone();
            for slot in FileSlot::ALL {
                if let Some(update) = incoming.slot(slot) {
                    let next = match current.slot(slot) {
                        Some(existing) => merge_descriptor(existing, update),
                        None => update.clone(),
                    };
                    *merged.slot_mut(slot) = Some(next);
                }
            }
            merged
        }
    }
}

pub fn merge_descriptor(existing: &FileDescriptor, incoming: &FileDescriptor) -> FileDescriptor {
    if existing.path != incoming.path {
        return incoming.clone();
    }
    FileDescriptor {
        label: incoming.label.clone(),
        path: incoming.path.clone(),
        exists: incoming.exists,
        details: merge_details(existing.details.as_ref(), incoming.details.as_ref()),
        validation: incoming
            .validation
            .clone()
            .or_else(|| existing.validation.clone()),
        // see REPLACED_WHOLESALE
        derived_geometry: incoming.derived_geometry.clone(),
    }
}

fn merge_details(existing: Option<&FileDetails>, incoming: Option<&FileDetails>) -> Option<FileDetails> {
    match (existing, incoming) {
        (None, None) => None,
        (Some(existing), None) => Some(existing.clone()),
        (None, Some(incoming)) => Some(incoming.clone()),
        (Some(existing), Some(incoming)) => Some(FileDetails {
            size: incoming.size.or(existing.size),
            last_modified: incoming.last_modified.or(existing.last_modified),
        }),
    }
}
