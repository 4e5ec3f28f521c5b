//! # File Descriptor Model
//!
//! Value objects describing the files an ingestion references, and the
//! [`FileSet`] aggregate holding the three named slots.
//!
//! Everything here is pure: the file-selection actor performs the I/O and
//! builds descriptors from the results.

use super::geometry::{DerivedGeometry, Geometry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Size and modification time as reported by a directory listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileDetails {
    pub fn new(size: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            size: Some(size),
            last_modified: Some(last_modified),
        }
    }
}

/// Outcome of validating the primary data file. Never mutated once attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent_polygon: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f64>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            message: None,
            extent_polygon: None,
            resolution: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            message: Some(message.into()),
            ..Self::valid()
        }
    }
}

/// A referenced file, present or not
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub label: String,
    pub path: String,
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<FileDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_geometry: Option<DerivedGeometry>,
}

impl FileDescriptor {
    pub fn with_validation(mut self, validation: ValidationResult) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn with_geometry(mut self, derived_geometry: Option<DerivedGeometry>) -> Self {
        self.derived_geometry = derived_geometry;
        self
    }

    /// Present on disk and with a usable path
    pub fn is_present(&self) -> bool {
        self.exists && !self.path.is_empty()
    }

    /// Present and carrying a successful validation
    pub fn is_validated(&self) -> bool {
        self.is_present() && self.validation.as_ref().is_some_and(|v| v.is_valid)
    }
}

pub fn build_missing_descriptor(label: impl Into<String>) -> FileDescriptor {
    FileDescriptor {
        label: label.into(),
        path: String::new(),
        exists: false,
        details: None,
        validation: None,
        derived_geometry: None,
    }
}

pub fn build_found_descriptor(
    label: impl Into<String>,
    path: impl Into<String>,
    details: Option<FileDetails>,
) -> FileDescriptor {
    FileDescriptor {
        label: label.into(),
        path: path.into(),
        exists: true,
        details,
        validation: None,
        derived_geometry: None,
    }
}

/// The three named file slots of an ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileSlot {
    PrimaryData,
    ProductOutline,
    ShapeMetadata,
}

impl FileSlot {
    pub const ALL: [FileSlot; 3] = [
        FileSlot::PrimaryData,
        FileSlot::ProductOutline,
        FileSlot::ShapeMetadata,
    ];
}

impl fmt::Display for FileSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PrimaryData => write!(f, "primaryData"),
            Self::ProductOutline => write!(f, "productOutline"),
            Self::ShapeMetadata => write!(f, "shapeMetadata"),
        }
    }
}

/// Labels used when building descriptors for each slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLabels {
    pub primary_data: String,
    pub product_outline: String,
    pub shape_metadata: String,
}

impl Default for FileLabels {
    fn default() -> Self {
        use crate::constants::labels;
        Self {
            primary_data: labels::PRIMARY_DATA.to_string(),
            product_outline: labels::PRODUCT_OUTLINE.to_string(),
            shape_metadata: labels::SHAPE_METADATA.to_string(),
        }
    }
}

impl FileLabels {
    pub fn for_slot(&self, slot: FileSlot) -> &str {
        match slot {
            FileSlot::PrimaryData => &self.primary_data,
            FileSlot::ProductOutline => &self.product_outline,
            FileSlot::ShapeMetadata => &self.shape_metadata,
        }
    }
}

/// Aggregate of the files an ingestion needs.
///
/// Also used as the payload of `SET_FILES`, where an absent slot means
/// "untouched".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_data: Option<FileDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_outline: Option<FileDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_metadata: Option<FileDescriptor>,
}

impl FileSet {
    /// All three slots present but missing, labels taken from `labels`
    pub fn missing(labels: &FileLabels) -> Self {
        Self {
            primary_data: Some(build_missing_descriptor(&labels.primary_data)),
            product_outline: Some(build_missing_descriptor(&labels.product_outline)),
            shape_metadata: Some(build_missing_descriptor(&labels.shape_metadata)),
        }
    }

    /// A set touching only `slot`
    pub fn single(slot: FileSlot, descriptor: FileDescriptor) -> Self {
        let mut set = Self::default();
        *set.slot_mut(slot) = Some(descriptor);
        set
    }

    pub fn slot(&self, slot: FileSlot) -> Option<&FileDescriptor> {
        match slot {
            FileSlot::PrimaryData => self.primary_data.as_ref(),
            FileSlot::ProductOutline => self.product_outline.as_ref(),
            FileSlot::ShapeMetadata => self.shape_metadata.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: FileSlot) -> &mut Option<FileDescriptor> {
        match slot {
            FileSlot::PrimaryData => &mut self.primary_data,
            FileSlot::ProductOutline => &mut self.product_outline,
            FileSlot::ShapeMetadata => &mut self.shape_metadata,
        }
    }

    /// Reset every slot to "missing", keeping whatever label it already had.
    pub fn reset(&self, labels: &FileLabels) -> Self {
        let mut reset = Self::default();
        for slot in FileSlot::ALL {
            let label = self
                .slot(slot)
                .map(|d| d.label.clone())
                .unwrap_or_else(|| labels.for_slot(slot).to_string());
            *reset.slot_mut(slot) = Some(build_missing_descriptor(label));
        }
        reset
    }

    pub fn is_complete(&self) -> bool {
        is_file_set_complete(self)
    }
}

/// Complete iff every slot is present, exists and has a non-empty path.
pub fn is_file_set_complete(file_set: &FileSet) -> bool {
    FileSlot::ALL
        .iter()
        .all(|slot| file_set.slot(*slot).is_some_and(FileDescriptor::is_present))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_set() -> FileSet {
        FileSet {
            primary_data: Some(build_found_descriptor("p", "/data/a.gpkg", None)),
            product_outline: Some(build_found_descriptor("o", "/data/Product.shp", None)),
            shape_metadata: Some(build_found_descriptor("m", "/data/ShapeMetadata.shp", None)),
        }
    }

    #[test]
    fn test_complete_requires_all_three_slots() {
        assert!(is_file_set_complete(&complete_set()));

        let mut set = complete_set();
        set.shape_metadata = None;
        assert!(!is_file_set_complete(&set));
    }

    #[test]
    fn test_missing_or_pathless_slot_is_incomplete() {
        let mut set = complete_set();
        set.product_outline = Some(build_missing_descriptor("o"));
        assert!(!set.is_complete());

        let mut set = complete_set();
        set.primary_data = Some(build_found_descriptor("p", "", None));
        assert!(!set.is_complete());
    }

    #[test]
    fn test_reset_preserves_labels() {
        let reset = complete_set().reset(&FileLabels::default());
        for slot in FileSlot::ALL {
            let descriptor = reset.slot(slot).unwrap();
            assert!(!descriptor.exists);
            assert!(descriptor.path.is_empty());
        }
        assert_eq!(reset.primary_data.unwrap().label, "p");
        assert_eq!(FileSet::default().reset(&FileLabels::default()).shape_metadata.unwrap().label,
            crate::constants::labels::SHAPE_METADATA);
    }

    #[test]
    fn test_validated_needs_valid_result() {
        let found = build_found_descriptor("p", "/a.gpkg", None);
        assert!(!found.is_validated());
        assert!(!found.clone().with_validation(ValidationResult::invalid("bad")).is_validated());
        assert!(found.with_validation(ValidationResult::valid()).is_validated());
    }
}
