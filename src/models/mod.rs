//! # Domain Models
//!
//! Plain data types shared by the services and the state machines.

pub mod context;
pub mod error_entry;
pub mod file;
pub mod geometry;
pub mod job;

pub use context::{FlowKind, FormData, OrchestratorContext, SelectionMode};
pub use error_entry::{accumulate, ErrorEntry, ErrorLevel, ErrorSource, MergePolicy};
pub use file::{
    build_found_descriptor, build_missing_descriptor, is_file_set_complete, FileDescriptor,
    FileDetails, FileLabels, FileSet, FileSlot, ValidationResult,
};
pub use geometry::{BoundingBox, DerivedGeometry, Geometry, Position};
pub use job::{JobHandle, JobProgress, JobStatus};
