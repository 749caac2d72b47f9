//! Core domain model types for stagestatus.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Job status and aggregation discipline enums
//! - The per-job row projection and its identifiers

mod row;
mod status;

pub use row::{ChangeToken, JobId, JobStatusRow, PipelineId, StatusEntry};
pub use status::{Discipline, JobStatus, UnknownStatusError};
