//! Per-job projection used for aggregation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::JobStatus;

/// Opaque job identifier, unique within a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Opaque pipeline reference handed to the row source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineId(pub u64);

impl fmt::Display for PipelineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pipeline #{}", self.0)
    }
}

/// Version marker advanced on every status update of a job.
///
/// Only used to detect stale rows; never compared for ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeToken(pub u64);

/// The `(status, allow_failure)` pair consumed by the composite resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusEntry {
    /// The job status.
    pub status: JobStatus,
    /// Whether a failure of this job may be ignored.
    pub allow_failure: bool,
}

impl StatusEntry {
    /// Creates an entry that must not fail.
    #[must_use]
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            allow_failure: false,
        }
    }

    /// Creates an entry that is allowed to fail.
    #[must_use]
    pub fn allowed_to_fail(status: JobStatus) -> Self {
        Self {
            status,
            allow_failure: true,
        }
    }
}

/// One job's aggregation-relevant projection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusRow {
    /// Job identifier.
    pub id: JobId,
    /// Job name, used for dependency lookups.
    pub name: String,
    /// Current status.
    pub status: JobStatus,
    /// Whether the job may fail without failing its composites.
    #[serde(default)]
    pub allow_failure: bool,
    /// Position of the job's stage; lower runs earlier.
    pub stage_position: u32,
    /// Whether the row was already folded into a persisted composite.
    #[serde(default)]
    pub processed: bool,
    /// Staleness marker.
    #[serde(default)]
    pub change_token: ChangeToken,
}

impl JobStatusRow {
    /// Creates a new unprocessed row.
    #[must_use]
    pub fn new(
        id: impl Into<JobId>,
        name: impl Into<String>,
        status: JobStatus,
        stage_position: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            allow_failure: false,
            stage_position,
            processed: false,
            change_token: ChangeToken::default(),
        }
    }

    /// Sets the allow-failure flag.
    #[must_use]
    pub fn with_allow_failure(mut self, allow_failure: bool) -> Self {
        self.allow_failure = allow_failure;
        self
    }

    /// Sets the processed flag.
    #[must_use]
    pub fn with_processed(mut self, processed: bool) -> Self {
        self.processed = processed;
        self
    }

    /// Sets the change token.
    #[must_use]
    pub fn with_change_token(mut self, token: ChangeToken) -> Self {
        self.change_token = token;
        self
    }

    /// Projects the row onto the pair the resolver needs.
    #[must_use]
    pub fn entry(&self) -> StatusEntry {
        StatusEntry {
            status: self.status,
            allow_failure: self.allow_failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_row_builder() {
        let row = JobStatusRow::new(7, "rspec", JobStatus::Running, 2)
            .with_allow_failure(true)
            .with_change_token(ChangeToken(3));

        assert_eq!(row.id, JobId(7));
        assert_eq!(row.stage_position, 2);
        assert!(!row.processed);
        assert_eq!(row.entry(), StatusEntry::allowed_to_fail(JobStatus::Running));
    }

    #[test]
    fn test_row_deserialize_defaults() {
        let row: JobStatusRow = serde_json::from_str(
            r#"{"id": 1, "name": "build", "status": "pending", "stage_position": 0}"#,
        )
        .unwrap();

        assert_eq!(row, JobStatusRow::new(1, "build", JobStatus::Pending, 0));
    }

    #[test]
    fn test_negative_stage_position_rejected() {
        let result: Result<JobStatusRow, _> = serde_json::from_str(
            r#"{"id": 1, "name": "build", "status": "pending", "stage_position": -1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pipeline_id_display() {
        assert_eq!(PipelineId(42).to_string(), "pipeline #42");
    }
}
