//! Events published while processing a pipeline.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use serde::{Deserialize, Serialize};

use crate::core::{JobId, JobStatus, PipelineId};

/// Event type of [`StatusEvent::JobReleased`].
pub const JOB_RELEASED: &str = "job.released";
/// Event type of [`StatusEvent::StageResolved`].
pub const STAGE_STATUS_RESOLVED: &str = "stage.status_resolved";
/// Event type of [`StatusEvent::PipelineResolved`].
pub const PIPELINE_STATUS_RESOLVED: &str = "pipeline.status_resolved";

/// Something a processing pass decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// A created job was handed to the releaser and changed status.
    JobReleased {
        /// The pipeline.
        pipeline: PipelineId,
        /// The released job.
        job_id: JobId,
        /// Composite of the job's dependencies at release time.
        dependency_status: JobStatus,
        /// The job's new status.
        status: JobStatus,
    },
    /// A stage composite was persisted.
    StageResolved {
        /// The pipeline.
        pipeline: PipelineId,
        /// The stage.
        stage_position: u32,
        /// The stage composite.
        status: JobStatus,
    },
    /// The pipeline composite was persisted.
    PipelineResolved {
        /// The pipeline.
        pipeline: PipelineId,
        /// The pipeline composite.
        status: JobStatus,
        /// Whether allowed failures were absorbed.
        warnings: bool,
    },
}

impl StatusEvent {
    /// Returns the dotted event type.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::JobReleased { .. } => JOB_RELEASED,
            Self::StageResolved { .. } => STAGE_STATUS_RESOLVED,
            Self::PipelineResolved { .. } => PIPELINE_STATUS_RESOLVED,
        }
    }

    /// Returns the event as a JSON payload.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
