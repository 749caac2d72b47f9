//! Summary of a processing pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::composite::CompositeStatus;
use crate::core::{JobId, JobStatus, PipelineId};

/// What a processing pass did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    /// Identifier of the run.
    pub run_id: Uuid,
    /// The processed pipeline.
    pub pipeline: PipelineId,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// Wall time in milliseconds.
    pub duration_ms: f64,
    /// Jobs whose status the releaser changed, in release order.
    pub released: Vec<JobId>,
    /// Persisted composite of each stage.
    pub stage_statuses: BTreeMap<u32, JobStatus>,
    /// Persisted composite of the pipeline.
    pub pipeline_status: Option<CompositeStatus>,
    /// Rows marked processed.
    pub processed: usize,
}

impl ProcessingReport {
    /// Starts a report for a run.
    #[must_use]
    pub fn new(run_id: Uuid, pipeline: PipelineId) -> Self {
        Self {
            run_id,
            pipeline,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0.0,
            released: Vec::new(),
            stage_statuses: BTreeMap::new(),
            pipeline_status: None,
            processed: 0,
        }
    }

    /// Stamps the end of the run.
    pub fn finish(&mut self, duration_ms: f64) {
        self.finished_at = Some(Utc::now());
        self.duration_ms = duration_ms;
    }

    /// Returns true once the run finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lifecycle() {
        let mut report = ProcessingReport::new(Uuid::new_v4(), PipelineId(3));
        assert!(!report.is_finished());

        report.finish(12.5);
        assert!(report.is_finished());
        assert!(report.finished_at.unwrap() >= report.started_at);
        assert_eq!(report.duration_ms, 12.5);
    }

    #[test]
    fn test_report_serializes_stage_keys() {
        let mut report = ProcessingReport::new(Uuid::nil(), PipelineId(3));
        report.stage_statuses.insert(1, JobStatus::Running);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["stage_statuses"]["1"], "running");
        assert_eq!(value["pipeline"], 3);
    }
}
