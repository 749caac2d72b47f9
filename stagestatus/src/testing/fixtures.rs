//! Pipeline fixtures.

use std::sync::Arc;

use crate::collection::StatusCollection;
use crate::config::StatusConfig;
use crate::core::{JobId, JobStatus, JobStatusRow, PipelineId};
use crate::snapshot::InMemoryStatusSource;

/// Declares a pipeline job by job; ids are assigned in declaration order.
#[derive(Debug, Clone)]
pub struct PipelineFixture {
    pipeline: PipelineId,
    rows: Vec<JobStatusRow>,
    config: StatusConfig,
}

impl Default for PipelineFixture {
    fn default() -> Self {
        Self::new(PipelineId(1))
    }
}

impl PipelineFixture {
    /// Creates an empty fixture.
    #[must_use]
    pub fn new(pipeline: PipelineId) -> Self {
        Self {
            pipeline,
            rows: Vec::new(),
            config: StatusConfig::default(),
        }
    }

    fn next_id(&self) -> u64 {
        self.rows.len() as u64 + 1
    }

    /// Adds a job that must not fail.
    #[must_use]
    pub fn job(self, name: &str, status: JobStatus, stage_position: u32) -> Self {
        let row = JobStatusRow::new(self.next_id(), name, status, stage_position);
        self.with_row(row)
    }

    /// Adds a job that is allowed to fail.
    #[must_use]
    pub fn allowed_failure(self, name: &str, status: JobStatus, stage_position: u32) -> Self {
        let row = JobStatusRow::new(self.next_id(), name, status, stage_position)
            .with_allow_failure(true);
        self.with_row(row)
    }

    /// Adds a prepared row.
    #[must_use]
    pub fn with_row(mut self, row: JobStatusRow) -> Self {
        self.rows.push(row);
        self
    }

    /// Sets the configuration used by [`Self::collection`].
    #[must_use]
    pub fn with_config(mut self, config: StatusConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the pipeline id.
    #[must_use]
    pub fn pipeline(&self) -> PipelineId {
        self.pipeline
    }

    /// Returns the declared rows.
    #[must_use]
    pub fn rows(&self) -> &[JobStatusRow] {
        &self.rows
    }

    /// Returns the id of a declared job.
    ///
    /// # Panics
    ///
    /// Panics if no job has that name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> JobId {
        self.rows
            .iter()
            .find(|row| row.name == name)
            .map(|row| row.id)
            .unwrap_or_else(|| panic!("no job named '{name}' in fixture"))
    }

    /// Returns an in-memory source serving the rows.
    #[must_use]
    pub fn source(&self) -> InMemoryStatusSource {
        InMemoryStatusSource::new().with_pipeline(self.pipeline, self.rows.clone())
    }

    /// Returns a collection over the rows.
    #[must_use]
    pub fn collection(&self) -> StatusCollection {
        StatusCollection::new(
            self.pipeline,
            Arc::new(self.source()),
            Arc::new(self.config.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_assigns_ids() {
        let fixture = PipelineFixture::default()
            .job("build", JobStatus::Success, 0)
            .allowed_failure("lint", JobStatus::Failed, 1);

        assert_eq!(fixture.id_of("build"), JobId(1));
        assert_eq!(fixture.id_of("lint"), JobId(2));
        assert!(fixture.rows()[1].allow_failure);
    }

    #[test]
    fn test_fixture_collection_loads_rows() {
        let mut collection = PipelineFixture::default()
            .job("build", JobStatus::Failed, 0)
            .collection();

        assert_eq!(collection.composite_of_all().unwrap(), JobStatus::Failed);
    }
}
