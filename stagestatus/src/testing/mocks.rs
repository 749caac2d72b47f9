//! Mock sources and hooks for testing.

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::composite::CompositeStatus;
use crate::core::{ChangeToken, JobId, JobStatus, JobStatusRow, PipelineId};
use crate::errors::SourceError;
use crate::processing::{ProcessingHooks, Scheduling, StatusUpdate};
use crate::snapshot::{InMemoryStatusSource, StatusSource};

/// A source that counts how often it is asked for rows.
#[derive(Debug, Default)]
pub struct CountingStatusSource {
    inner: InMemoryStatusSource,
    fetches: Mutex<usize>,
}

impl CountingStatusSource {
    /// Wraps an in-memory source.
    #[must_use]
    pub fn new(inner: InMemoryStatusSource) -> Self {
        Self {
            inner,
            fetches: Mutex::new(0),
        }
    }

    /// Returns the number of fetches so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock()
    }
}

impl StatusSource for CountingStatusSource {
    fn fetch_rows(&self, pipeline: &PipelineId) -> Result<Vec<JobStatusRow>, SourceError> {
        *self.fetches.lock() += 1;
        self.inner.fetch_rows(pipeline)
    }
}

/// A source whose store is always unreachable.
#[derive(Debug, Default)]
pub struct FailingStatusSource {
    reason: String,
    fetches: Mutex<usize>,
}

impl FailingStatusSource {
    /// Creates a failing source.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            fetches: Mutex::new(0),
        }
    }

    /// Returns the number of fetch attempts so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock()
    }
}

impl StatusSource for FailingStatusSource {
    fn fetch_rows(&self, _pipeline: &PipelineId) -> Result<Vec<JobStatusRow>, SourceError> {
        *self.fetches.lock() += 1;
        Err(SourceError::unreachable(self.reason.clone()))
    }
}

/// How [`RecordingHooks`] reacts to a released job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// Enqueue on success, skip on failure, wait otherwise.
    #[default]
    OnSuccess,
    /// Never change the job.
    Hold,
    /// Fail the hook call.
    Error,
}

/// Processing hooks that record every call.
#[derive(Debug, Default)]
pub struct RecordingHooks {
    scheduling: HashMap<JobId, Scheduling>,
    policy: ReleasePolicy,
    stale: HashSet<JobId>,
    next_token: u64,
    /// `(job, dependency status)` for every release offer.
    pub releases: Vec<(JobId, JobStatus)>,
    /// Persisted stage composites.
    pub stage_statuses: BTreeMap<u32, JobStatus>,
    /// Persisted pipeline composites, in call order.
    pub pipeline_statuses: Vec<CompositeStatus>,
    /// Sizes of the processed-marking batches.
    pub processed_batches: Vec<usize>,
    /// Ids confirmed as processed.
    pub processed: Vec<JobId>,
}

impl RecordingHooks {
    /// Creates hooks with the on-success policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_token: 100,
            ..Self::default()
        }
    }

    /// Sets the release policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ReleasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Declares DAG needs for a job.
    #[must_use]
    pub fn with_needs(mut self, id: JobId, needs: &[&str]) -> Self {
        self.scheduling.insert(
            id,
            Scheduling::Dag {
                needs: needs.iter().map(ToString::to_string).collect(),
            },
        );
        self
    }

    /// Makes a row's change token stale so it is never marked processed.
    #[must_use]
    pub fn with_stale(mut self, id: JobId) -> Self {
        self.stale.insert(id);
        self
    }
}

#[async_trait]
impl ProcessingHooks for RecordingHooks {
    fn scheduling(&self, id: JobId) -> Scheduling {
        self.scheduling.get(&id).cloned().unwrap_or_default()
    }

    async fn release(
        &mut self,
        id: JobId,
        dependency_status: JobStatus,
    ) -> anyhow::Result<Option<StatusUpdate>> {
        self.releases.push((id, dependency_status));
        let status = match (self.policy, dependency_status) {
            (ReleasePolicy::Error, _) => bail!("cannot release job {id}"),
            (ReleasePolicy::Hold, _) => return Ok(None),
            (ReleasePolicy::OnSuccess, JobStatus::Success) => JobStatus::Pending,
            (ReleasePolicy::OnSuccess, JobStatus::Failed | JobStatus::Canceled) => JobStatus::Skipped,
            (ReleasePolicy::OnSuccess, _) => return Ok(None),
        };
        self.next_token += 1;
        Ok(Some(StatusUpdate {
            status,
            token: ChangeToken(self.next_token),
        }))
    }

    async fn persist_stage_status(&mut self, position: u32, status: JobStatus) -> anyhow::Result<()> {
        self.stage_statuses.insert(position, status);
        Ok(())
    }

    async fn persist_pipeline_status(&mut self, status: CompositeStatus) -> anyhow::Result<()> {
        self.pipeline_statuses.push(status);
        Ok(())
    }

    async fn mark_processed(&mut self, batch: &[(JobId, ChangeToken)]) -> anyhow::Result<Vec<JobId>> {
        self.processed_batches.push(batch.len());
        let confirmed: Vec<JobId> = batch
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| !self.stale.contains(id))
            .collect();
        self.processed.extend(confirmed.iter().copied());
        Ok(confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_source() {
        let source = CountingStatusSource::new(InMemoryStatusSource::new());
        assert_eq!(source.fetch_count(), 0);
        source.fetch_rows(&PipelineId(1)).unwrap();
        assert_eq!(source.fetch_count(), 1);
    }

    #[test]
    fn test_failing_source() {
        let source = FailingStatusSource::new("offline");
        assert!(source.fetch_rows(&PipelineId(1)).is_err());
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_on_success_policy() {
        let mut hooks = RecordingHooks::new();

        let enqueued = hooks.release(JobId(1), JobStatus::Success).await.unwrap();
        assert_eq!(enqueued.map(|u| u.status), Some(JobStatus::Pending));

        let skipped = hooks.release(JobId(2), JobStatus::Failed).await.unwrap();
        assert_eq!(skipped.map(|u| u.status), Some(JobStatus::Skipped));

        assert!(hooks.release(JobId(3), JobStatus::Running).await.unwrap().is_none());
        assert_eq!(hooks.releases.len(), 3);
    }

    #[tokio::test]
    async fn test_stale_rows_not_confirmed() {
        let mut hooks = RecordingHooks::new().with_stale(JobId(2));
        let confirmed = hooks
            .mark_processed(&[(JobId(1), ChangeToken(0)), (JobId(2), ChangeToken(0))])
            .await
            .unwrap();
        assert_eq!(confirmed, vec![JobId(1)]);
    }
}
