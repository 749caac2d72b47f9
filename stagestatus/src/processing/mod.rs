//! Processing passes over a status collection.
//!
//! A pass walks the stages in order. For every `created` job it computes the
//! composite of the job's dependencies and offers the job to
//! [`ProcessingHooks::release`]; the hook decides what the job becomes
//! (enqueued, skipped, left alone) and the collection is updated in place so
//! later stages see the new status. Stage and pipeline composites are then
//! persisted through the hooks, and finally every unprocessed row is handed
//! back in batches to be marked processed.

mod report;

pub use report::ProcessingReport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, Instrument};
use uuid::Uuid;

use crate::collection::StatusCollection;
use crate::composite::CompositeStatus;
use crate::config::StatusConfig;
use crate::core::{ChangeToken, Discipline, JobId, JobStatus};
use crate::errors::ProcessingError;
use crate::events::{EventSink, NoOpEventSink, StatusEvent};
use crate::observability::SpanTimer;

/// Default number of rows per processed-marking call.
pub const DEFAULT_PROCESSED_BATCH_SIZE: usize = 100;

/// How a job's dependencies are determined.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scheduling {
    /// The job waits for every earlier stage.
    #[default]
    Stage,
    /// The job waits for the named jobs only.
    Dag {
        /// Names of the jobs this one needs.
        needs: Vec<String>,
    },
}

/// A status change reported by the releaser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// The job's new status.
    pub status: JobStatus,
    /// The job's new change token.
    pub token: ChangeToken,
}

/// External side of a processing pass.
#[async_trait]
pub trait ProcessingHooks: Send {
    /// Returns how the job's dependencies are determined.
    fn scheduling(&self, id: JobId) -> Scheduling;

    /// Offers a created job whose dependencies resolved to `dependency_status`.
    ///
    /// Returns the job's new status, or `None` if it stays `created`.
    async fn release(
        &mut self,
        id: JobId,
        dependency_status: JobStatus,
    ) -> anyhow::Result<Option<StatusUpdate>>;

    /// Stores the composite of one stage.
    async fn persist_stage_status(&mut self, position: u32, status: JobStatus) -> anyhow::Result<()>;

    /// Stores the composite of the whole pipeline.
    async fn persist_pipeline_status(&mut self, status: CompositeStatus) -> anyhow::Result<()>;

    /// Marks rows processed where their change token still matches.
    ///
    /// Returns the ids actually marked; stale rows are left out.
    async fn mark_processed(&mut self, batch: &[(JobId, ChangeToken)]) -> anyhow::Result<Vec<JobId>>;
}

/// One processing run over a collection.
pub struct ProcessingPass<H> {
    hooks: H,
    sink: Arc<dyn EventSink>,
    batch_size: usize,
}

impl<H: ProcessingHooks> ProcessingPass<H> {
    /// Creates a pass driving `hooks`.
    #[must_use]
    pub fn new(hooks: H) -> Self {
        Self {
            hooks,
            sink: Arc::new(NoOpEventSink),
            batch_size: DEFAULT_PROCESSED_BATCH_SIZE,
        }
    }

    /// Publishes resolved composites to `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the processed-marking batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Applies the processing settings of a configuration.
    #[must_use]
    pub fn with_config(self, config: &StatusConfig) -> Self {
        self.with_batch_size(config.processed_batch_size)
    }

    /// Returns the hooks.
    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Consumes the pass, returning the hooks.
    pub fn into_hooks(self) -> H {
        self.hooks
    }

    /// Runs the pass to completion.
    pub async fn run(
        &mut self,
        collection: &mut StatusCollection,
    ) -> Result<ProcessingReport, ProcessingError> {
        let run_id = Uuid::new_v4();
        let pipeline = collection.pipeline();
        let span = tracing::info_span!("processing_pass", %run_id, %pipeline);
        self.run_inner(run_id, collection).instrument(span).await
    }

    async fn run_inner(
        &mut self,
        run_id: Uuid,
        collection: &mut StatusCollection,
    ) -> Result<ProcessingReport, ProcessingError> {
        let timer = SpanTimer::start("processing_pass");
        let pipeline = collection.pipeline();
        let mut report = ProcessingReport::new(run_id, pipeline);
        info!("Processing pass started");

        collection.load_async().await?;

        for position in collection.stage_positions()? {
            self.process_stage(collection, position, &mut report).await?;
        }

        let status = collection.composite_of_all_detailed()?;
        self.hooks
            .persist_pipeline_status(status)
            .await
            .map_err(|err| ProcessingError::hook("persist_pipeline_status", err))?;
        self.sink
            .emit(StatusEvent::PipelineResolved {
                pipeline,
                status: status.status,
                warnings: status.warnings,
            })
            .await;
        report.pipeline_status = Some(status);

        report.processed = self.mark_processed(collection).await?;
        report.finish(timer.finish());

        info!(
            status = %status.status,
            released = report.released.len(),
            processed = report.processed,
            duration_ms = report.duration_ms,
            "Processing pass finished"
        );
        Ok(report)
    }

    async fn process_stage(
        &mut self,
        collection: &mut StatusCollection,
        position: u32,
        report: &mut ProcessingReport,
    ) -> Result<(), ProcessingError> {
        let pipeline = collection.pipeline();

        for id in collection.created_ids_at_stage_position(position)? {
            let dependency_status = match self.hooks.scheduling(id) {
                Scheduling::Stage => collection.composite_before_stage_position(position)?,
                Scheduling::Dag { needs } if needs.is_empty() => JobStatus::Success,
                Scheduling::Dag { needs } => collection.composite_for_names(&needs, Discipline::Dag)?,
            };

            let update = self
                .hooks
                .release(id, dependency_status)
                .await
                .map_err(|err| ProcessingError::hook("release", err))?;

            if let Some(update) = update {
                collection.set_status(id, update.status, update.token)?;
                report.released.push(id);
                self.sink.try_emit(StatusEvent::JobReleased {
                    pipeline,
                    job_id: id,
                    dependency_status,
                    status: update.status,
                });
            }
        }

        let status = collection.composite_at_stage_position(position)?;
        self.hooks
            .persist_stage_status(position, status)
            .await
            .map_err(|err| ProcessingError::hook("persist_stage_status", err))?;
        self.sink
            .emit(StatusEvent::StageResolved {
                pipeline,
                stage_position: position,
                status,
            })
            .await;
        report.stage_statuses.insert(position, status);
        Ok(())
    }

    /// Offers unprocessed rows in batches until every row was either marked
    /// or declined by the hook.
    async fn mark_processed(&mut self, collection: &mut StatusCollection) -> Result<usize, ProcessingError> {
        let mut declined: HashSet<JobId> = HashSet::new();
        let mut marked = 0;

        loop {
            let batch: Vec<(JobId, ChangeToken)> = collection
                .unprocessed_rows()?
                .filter(|row| !declined.contains(&row.id))
                .take(self.batch_size)
                .map(|row| (row.id, row.change_token))
                .collect();
            if batch.is_empty() {
                break;
            }

            let confirmed: HashSet<JobId> = self
                .hooks
                .mark_processed(&batch)
                .await
                .map_err(|err| ProcessingError::hook("mark_processed", err))?
                .into_iter()
                .collect();

            for (id, _) in &batch {
                if confirmed.contains(id) && collection.set_processed(*id)? {
                    marked += 1;
                } else {
                    declined.insert(*id);
                }
            }
        }

        Ok(marked)
    }
}
