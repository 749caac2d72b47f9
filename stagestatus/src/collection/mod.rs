//! The status collection façade.
//!
//! A [`StatusCollection`] owns one pipeline's snapshot for the length of a
//! processing run. The snapshot is fetched on first use; afterwards every
//! query is answered in memory. Stage-window composites are memoized and the
//! whole memo is dropped whenever a row's status changes.
//!
//! The collection is a single-writer structure: queries take `&mut self`
//! because they fill the memo. Use [`StatusCollection::into_shared`] when an
//! instance must be reached from several tasks.

mod dependency_tree;
mod memo;

pub use dependency_tree::{expand, NamedDependency};
pub use memo::MemoStats;

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::composite::{CompositeResolver, CompositeStatus, PriorityTable};
use crate::config::FeatureToggles;
use crate::core::{ChangeToken, Discipline, JobId, JobStatus, JobStatusRow, PipelineId, StatusEntry};
use crate::errors::{SnapshotUnavailableError, StatusError};
use crate::snapshot::{Snapshot, SnapshotLoader, StatusSource};
use memo::{MemoKey, QueryMemo};

/// A collection shared behind a lock.
pub type SharedStatusCollection = Arc<Mutex<StatusCollection>>;

type LoadResult = Result<Snapshot, SnapshotUnavailableError>;

/// Composite status queries over one pipeline snapshot.
pub struct StatusCollection {
    pipeline: PipelineId,
    source: Arc<dyn StatusSource>,
    resolver: CompositeResolver,
    state: Option<LoadResult>,
    memo: QueryMemo,
}

impl std::fmt::Debug for StatusCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            None => "unloaded".to_string(),
            Some(Ok(snapshot)) => format!("loaded ({} rows)", snapshot.len()),
            Some(Err(_)) => "unavailable".to_string(),
        };
        f.debug_struct("StatusCollection")
            .field("pipeline", &self.pipeline)
            .field("state", &state)
            .field("memoized", &self.memo.len())
            .finish()
    }
}

/// Borrowed pieces of a loaded collection.
struct Loaded<'a> {
    snapshot: &'a mut Snapshot,
    memo: &'a mut QueryMemo,
    resolver: &'a CompositeResolver,
}

impl Loaded<'_> {
    fn memoized<F>(&mut self, key: MemoKey, compute: F) -> JobStatus
    where
        F: FnOnce(&Snapshot, &CompositeResolver) -> JobStatus,
    {
        if let Some(status) = self.memo.get(key) {
            trace!(?key, %status, "Memo hit");
            return status;
        }
        let status = compute(&*self.snapshot, self.resolver);
        trace!(?key, %status, "Memoized composite");
        self.memo.insert(key, status);
        status
    }

    fn before_stage(&mut self, position: u32) -> JobStatus {
        self.memoized(MemoKey::BeforeStage(position), |snapshot, resolver| {
            resolver.resolve(
                snapshot.rows_before_stage(position).map(JobStatusRow::entry),
                Discipline::Stage,
            )
        })
    }

    fn at_stage(&mut self, position: u32) -> JobStatus {
        self.memoized(MemoKey::AtStage(position), |snapshot, resolver| {
            resolver.resolve(
                snapshot.rows_at_stage(position).map(JobStatusRow::entry),
                Discipline::Stage,
            )
        })
    }
}

impl StatusCollection {
    /// Creates a collection for `pipeline`; nothing is fetched yet.
    #[must_use]
    pub fn new(
        pipeline: PipelineId,
        source: Arc<dyn StatusSource>,
        toggles: Arc<dyn FeatureToggles>,
    ) -> Self {
        Self {
            pipeline,
            source,
            resolver: CompositeResolver::new(Arc::new(PriorityTable::standard()), toggles),
            state: None,
            memo: QueryMemo::default(),
        }
    }

    /// Replaces the priority table used for every composite.
    #[must_use]
    pub fn with_priority_table(mut self, table: PriorityTable) -> Self {
        self.resolver = self.resolver.with_table(Arc::new(table));
        self.memo.invalidate();
        self
    }

    /// Returns the pipeline this collection describes.
    #[must_use]
    pub fn pipeline(&self) -> PipelineId {
        self.pipeline
    }

    /// Returns true once the snapshot fetch has been attempted.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    fn loaded(&mut self) -> Result<Loaded<'_>, StatusError> {
        let source = &self.source;
        let pipeline = self.pipeline;
        let snapshot = self
            .state
            .get_or_insert_with(|| SnapshotLoader::load(source.as_ref(), pipeline))
            .as_mut()
            .map_err(|err| StatusError::from(err.clone()))?;

        Ok(Loaded {
            snapshot,
            memo: &mut self.memo,
            resolver: &self.resolver,
        })
    }

    fn snapshot(&mut self) -> Result<&Snapshot, StatusError> {
        let loaded = self.loaded()?;
        Ok(loaded.snapshot)
    }

    /// Fetches the snapshot now instead of on first query.
    pub fn load(&mut self) -> Result<(), StatusError> {
        self.loaded().map(|_| ())
    }

    /// Fetches the snapshot on the blocking thread pool.
    ///
    /// For callers running inside an async runtime; the fetch may block.
    pub async fn load_async(&mut self) -> Result<(), StatusError> {
        if self.state.is_none() {
            let source = Arc::clone(&self.source);
            let pipeline = self.pipeline;
            let result = tokio::task::spawn_blocking(move || {
                SnapshotLoader::load(source.as_ref(), pipeline)
            })
            .await
            .unwrap_or_else(|err| {
                Err(SnapshotUnavailableError::new(
                    pipeline,
                    format!("fetch task failed: {err}"),
                ))
            });
            self.state = Some(result);
        }
        self.load()
    }

    /// Records a new status for a job.
    ///
    /// Unknown ids are ignored. Returns whether a row was updated.
    pub fn set_status(
        &mut self,
        id: JobId,
        status: JobStatus,
        token: ChangeToken,
    ) -> Result<bool, StatusError> {
        let loaded = self.loaded()?;
        let Some(row) = loaded.snapshot.row_mut(id) else {
            return Ok(false);
        };

        debug!(job_id = %id, from = %row.status, to = %status, "Updating job status");
        row.status = status;
        row.change_token = token;
        loaded.memo.invalidate();
        trace!("Invalidated memoized composites");
        Ok(true)
    }

    /// Marks a job as folded into a persisted composite.
    ///
    /// Unknown ids are ignored. Returns whether a row was updated.
    pub fn set_processed(&mut self, id: JobId) -> Result<bool, StatusError> {
        let loaded = self.loaded()?;
        Ok(match loaded.snapshot.row_mut(id) {
            Some(row) => {
                row.processed = true;
                true
            }
            None => false,
        })
    }

    /// Composite of every job, under stage discipline.
    pub fn composite_of_all(&mut self) -> Result<JobStatus, StatusError> {
        Ok(self.composite_of_all_detailed()?.status)
    }

    /// Composite of every job, with its warning marker.
    pub fn composite_of_all_detailed(&mut self) -> Result<CompositeStatus, StatusError> {
        let loaded = self.loaded()?;
        Ok(loaded.resolver.resolve_detailed(
            loaded.snapshot.rows().iter().map(JobStatusRow::entry),
            Discipline::Stage,
        ))
    }

    /// Composite of the named jobs.
    ///
    /// Unknown names are ignored. Under [`Discipline::Dag`] the named jobs'
    /// prior-stage composites are included when dependency-tree expansion
    /// is enabled.
    pub fn composite_for_names<I, S>(
        &mut self,
        names: I,
        discipline: Discipline,
    ) -> Result<JobStatus, StatusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = self.loaded()?;
        let resolver = loaded.resolver;

        let snapshot: &Snapshot = &*loaded.snapshot;
        let mut seen = HashSet::new();
        let named: Vec<NamedDependency> = names
            .into_iter()
            .filter_map(|name| snapshot.row_by_name(name.as_ref()))
            .filter(|row| seen.insert(row.id))
            .map(NamedDependency::from)
            .collect();

        let mut entries: Vec<StatusEntry> = named.iter().map(|dep| dep.entry).collect();
        if discipline == Discipline::Dag && resolver.toggles().dependency_tree_for_dag() {
            entries.extend(expand(&named, resolver.table(), |position| {
                loaded.before_stage(position)
            }));
        }

        Ok(resolver.resolve(entries, discipline))
    }

    /// Composite of every job in stages before `position`. Memoized.
    pub fn composite_before_stage_position(&mut self, position: u32) -> Result<JobStatus, StatusError> {
        Ok(self.loaded()?.before_stage(position))
    }

    /// Composite of the jobs at `position`. Memoized.
    pub fn composite_at_stage_position(&mut self, position: u32) -> Result<JobStatus, StatusError> {
        Ok(self.loaded()?.at_stage(position))
    }

    /// Ids of the `created` jobs at `position`, in snapshot order.
    pub fn created_ids_at_stage_position(&mut self, position: u32) -> Result<Vec<JobId>, StatusError> {
        Ok(self
            .snapshot()?
            .rows_at_stage(position)
            .filter(|row| row.status == JobStatus::Created)
            .map(|row| row.id)
            .collect())
    }

    /// Lazily walks the rows not yet processed.
    ///
    /// Every call starts a fresh traversal.
    pub fn unprocessed_rows(
        &mut self,
    ) -> Result<impl Iterator<Item = &JobStatusRow> + '_, StatusError> {
        Ok(self.snapshot()?.rows().iter().filter(|row| !row.processed))
    }

    /// Distinct stage positions, ascending.
    pub fn stage_positions(&mut self) -> Result<Vec<u32>, StatusError> {
        Ok(self.snapshot()?.stage_positions().collect())
    }

    /// Looks up one row.
    pub fn row(&mut self, id: JobId) -> Result<Option<&JobStatusRow>, StatusError> {
        Ok(self.snapshot()?.row(id))
    }

    /// Memo counters.
    #[must_use]
    pub fn memo_stats(&self) -> MemoStats {
        self.memo.stats()
    }

    /// Wraps the collection for shared use.
    #[must_use]
    pub fn into_shared(self) -> SharedStatusCollection {
        Arc::new(Mutex::new(self))
    }
}
