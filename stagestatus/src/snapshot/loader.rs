//! Snapshot of one pipeline's rows and its lookup indexes.

use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use tracing::{debug, error, warn};

use super::StatusSource;
use crate::core::{JobId, JobStatusRow, PipelineId};
use crate::errors::SnapshotUnavailableError;

/// The rows of one pipeline at one point in time.
///
/// Rows are kept ordered by stage position. The by-id, by-name and
/// by-stage indexes are built on first use and live as long as the
/// snapshot; they hold row offsets, so in-place status updates never
/// invalidate them.
#[derive(Debug, Default)]
pub struct Snapshot {
    rows: Vec<JobStatusRow>,
    by_id: OnceCell<HashMap<JobId, usize>>,
    by_name: OnceCell<HashMap<String, usize>>,
    by_stage: OnceCell<BTreeMap<u32, Vec<usize>>>,
}

impl Snapshot {
    /// Creates a snapshot, stably ordering rows by stage position.
    #[must_use]
    pub fn from_rows(mut rows: Vec<JobStatusRow>) -> Self {
        rows.sort_by_key(|row| row.stage_position);
        Self {
            rows,
            ..Self::default()
        }
    }

    /// Returns all rows in stage order.
    #[must_use]
    pub fn rows(&self) -> &[JobStatusRow] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the pipeline has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn id_index(&self) -> &HashMap<JobId, usize> {
        self.by_id.get_or_init(|| {
            let mut index = HashMap::with_capacity(self.rows.len());
            for (offset, row) in self.rows.iter().enumerate() {
                if index.insert(row.id, offset).is_some() {
                    warn!(job_id = %row.id, "Duplicate job id in snapshot; keeping the later row");
                }
            }
            index
        })
    }

    fn name_index(&self) -> &HashMap<String, usize> {
        self.by_name.get_or_init(|| {
            let mut index = HashMap::with_capacity(self.rows.len());
            for (offset, row) in self.rows.iter().enumerate() {
                if index.insert(row.name.clone(), offset).is_some() {
                    warn!(job_name = %row.name, "Duplicate job name in snapshot; keeping the later row");
                }
            }
            index
        })
    }

    fn stage_index(&self) -> &BTreeMap<u32, Vec<usize>> {
        self.by_stage.get_or_init(|| {
            let mut index: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
            for (offset, row) in self.rows.iter().enumerate() {
                index.entry(row.stage_position).or_default().push(offset);
            }
            index
        })
    }

    /// Looks up a row by id.
    #[must_use]
    pub fn row(&self, id: JobId) -> Option<&JobStatusRow> {
        self.id_index().get(&id).map(|offset| &self.rows[*offset])
    }

    /// Looks up a row by id for mutation.
    pub fn row_mut(&mut self, id: JobId) -> Option<&mut JobStatusRow> {
        let offset = *self.id_index().get(&id)?;
        self.rows.get_mut(offset)
    }

    /// Looks up a row by name.
    #[must_use]
    pub fn row_by_name(&self, name: &str) -> Option<&JobStatusRow> {
        self.name_index().get(name).map(|offset| &self.rows[*offset])
    }

    /// Returns the distinct stage positions in ascending order.
    pub fn stage_positions(&self) -> impl Iterator<Item = u32> + '_ {
        self.stage_index().keys().copied()
    }

    /// Returns the rows at one stage position.
    pub fn rows_at_stage(&self, position: u32) -> impl Iterator<Item = &JobStatusRow> + '_ {
        self.stage_index()
            .get(&position)
            .into_iter()
            .flatten()
            .map(move |offset| &self.rows[*offset])
    }

    /// Returns the rows of every stage before `position`.
    pub fn rows_before_stage(&self, position: u32) -> impl Iterator<Item = &JobStatusRow> + '_ {
        self.stage_index()
            .range((Bound::Unbounded, Bound::Excluded(position)))
            .flat_map(|(_, offsets)| offsets.iter())
            .map(move |offset| &self.rows[*offset])
    }
}

/// Loads snapshots through a [`StatusSource`].
pub struct SnapshotLoader;

impl SnapshotLoader {
    /// Performs the bulk fetch for `pipeline`.
    pub fn load(
        source: &dyn StatusSource,
        pipeline: PipelineId,
    ) -> Result<Snapshot, SnapshotUnavailableError> {
        let rows = source.fetch_rows(&pipeline).map_err(|err| {
            error!(pipeline = %pipeline, error = %err, "Failed to fetch job statuses");
            SnapshotUnavailableError::new(pipeline, err.to_string())
        })?;

        let snapshot = Snapshot::from_rows(rows);
        debug!(
            pipeline = %pipeline,
            rows = snapshot.len(),
            stages = snapshot.stage_positions().count(),
            "Loaded status snapshot"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobStatus;
    use crate::errors::SourceError;
    use crate::snapshot::{InMemoryStatusSource, MockStatusSource};
    use pretty_assertions::assert_eq;

    fn sample() -> Snapshot {
        Snapshot::from_rows(vec![
            JobStatusRow::new(4, "deploy", JobStatus::Created, 2),
            JobStatusRow::new(1, "build", JobStatus::Success, 0),
            JobStatusRow::new(2, "rspec", JobStatus::Running, 1),
            JobStatusRow::new(3, "lint", JobStatus::Pending, 1),
        ])
    }

    #[test]
    fn test_rows_sorted_stably() {
        let snapshot = sample();
        let ids: Vec<u64> = snapshot.rows().iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_lookups() {
        let snapshot = sample();
        assert_eq!(snapshot.row(JobId(2)).map(|r| r.name.as_str()), Some("rspec"));
        assert_eq!(snapshot.row_by_name("deploy").map(|r| r.id), Some(JobId(4)));
        assert!(snapshot.row(JobId(99)).is_none());
        assert!(snapshot.row_by_name("missing").is_none());
    }

    #[test]
    fn test_row_mut_updates_in_place() {
        let mut snapshot = sample();
        snapshot.row_mut(JobId(2)).unwrap().status = JobStatus::Success;

        assert_eq!(snapshot.row_by_name("rspec").unwrap().status, JobStatus::Success);
        assert!(snapshot.row_mut(JobId(99)).is_none());
    }

    #[test]
    fn test_stage_windows() {
        let snapshot = sample();

        assert_eq!(snapshot.stage_positions().collect::<Vec<_>>(), vec![0, 1, 2]);

        let at_one: Vec<u64> = snapshot.rows_at_stage(1).map(|r| r.id.0).collect();
        assert_eq!(at_one, vec![2, 3]);

        let before_two: Vec<u64> = snapshot.rows_before_stage(2).map(|r| r.id.0).collect();
        assert_eq!(before_two, vec![1, 2, 3]);

        assert_eq!(snapshot.rows_before_stage(0).count(), 0);
        assert_eq!(snapshot.rows_at_stage(7).count(), 0);
    }

    #[test]
    fn test_duplicate_names_keep_later_row() {
        let snapshot = Snapshot::from_rows(vec![
            JobStatusRow::new(1, "test", JobStatus::Failed, 0),
            JobStatusRow::new(2, "test", JobStatus::Success, 0),
        ]);
        assert_eq!(snapshot.row_by_name("test").unwrap().id, JobId(2));
    }

    #[test]
    fn test_loader_uses_source() {
        let source = InMemoryStatusSource::new()
            .with_pipeline(PipelineId(5), vec![JobStatusRow::new(1, "build", JobStatus::Success, 0)]);

        let snapshot = SnapshotLoader::load(&source, PipelineId(5)).unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_loader_maps_source_failure() {
        let mut source = MockStatusSource::new();
        source
            .expect_fetch_rows()
            .returning(|_| Err(SourceError::unreachable("primary down")));

        let err = SnapshotLoader::load(&source, PipelineId(5)).unwrap_err();
        assert_eq!(err.pipeline, PipelineId(5));
        assert!(err.reason.contains("primary down"));
    }
}
