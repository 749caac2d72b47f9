//! Dependency-tree expansion for DAG name queries.
//!
//! A DAG job only names its direct dependencies, yet each of those still
//! waits on the stages before its own. Expansion adds one synthetic entry per
//! distinct stage position of the unfinished named jobs, carrying the
//! composite of everything before that position, so a DAG composite blocks
//! on transitive stage predecessors too.

use std::collections::BTreeSet;

use crate::composite::PriorityTable;
use crate::core::{JobStatus, JobStatusRow, StatusEntry};

/// A named job as seen by the expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedDependency {
    /// The job's own status entry.
    pub entry: StatusEntry,
    /// The job's stage position.
    pub stage_position: u32,
}

impl From<&JobStatusRow> for NamedDependency {
    fn from(row: &JobStatusRow) -> Self {
        Self {
            entry: row.entry(),
            stage_position: row.stage_position,
        }
    }
}

/// Synthesizes prior-stage entries for `named`.
///
/// Jobs that already succeeded or are ignored allowed failures cannot block,
/// so their chains are not probed. `prior_stage` returns the composite of
/// every stage before a position. Synthetic entries never allow failure.
pub fn expand<F>(named: &[NamedDependency], table: &PriorityTable, mut prior_stage: F) -> Vec<StatusEntry>
where
    F: FnMut(u32) -> JobStatus,
{
    let positions: BTreeSet<u32> = named
        .iter()
        .filter(|dep| dep.entry.status != JobStatus::Success && !table.is_ignored(dep.entry))
        .map(|dep| dep.stage_position)
        .collect();

    positions
        .into_iter()
        .map(|position| StatusEntry::new(prior_stage(position)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dep(status: JobStatus, allow_failure: bool, stage_position: u32) -> NamedDependency {
        NamedDependency {
            entry: StatusEntry {
                status,
                allow_failure,
            },
            stage_position,
        }
    }

    #[test]
    fn test_skips_success_and_ignored() {
        let table = PriorityTable::standard();
        let named = [
            dep(JobStatus::Success, false, 1),
            dep(JobStatus::Failed, true, 2),
            dep(JobStatus::Manual, true, 3),
        ];

        let expanded = expand(&named, &table, |_| panic!("must not probe"));
        assert!(expanded.is_empty());
    }

    #[test]
    fn test_synthesizes_prior_stage_entries() {
        let table = PriorityTable::standard();
        let named = [dep(JobStatus::Created, true, 2)];

        let expanded = expand(&named, &table, |position| {
            assert_eq!(position, 2);
            JobStatus::Running
        });
        assert_eq!(expanded, vec![StatusEntry::new(JobStatus::Running)]);
    }

    #[test]
    fn test_dedupes_shared_positions() {
        let table = PriorityTable::standard();
        let named = [
            dep(JobStatus::Running, false, 1),
            dep(JobStatus::Pending, false, 1),
            dep(JobStatus::Failed, false, 2),
        ];

        let mut probed = Vec::new();
        let expanded = expand(&named, &table, |position| {
            probed.push(position);
            JobStatus::Success
        });

        assert_eq!(probed, vec![1, 2]);
        assert_eq!(expanded.len(), 2);
    }
}
