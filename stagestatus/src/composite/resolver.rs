//! Composite resolution over a set of status entries.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::priority::{PriorityTable, StatusFacet, StatusSet};
use crate::config::FeatureToggles;
use crate::core::{Discipline, JobStatus, StatusEntry};

/// A resolved composite with its warning marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeStatus {
    /// The aggregate status.
    pub status: JobStatus,
    /// True if an allowed failure was absorbed into the result.
    pub warnings: bool,
}

/// Turns a set of entries into one status.
///
/// Pure apart from reading the feature toggles, which may flip between calls.
#[derive(Clone)]
pub struct CompositeResolver {
    table: Arc<PriorityTable>,
    toggles: Arc<dyn FeatureToggles>,
}

impl std::fmt::Debug for CompositeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeResolver")
            .field("rules", &self.table.rules().len())
            .field("dag_legacy_blocking", &self.toggles.dag_legacy_blocking())
            .finish()
    }
}

impl CompositeResolver {
    /// Creates a resolver with the given table and toggles.
    #[must_use]
    pub fn new(table: Arc<PriorityTable>, toggles: Arc<dyn FeatureToggles>) -> Self {
        Self { table, toggles }
    }

    /// Returns a resolver using `table` with the same toggles.
    #[must_use]
    pub fn with_table(mut self, table: Arc<PriorityTable>) -> Self {
        self.table = table;
        self
    }

    /// Returns the priority table.
    #[must_use]
    pub fn table(&self) -> &PriorityTable {
        &self.table
    }

    /// Returns the feature toggles.
    #[must_use]
    pub fn toggles(&self) -> &dyn FeatureToggles {
        self.toggles.as_ref()
    }

    /// Resolves the composite status of `entries`.
    pub fn resolve<I>(&self, entries: I, discipline: Discipline) -> JobStatus
    where
        I: IntoIterator<Item = StatusEntry>,
    {
        self.resolve_detailed(entries, discipline).status
    }

    /// Resolves the composite status and reports absorbed failures.
    pub fn resolve_detailed<I>(&self, entries: I, discipline: Discipline) -> CompositeStatus
    where
        I: IntoIterator<Item = StatusEntry>,
    {
        let legacy_blocking =
            discipline == Discipline::Dag && self.toggles.dag_legacy_blocking();

        let mut set = StatusSet::EMPTY;
        let mut blocked = false;
        for entry in entries {
            if !entry.status.is_completed() {
                if legacy_blocking {
                    blocked = true;
                }
                // An unfinished allowed failure neither blocks a DAG composite
                // nor counts toward it.
                if discipline == Discipline::Dag && entry.allow_failure {
                    continue;
                }
            }
            self.table.classify(entry, &mut set);
        }

        // Dependency graphs block on anything unfinished, like stages did.
        if blocked {
            return CompositeStatus {
                status: JobStatus::Pending,
                warnings: false,
            };
        }

        CompositeStatus {
            status: self.table.resolve(set).unwrap_or(JobStatus::Success),
            warnings: set.contains(StatusFacet::SuccessWithWarnings),
        }
    }
}
