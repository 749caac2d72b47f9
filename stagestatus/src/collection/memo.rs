//! Memo table for stage-window composites.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::JobStatus;

/// The kind and parameter of a memoized query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MemoKey {
    /// Composite of one stage position.
    AtStage(u32),
    /// Composite of every stage before a position.
    BeforeStage(u32),
}

/// Counters describing memo effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoStats {
    /// Queries answered from the memo.
    pub hits: u64,
    /// Queries that had to be computed.
    pub misses: u64,
    /// Times the memo was cleared by a mutation.
    pub invalidations: u64,
}

#[derive(Debug, Default)]
pub(crate) struct QueryMemo {
    entries: HashMap<MemoKey, JobStatus>,
    stats: MemoStats,
}

impl QueryMemo {
    pub(crate) fn get(&mut self, key: MemoKey) -> Option<JobStatus> {
        let cached = self.entries.get(&key).copied();
        if cached.is_some() {
            self.stats.hits += 1;
        }
        cached
    }

    pub(crate) fn insert(&mut self, key: MemoKey, status: JobStatus) {
        self.stats.misses += 1;
        self.entries.insert(key, status);
    }

    /// Drops every memoized composite.
    pub(crate) fn invalidate(&mut self) {
        self.entries.clear();
        self.stats.invalidations += 1;
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn stats(&self) -> MemoStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_keys_are_distinct_per_kind() {
        let mut memo = QueryMemo::default();
        memo.insert(MemoKey::AtStage(1), JobStatus::Running);
        memo.insert(MemoKey::BeforeStage(1), JobStatus::Success);

        assert_eq!(memo.get(MemoKey::AtStage(1)), Some(JobStatus::Running));
        assert_eq!(memo.get(MemoKey::BeforeStage(1)), Some(JobStatus::Success));
        assert_eq!(memo.get(MemoKey::AtStage(2)), None);
    }

    #[test]
    fn test_invalidate_clears_everything() {
        let mut memo = QueryMemo::default();
        memo.insert(MemoKey::AtStage(0), JobStatus::Failed);
        memo.invalidate();

        assert_eq!(memo.len(), 0);
        assert_eq!(memo.get(MemoKey::AtStage(0)), None);
        assert_eq!(
            memo.stats(),
            MemoStats {
                hits: 0,
                misses: 1,
                invalidations: 1
            }
        );
    }
}
