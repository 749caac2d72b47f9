//! Status priority table.
//!
//! A composite is resolved in two steps: every entry contributes one or more
//! [`StatusFacet`]s to a [`StatusSet`], then the ordered rules of a
//! [`PriorityTable`] are evaluated against the set and the first match wins.
//! Keeping the rules as data makes the precedence explicit and replaceable.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{JobStatus, StatusEntry};

/// A status as seen by the priority rules.
///
/// Extends [`JobStatus`] with the two markers produced by jobs that are
/// allowed to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFacet {
    /// See [`JobStatus::Created`].
    Created,
    /// See [`JobStatus::WaitingForResource`].
    WaitingForResource,
    /// See [`JobStatus::Preparing`].
    Preparing,
    /// See [`JobStatus::Pending`].
    Pending,
    /// See [`JobStatus::Running`].
    Running,
    /// See [`JobStatus::Success`].
    Success,
    /// See [`JobStatus::Failed`].
    Failed,
    /// See [`JobStatus::Canceled`].
    Canceled,
    /// See [`JobStatus::Skipped`].
    Skipped,
    /// See [`JobStatus::Manual`].
    Manual,
    /// See [`JobStatus::Scheduled`].
    Scheduled,
    /// An allowed failure: counts as success, but with warnings.
    SuccessWithWarnings,
    /// An entry that does not take part in the composite.
    Ignored,
}

impl StatusFacet {
    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl From<JobStatus> for StatusFacet {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Created => Self::Created,
            JobStatus::WaitingForResource => Self::WaitingForResource,
            JobStatus::Preparing => Self::Preparing,
            JobStatus::Pending => Self::Pending,
            JobStatus::Running => Self::Running,
            JobStatus::Success => Self::Success,
            JobStatus::Failed => Self::Failed,
            JobStatus::Canceled => Self::Canceled,
            JobStatus::Skipped => Self::Skipped,
            JobStatus::Manual => Self::Manual,
            JobStatus::Scheduled => Self::Scheduled,
        }
    }
}

/// A small set of facets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusSet(u16);

impl StatusSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);

    /// Builds a set from facets.
    #[must_use]
    pub const fn of(facets: &[StatusFacet]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < facets.len() {
            bits |= facets[i].bit();
            i += 1;
        }
        Self(bits)
    }

    /// Adds a facet.
    pub fn insert(&mut self, facet: StatusFacet) {
        self.0 |= facet.bit();
    }

    /// Returns true if the facet is present.
    #[must_use]
    pub const fn contains(self, facet: StatusFacet) -> bool {
        self.0 & facet.bit() != 0
    }

    /// Returns true if the set holds the facet of a job status.
    #[must_use]
    pub fn contains_status(self, status: JobStatus) -> bool {
        self.contains(status.into())
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Non-empty and every member is also in `allowed`.
    #[must_use]
    pub const fn only_of(self, allowed: Self) -> bool {
        self.0 != 0 && self.0 & !allowed.0 == 0
    }

    /// Shares at least one member with `other`.
    #[must_use]
    pub const fn any_of(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl FromIterator<StatusFacet> for StatusSet {
    fn from_iter<I: IntoIterator<Item = StatusFacet>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for facet in iter {
            set.insert(facet);
        }
        set
    }
}

impl fmt::Debug for StatusSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const FACETS: [StatusFacet; 13] = [
            StatusFacet::Created,
            StatusFacet::WaitingForResource,
            StatusFacet::Preparing,
            StatusFacet::Pending,
            StatusFacet::Running,
            StatusFacet::Success,
            StatusFacet::Failed,
            StatusFacet::Canceled,
            StatusFacet::Skipped,
            StatusFacet::Manual,
            StatusFacet::Scheduled,
            StatusFacet::SuccessWithWarnings,
            StatusFacet::Ignored,
        ];
        f.debug_set()
            .entries(FACETS.iter().filter(|facet| self.contains(**facet)))
            .finish()
    }
}

/// When a [`PriorityRule`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleMatch {
    /// The set is non-empty and contained in the given facets.
    OnlyOf(StatusSet),
    /// The set intersects the given facets.
    AnyOf(StatusSet),
    /// Always applies.
    Always,
}

impl RuleMatch {
    /// Evaluates the condition against a set.
    #[must_use]
    pub const fn matches(self, set: StatusSet) -> bool {
        match self {
            Self::OnlyOf(allowed) => set.only_of(allowed),
            Self::AnyOf(facets) => set.any_of(facets),
            Self::Always => true,
        }
    }
}

/// One row of the priority table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityRule {
    /// The condition.
    pub when: RuleMatch,
    /// The composite produced when the condition holds.
    pub outcome: JobStatus,
}

impl PriorityRule {
    /// Rule matching sets made only of the given facets.
    #[must_use]
    pub const fn only_of(facets: &[StatusFacet], outcome: JobStatus) -> Self {
        Self {
            when: RuleMatch::OnlyOf(StatusSet::of(facets)),
            outcome,
        }
    }

    /// Rule matching sets containing any of the given facets.
    #[must_use]
    pub const fn any_of(facets: &[StatusFacet], outcome: JobStatus) -> Self {
        Self {
            when: RuleMatch::AnyOf(StatusSet::of(facets)),
            outcome,
        }
    }

    /// Fallback rule.
    #[must_use]
    pub const fn always(outcome: JobStatus) -> Self {
        Self {
            when: RuleMatch::Always,
            outcome,
        }
    }
}

/// Ordered resolution rules plus the allow-failure classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    rules: Vec<PriorityRule>,
    /// Statuses an allowed-to-fail job drops out of the composite with.
    ignorable: StatusSet,
    /// Statuses an allowed-to-fail job turns into a success with warnings.
    warning: StatusSet,
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl PriorityTable {
    /// Creates a table from explicit rules and the standard allow-failure sets.
    #[must_use]
    pub fn new(rules: Vec<PriorityRule>) -> Self {
        Self {
            rules,
            ..Self::standard()
        }
    }

    /// The standard precedence.
    #[must_use]
    pub fn standard() -> Self {
        use StatusFacet::{
            Canceled, Created, Ignored, Manual, Pending, Preparing, Running, Scheduled, Skipped,
            Success, SuccessWithWarnings, WaitingForResource,
        };

        let rules = vec![
            PriorityRule::only_of(&[Skipped, Ignored], JobStatus::Skipped),
            PriorityRule::only_of(&[Success, Skipped, SuccessWithWarnings, Ignored], JobStatus::Success),
            PriorityRule::only_of(&[Created, SuccessWithWarnings, Ignored], JobStatus::Created),
            PriorityRule::only_of(&[Preparing, SuccessWithWarnings, Ignored], JobStatus::Preparing),
            PriorityRule::only_of(
                &[Canceled, Success, Skipped, SuccessWithWarnings, Ignored],
                JobStatus::Canceled,
            ),
            PriorityRule::only_of(
                &[Pending, Created, Skipped, SuccessWithWarnings, Ignored],
                JobStatus::Pending,
            ),
            PriorityRule::any_of(&[Running, Pending], JobStatus::Running),
            PriorityRule::any_of(&[WaitingForResource], JobStatus::WaitingForResource),
            PriorityRule::any_of(&[Manual], JobStatus::Manual),
            PriorityRule::any_of(&[Scheduled], JobStatus::Scheduled),
            PriorityRule::any_of(&[Preparing], JobStatus::Preparing),
            PriorityRule::any_of(&[Created], JobStatus::Running),
            PriorityRule::always(JobStatus::Failed),
        ];

        Self {
            rules,
            ignorable: StatusSet::of(&[StatusFacet::Manual, StatusFacet::Failed, StatusFacet::Canceled]),
            warning: StatusSet::of(&[StatusFacet::Failed, StatusFacet::Canceled]),
        }
    }

    /// Replaces the statuses that allowed-to-fail jobs are ignored with.
    #[must_use]
    pub fn with_ignorable_statuses(mut self, statuses: &[JobStatus]) -> Self {
        self.ignorable = statuses.iter().map(|s| StatusFacet::from(*s)).collect();
        self
    }

    /// Replaces the statuses that allowed-to-fail jobs raise warnings with.
    #[must_use]
    pub fn with_warning_statuses(mut self, statuses: &[JobStatus]) -> Self {
        self.warning = statuses.iter().map(|s| StatusFacet::from(*s)).collect();
        self
    }

    /// Returns the rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[PriorityRule] {
        &self.rules
    }

    /// Returns true if the entry is an allowed failure that cannot block.
    #[must_use]
    pub fn is_ignored(&self, entry: StatusEntry) -> bool {
        entry.allow_failure && self.ignorable.contains_status(entry.status)
    }

    /// Adds the facets contributed by one entry.
    pub fn classify(&self, entry: StatusEntry, set: &mut StatusSet) {
        if entry.allow_failure && self.warning.contains_status(entry.status) {
            set.insert(StatusFacet::Success);
            set.insert(StatusFacet::SuccessWithWarnings);
        } else if self.is_ignored(entry) {
            set.insert(StatusFacet::Ignored);
        } else {
            set.insert(entry.status.into());
        }
    }

    /// Returns the outcome of the first matching rule.
    #[must_use]
    pub fn resolve(&self, set: StatusSet) -> Option<JobStatus> {
        if set.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.when.matches(set))
            .map(|rule| rule.outcome)
    }
}
