//! Job status and aggregation discipline enums.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The status of a single job (or of a composite over several jobs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job exists but has not been released for execution.
    #[default]
    Created,
    /// Job is waiting for an exclusive resource.
    WaitingForResource,
    /// Job is being prepared for execution.
    Preparing,
    /// Job is queued for a runner.
    Pending,
    /// Job is executing.
    Running,
    /// Job finished successfully.
    Success,
    /// Job failed.
    Failed,
    /// Job was canceled.
    Canceled,
    /// Job was skipped.
    Skipped,
    /// Job waits for a manual action.
    Manual,
    /// Job is scheduled to start later.
    Scheduled,
}

impl JobStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Created,
        Self::WaitingForResource,
        Self::Preparing,
        Self::Pending,
        Self::Running,
        Self::Success,
        Self::Failed,
        Self::Canceled,
        Self::Skipped,
        Self::Manual,
        Self::Scheduled,
    ];

    /// Statuses from which no further transition is expected.
    pub const COMPLETED: [Self; 4] = [Self::Success, Self::Failed, Self::Canceled, Self::Skipped];

    /// Returns true if the status is terminal.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled | Self::Skipped)
    }

    /// Returns true if the job is being worked on.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Preparing | Self::Pending | Self::Running)
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::WaitingForResource => "waiting_for_resource",
            Self::Preparing => "preparing",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Skipped => "skipped",
            Self::Manual => "manual",
            Self::Scheduled => "scheduled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown job status: '{0}'")]
pub struct UnknownStatusError(pub String);

impl FromStr for JobStatus {
    type Err = UnknownStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatusError(s.to_string()))
    }
}

/// How dependencies between jobs are ordered when aggregating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    /// Jobs wait for every job in all earlier stages.
    #[default]
    Stage,
    /// Jobs wait only for their explicitly named dependencies.
    Dag,
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage => write!(f, "stage"),
            Self::Dag => write!(f, "dag"),
        }
    }
}
