//! # Stagestatus
//!
//! Composite status resolution for staged and DAG build pipelines.
//!
//! Stagestatus answers "what is the aggregate status of these jobs?" for
//! one pipeline at a time, with support for:
//!
//! - **Priority-table resolution**: A fixed, ordered precedence turns any set
//!   of job statuses into one composite status
//! - **Allowed failures**: Jobs permitted to fail are absorbed or ignored
//! - **Stage windows**: Memoized composites for a stage and for every stage
//!   before it
//! - **DAG queries**: Composites over named dependencies, optionally expanded
//!   with each dependency's prior-stage composite
//! - **Processing passes**: Release created jobs and persist stage and
//!   pipeline composites through pluggable hooks
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stagestatus::prelude::*;
//! use std::sync::Arc;
//!
//! let source = InMemoryStatusSource::new().with_pipeline(
//!     PipelineId(1),
//!     vec![
//!         JobStatusRow::new(1, "build", JobStatus::Success, 0),
//!         JobStatusRow::new(2, "test", JobStatus::Running, 1),
//!     ],
//! );
//! let mut collection = StatusCollection::new(
//!     PipelineId(1),
//!     Arc::new(source),
//!     Arc::new(StatusConfig::from_env()?),
//! );
//!
//! assert_eq!(collection.composite_before_stage_position(1)?, JobStatus::Success);
//! assert_eq!(collection.composite_of_all()?, JobStatus::Running);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod collection;
pub mod composite;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod processing;
pub mod snapshot;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::collection::{MemoStats, SharedStatusCollection, StatusCollection};
    pub use crate::composite::{
        CompositeResolver, CompositeStatus, PriorityRule, PriorityTable, StatusFacet,
    };
    pub use crate::config::{FeatureToggles, StatusConfig, SwitchableToggles};
    pub use crate::core::{
        ChangeToken, Discipline, JobId, JobStatus, JobStatusRow, PipelineId, StatusEntry,
    };
    pub use crate::errors::{
        ConfigError, ProcessingError, SnapshotUnavailableError, SourceError, StatusError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, StatusEvent};
    pub use crate::processing::{
        ProcessingHooks, ProcessingPass, ProcessingReport, Scheduling, StatusUpdate,
    };
    pub use crate::snapshot::{InMemoryStatusSource, JsonStatusSource, StatusSource};
}
