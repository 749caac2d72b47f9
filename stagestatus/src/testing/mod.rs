//! Testing utilities for stagestatus.
//!
//! This module provides helpers for testing code built on status
//! collections:
//! - [`PipelineFixture`] for declaring pipelines job by job
//! - Mock sources and processing hooks that record what they see

mod fixtures;
mod mocks;

pub use fixtures::PipelineFixture;
pub use mocks::{CountingStatusSource, FailingStatusSource, RecordingHooks, ReleasePolicy};
