//! Error types for the stagestatus crate.
//!
//! Only loading the snapshot can fail at query time; every query over a
//! loaded snapshot is total. Processing passes add failures reported by
//! their external hooks.

use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

use crate::core::PipelineId;

/// The main error type for status collection queries.
#[derive(Debug, Clone, Error)]
pub enum StatusError {
    /// The bulk row fetch failed; the collection cannot answer queries.
    #[error("{0}")]
    SnapshotUnavailable(#[from] SnapshotUnavailableError),
}

/// Error raised by a [`StatusSource`](crate::snapshot::StatusSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing store could not be reached.
    #[error("Status source unreachable: {reason}")]
    Unreachable {
        /// Why the store is unreachable.
        reason: String,
    },

    /// IO error while reading rows.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Rows could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SourceError {
    /// Creates an unreachable error.
    #[must_use]
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable {
            reason: reason.into(),
        }
    }
}

/// Error raised when the snapshot of a pipeline cannot be loaded.
///
/// Fatal to the collection that hit it; the fetch is not retried.
#[derive(Debug, Clone, Error)]
#[error("Snapshot unavailable for {pipeline}: {reason}")]
pub struct SnapshotUnavailableError {
    /// The pipeline whose rows were requested.
    pub pipeline: PipelineId,
    /// The underlying failure.
    pub reason: String,
}

impl SnapshotUnavailableError {
    /// Creates a new snapshot unavailable error.
    #[must_use]
    pub fn new(pipeline: PipelineId, reason: impl Into<String>) -> Self {
        Self {
            pipeline,
            reason: reason.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), json!("SnapshotUnavailable"));
        map.insert("pipeline_id".to_string(), json!(self.pipeline.0));
        map.insert("reason".to_string(), json!(self.reason));
        map.insert("message".to_string(), json!(self.to_string()));
        map
    }
}

/// Error raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed.
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue {
        /// The variable name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A JSON configuration could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Error raised by a processing pass.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// The collection could not answer.
    #[error("{0}")]
    Status(#[from] StatusError),

    /// An external hook failed.
    #[error("Processing hook '{operation}' failed: {source}")]
    Hook {
        /// The hook that failed.
        operation: &'static str,
        /// The hook's error.
        #[source]
        source: anyhow::Error,
    },
}

impl ProcessingError {
    /// Wraps a hook failure.
    #[must_use]
    pub fn hook(operation: &'static str, source: anyhow::Error) -> Self {
        Self::Hook { operation, source }
    }
}
