//! Row sources: the bulk-fetch port and its bundled implementations.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::{JobStatusRow, PipelineId};
use crate::errors::SourceError;

/// Bulk fetch of the aggregation projection for one pipeline.
///
/// Implementations return the latest attempt of every job, ordered by
/// stage position. The call may block on I/O.
#[cfg_attr(test, mockall::automock)]
pub trait StatusSource: Send + Sync {
    /// Fetches every row belonging to `pipeline`.
    fn fetch_rows(&self, pipeline: &PipelineId) -> Result<Vec<JobStatusRow>, SourceError>;
}

/// A source serving rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatusSource {
    pipelines: HashMap<PipelineId, Vec<JobStatusRow>>,
}

impl InMemoryStatusSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the rows of a pipeline.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineId, rows: Vec<JobStatusRow>) -> Self {
        self.pipelines.insert(pipeline, rows);
        self
    }
}

impl StatusSource for InMemoryStatusSource {
    fn fetch_rows(&self, pipeline: &PipelineId) -> Result<Vec<JobStatusRow>, SourceError> {
        // An unknown pipeline simply has no jobs.
        let mut rows = self.pipelines.get(pipeline).cloned().unwrap_or_default();
        rows.sort_by_key(|row| row.stage_position);
        Ok(rows)
    }
}

/// A job as recorded in a JSON export, including superseded attempts.
#[derive(Debug, Deserialize)]
struct RecordedJob {
    #[serde(flatten)]
    row: JobStatusRow,
    #[serde(default)]
    retried: bool,
}

/// A JSON document keyed by pipeline id.
#[derive(Debug, Deserialize)]
struct RecordedPipelines {
    pipelines: HashMap<u64, Vec<RecordedJob>>,
}

enum JsonOrigin {
    File(PathBuf),
    Text(String),
}

/// A source reading a JSON export of recorded jobs.
///
/// The document has the shape `{"pipelines": {"<id>": [job, ...]}}`.
/// Jobs marked `"retried": true` are superseded attempts and are dropped.
/// The document is read on every fetch.
pub struct JsonStatusSource {
    origin: JsonOrigin,
}

impl std::fmt::Debug for JsonStatusSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let origin = match &self.origin {
            JsonOrigin::File(path) => path.display().to_string(),
            JsonOrigin::Text(_) => "<inline>".to_string(),
        };
        f.debug_struct("JsonStatusSource")
            .field("origin", &origin)
            .finish()
    }
}

impl JsonStatusSource {
    /// Reads the export from a file.
    #[must_use]
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self {
            origin: JsonOrigin::File(path.as_ref().to_path_buf()),
        }
    }

    /// Reads the export from an in-memory document.
    #[must_use]
    pub fn from_json(json: impl Into<String>) -> Self {
        Self {
            origin: JsonOrigin::Text(json.into()),
        }
    }

    fn read_document(&self) -> Result<RecordedPipelines, SourceError> {
        let document = match &self.origin {
            JsonOrigin::File(path) => serde_json::from_reader(std::io::BufReader::new(
                std::fs::File::open(path)?,
            ))?,
            JsonOrigin::Text(text) => serde_json::from_str(text)?,
        };
        Ok(document)
    }
}

impl StatusSource for JsonStatusSource {
    fn fetch_rows(&self, pipeline: &PipelineId) -> Result<Vec<JobStatusRow>, SourceError> {
        let mut document = self.read_document()?;
        let mut rows: Vec<JobStatusRow> = document
            .pipelines
            .remove(&pipeline.0)
            .unwrap_or_default()
            .into_iter()
            .filter(|job| !job.retried)
            .map(|job| job.row)
            .collect();
        rows.sort_by_key(|row| row.stage_position);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::JobStatus;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const EXPORT: &str = r#"{
        "pipelines": {
            "3": [
                {"id": 11, "name": "test", "status": "failed", "stage_position": 1, "retried": true},
                {"id": 12, "name": "test", "status": "running", "stage_position": 1},
                {"id": 10, "name": "build", "status": "success", "stage_position": 0, "change_token": 4}
            ]
        }
    }"#;

    #[test]
    fn test_in_memory_orders_by_stage() {
        let source = InMemoryStatusSource::new().with_pipeline(
            PipelineId(1),
            vec![
                JobStatusRow::new(2, "deploy", JobStatus::Created, 1),
                JobStatusRow::new(1, "build", JobStatus::Success, 0),
            ],
        );

        let rows = source.fetch_rows(&PipelineId(1)).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["build", "deploy"]);
        assert!(source.fetch_rows(&PipelineId(2)).unwrap().is_empty());
    }

    #[test]
    fn test_json_drops_retried_attempts() {
        let source = JsonStatusSource::from_json(EXPORT);
        let rows = source.fetch_rows(&PipelineId(3)).unwrap();

        let ids: Vec<u64> = rows.iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![10, 12]);
        assert_eq!(rows[0].change_token.0, 4);
        assert_eq!(rows[1].status, JobStatus::Running);
    }

    #[test]
    fn test_json_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXPORT.as_bytes()).unwrap();

        let source = JsonStatusSource::from_file(file.path());
        assert_eq!(source.fetch_rows(&PipelineId(3)).unwrap().len(), 2);
    }

    #[test]
    fn test_json_missing_file_is_io_error() {
        let source = JsonStatusSource::from_file("/nonexistent/stagestatus/export.json");
        let err = source.fetch_rows(&PipelineId(3)).unwrap_err();
        assert!(matches!(err, SourceError::Io(_)));
    }

    #[test]
    fn test_json_malformed_is_serialization_error() {
        let source = JsonStatusSource::from_json("{\"pipelines\": [");
        let err = source.fetch_rows(&PipelineId(3)).unwrap_err();
        assert!(matches!(err, SourceError::Serialization(_)));
    }
}
