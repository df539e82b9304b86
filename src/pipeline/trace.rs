// Pipeline progress tracing
// Each transcription stage appends started/finished records to a JSONL file

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Trace file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode trace entry: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Malformed trace entry on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Transcription stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Load,
    Extract,
    Convert,
    Segment,
    Save,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Load => "load",
            PipelineStage::Extract => "extract",
            PipelineStage::Convert => "convert",
            PipelineStage::Segment => "segment",
            PipelineStage::Save => "save",
        };
        f.write_str(name)
    }
}

/// One line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339, UTC
    pub timestamp: String,

    pub stage: PipelineStage,

    /// 0.0 when the stage starts, 1.0 when it finishes
    pub progress: f32,

    pub message: String,

    /// Stage results (frame counts, note counts, tempo, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    fn at(stage: PipelineStage, progress: f32, message: String, data: Option<serde_json::Value>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            stage,
            progress,
            message,
            data,
        }
    }

    pub fn started(stage: PipelineStage, message: impl Into<String>) -> Self {
        TraceEntry::at(stage, 0.0, message.into(), None)
    }

    pub fn finished(stage: PipelineStage, message: impl Into<String>, data: serde_json::Value) -> Self {
        TraceEntry::at(stage, 1.0, message.into(), Some(data))
    }
}

/// Appends trace entries to a file, one JSON object per line.
///
/// The file is opened per entry so a crash mid-run still leaves every
/// completed line on disk.
#[derive(Debug, Clone)]
pub struct TraceWriter {
    path: PathBuf,
}

impl TraceWriter {
    pub fn new(path: PathBuf) -> Self {
        TraceWriter { path }
    }

    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut line = serde_json::to_vec(entry).map_err(TraceError::Encode)?;
        line.push(b'\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse a trace file back into entries, skipping blank lines
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    std::fs::read_to_string(path)?
        .lines()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| {
            serde_json::from_str(text).map_err(|source| TraceError::Parse {
                line: index + 1,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_started_and_finished_entries() {
        let start = TraceEntry::started(PipelineStage::Segment, "Segmenting notes");
        assert_eq!(start.progress, 0.0);
        assert!(start.data.is_none());

        let done = TraceEntry::finished(PipelineStage::Segment, "Done", serde_json::json!({ "notes": 12 }));
        assert_eq!(done.progress, 1.0);
        assert_eq!(done.data.unwrap()["notes"], 12);
    }

    #[test]
    fn test_writer_appends_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.jsonl");
        let writer = TraceWriter::new(path.clone());

        writer.write(&TraceEntry::started(PipelineStage::Load, "Loading")).unwrap();
        writer
            .write(&TraceEntry::finished(PipelineStage::Load, "Loaded", serde_json::json!({})))
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let entries = read_trace_file(&path).unwrap();
        assert_eq!(entries[0].stage, PipelineStage::Load);
        assert_eq!(entries[1].progress, 1.0);
    }

    #[test]
    fn test_stage_names_are_snake_case() {
        let json = serde_json::to_string(&TraceEntry::started(PipelineStage::Extract, "x")).unwrap();

        assert!(json.contains("\"stage\":\"extract\""));
        assert!(!json.contains("\"data\""));
        assert_eq!(PipelineStage::Save.to_string(), "save");
    }

    #[test]
    fn test_malformed_line_reports_position() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trace.jsonl");
        let good = serde_json::to_string(&TraceEntry::started(PipelineStage::Load, "ok")).unwrap();
        std::fs::write(&path, format!("{}\n\n{{ broken\n", good)).unwrap();

        let err = read_trace_file(&path).unwrap_err();
        assert!(matches!(err, TraceError::Parse { line: 3, .. }));
    }
}
