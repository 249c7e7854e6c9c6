// Conversion tracing
// Append-only JSONL log with one entry per conversion stage

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during trace operations
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Conversion stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Parse,
    Classify,
    Resolve,
    Assign,
    Export,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Parse,
        Stage::Classify,
        Stage::Resolve,
        Stage::Assign,
        Stage::Export,
    ];

    /// Fraction of the pipeline finished once this stage completes
    pub fn progress(&self) -> f32 {
        let position = Stage::ALL.iter().position(|s| s == self).unwrap_or(0) + 1;
        position as f32 / Stage::ALL.len() as f32
    }
}

/// A single line of the trace file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// RFC 3339 timestamp
    pub timestamp: String,

    /// Conversion this entry belongs to; several runs may share one file
    pub run_id: Uuid,

    pub stage: Stage,

    /// Progress [0.0, 1.0]
    pub progress: f32,

    pub message: String,

    /// Stage counters (tracks, events, dropped notes, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl TraceEntry {
    /// Entry for a finished stage
    pub fn completed(run_id: Uuid, stage: Stage, message: impl Into<String>) -> Self {
        TraceEntry {
            timestamp: Utc::now().to_rfc3339(),
            run_id,
            stage,
            progress: stage.progress(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Serialize to JSON line (with newline)
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Appends trace entries to a JSONL file
#[derive(Debug, Clone)]
pub struct TraceWriter {
    file_path: PathBuf,
}

impl TraceWriter {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        TraceWriter {
            file_path: file_path.into(),
        }
    }

    /// Append one entry, creating the file if needed
    pub fn write(&self, entry: &TraceEntry) -> Result<(), TraceError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;

        file.write_all(entry.to_json_line()?.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read entries back from a JSONL file, skipping blank lines
pub fn read_trace_file(path: &Path) -> Result<Vec<TraceEntry>, TraceError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(line)?);
    }

    Ok(entries)
}
