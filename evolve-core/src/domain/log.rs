//! Log domain types
//!
//! A run's output is written by the worker as one JSON document per line.
//! The same shape is relayed to clients untouched.

use serde::{Deserialize, Serialize};

/// Status value the worker writes on the final record of a run.
pub const EOF_STATUS: &str = "EOF";

/// A single line of run output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub stream: SourceStream,
    #[serde(default)]
    pub line: String,
    #[serde(default)]
    pub status: LogStatus,
    /// Owning run, present on the end-of-stream record
    #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl LogEntry {
    /// A regular output line
    pub fn line(stream: SourceStream, line: impl Into<String>) -> Self {
        Self {
            stream,
            line: line.into(),
            status: LogStatus::Normal,
            run_id: None,
        }
    }

    /// The end-of-stream record for a run
    pub fn eof(run_id: impl Into<String>) -> Self {
        Self {
            stream: SourceStream::Unknown,
            line: String::new(),
            status: LogStatus::Eof,
            run_id: Some(run_id.into()),
        }
    }

    /// Whether this entry marks the end of the run's output
    pub fn is_terminal(&self) -> bool {
        self.status == LogStatus::Eof
    }
}

/// Process stream a line was captured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStream {
    Stdout,
    Stderr,
    /// Anything else, including the blank value on end-of-stream records
    #[default]
    #[serde(other)]
    Unknown,
}

/// Whether a record is ordinary output or the end-of-stream marker
///
/// Only the exact value `EOF` is terminal; every other value the worker
/// might write is treated as ordinary output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogStatus {
    #[default]
    Normal,
    Eof,
}

impl From<String> for LogStatus {
    fn from(value: String) -> Self {
        if value == EOF_STATUS {
            LogStatus::Eof
        } else {
            LogStatus::Normal
        }
    }
}

impl From<LogStatus> for String {
    fn from(status: LogStatus) -> Self {
        match status {
            LogStatus::Normal => "normal".to_string(),
            LogStatus::Eof => EOF_STATUS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_worker_line() {
        let entry: LogEntry =
            serde_json::from_str(r#"{"stream":"stderr","line":"gen 3 best=0.12","status":""}"#)
                .unwrap();
        assert_eq!(entry.stream, SourceStream::Stderr);
        assert_eq!(entry.line, "gen 3 best=0.12");
        assert!(!entry.is_terminal());
        assert_eq!(entry.run_id, None);
    }

    #[test]
    fn test_parse_eof_record() {
        let entry: LogEntry =
            serde_json::from_str(r#"{"stream":"","line":"","status":"EOF","runId":"run-42"}"#)
                .unwrap();
        assert!(entry.is_terminal());
        assert_eq!(entry.stream, SourceStream::Unknown);
        assert_eq!(entry.run_id.as_deref(), Some("run-42"));
    }

    #[test]
    fn test_missing_fields_default() {
        let entry: LogEntry = serde_json::from_str(r#"{"line":"x"}"#).unwrap();
        assert_eq!(entry.status, LogStatus::Normal);
        assert_eq!(entry.stream, SourceStream::Unknown);
    }

    #[test]
    fn test_status_is_case_sensitive() {
        let entry: LogEntry = serde_json::from_str(r#"{"line":"x","status":"eof"}"#).unwrap();
        assert!(!entry.is_terminal());
    }
}
