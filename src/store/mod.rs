// src/store/mod.rs
//! Append-only interaction log: accepted replies and near-miss rejections.
//!
//! A backend only implements `append` and `load`; duplicate and recency checks
//! are provided on top of `load`, so policy code never depends on the backend.

pub mod json_file;
pub mod memory;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::corpus::{lenient_opt_u8, lenient_u8, Line, Scalar};

pub use json_file::JsonFileLogStore;
pub use memory::MemoryLogStore;

/// `DD/MM/YYYY HH:MM:SS`, local time.
pub const LOG_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("log store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("log store {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One logged interaction. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub comment: String,
    pub reply: String,
    #[serde(deserialize_with = "lenient_u8")]
    pub ratio: u8,
    #[serde(
        default,
        deserialize_with = "lenient_opt_u8",
        skip_serializing_if = "Option::is_none"
    )]
    pub accepted_ratio: Option<u8>,
    pub time: String,
    #[serde(default)]
    pub season: Option<Scalar>,
    #[serde(default)]
    pub episode: Option<Scalar>,
    pub comment_id: String,
    pub line_id: Scalar,
}

impl LogEntry {
    /// Build an entry for `comment` matched against `line`, stamped at `at`.
    pub fn new(
        comment_id: &str,
        comment_body: &str,
        line: &Line,
        ratio: u8,
        at: DateTime<Local>,
    ) -> Self {
        Self {
            comment: comment_body.to_string(),
            reply: line.response.text.clone(),
            ratio,
            accepted_ratio: Some(line.accepted_ratio()),
            time: at.format(LOG_TIME_FORMAT).to_string(),
            season: line.season.clone(),
            episode: line.episode.clone(),
            comment_id: comment_id.to_string(),
            line_id: line.id.clone(),
        }
    }
}

pub trait LogStore {
    fn append(&mut self, entry: LogEntry) -> Result<(), StoreError>;

    /// Full log, oldest first.
    fn load(&self) -> Result<Vec<LogEntry>, StoreError>;

    fn is_logged(&self, comment_id: &str) -> Result<bool, StoreError> {
        Ok(self.load()?.iter().any(|e| e.comment_id == comment_id))
    }

    /// True if `line_id` appears among the last `window` entries.
    fn is_recent_duplicate(&self, line_id: &Scalar, window: usize) -> Result<bool, StoreError> {
        let logs = self.load()?;
        let start = logs.len().saturating_sub(window);
        Ok(logs[start..].iter().any(|e| &e.line_id == line_id))
    }
}

#[cfg(test)]
pub(crate) fn test_entry(comment_id: &str, line_id: i64) -> LogEntry {
    let line = crate::corpus::test_line(line_id, "some scripted line");
    LogEntry::new(comment_id, "a comment body", &line, 70, Local::now())
}
