// src/store/json_file.rs
//! `{ "logs": [...] }` document on disk, reread and rewritten whole on every call.
//!
//! Single-writer only: two processes sharing a file race and may lose entries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{LogEntry, LogStore, StoreError};
use crate::jsonio::{read_document, write_document, DocError};

#[derive(Debug, Default, Serialize, Deserialize)]
struct LogDoc {
    #[serde(default)]
    logs: Vec<LogEntry>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct JsonFileLogStore {
    path: PathBuf,
}

impl JsonFileLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_doc(&self) -> Result<LogDoc, StoreError> {
        read_document(&self.path)
            .map(Option::unwrap_or_default)
            .map_err(|e| self.map_err(e))
    }

    fn map_err(&self, e: DocError) -> StoreError {
        match e {
            DocError::Io(source) => StoreError::Io {
                path: self.path.clone(),
                source,
            },
            DocError::Parse(source) => StoreError::Parse {
                path: self.path.clone(),
                source,
            },
        }
    }
}

impl LogStore for JsonFileLogStore {
    fn append(&mut self, entry: LogEntry) -> Result<(), StoreError> {
        let mut doc = self.read_doc()?;
        debug!(
            target: "store",
            path = %self.path.display(),
            comment_id = %entry.comment_id,
            line_id = %entry.line_id,
            "append log entry"
        );
        doc.logs.push(entry);
        write_document(&self.path, &doc).map_err(|e| self.map_err(e))
    }

    fn load(&self) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self.read_doc()?.logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Scalar;
    use crate::store::test_entry;
    use std::fs;

    #[test]
    fn missing_file_is_empty_and_created_on_append() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("logs/comment_log.json");
        let mut s = JsonFileLogStore::new(&p);

        assert!(s.load().unwrap().is_empty());
        assert!(!s.is_logged("c1").unwrap());

        s.append(test_entry("c1", 4)).unwrap();
        assert!(p.exists());
        assert!(s.is_logged("c1").unwrap());
        assert!(s.is_recent_duplicate(&Scalar::Int(4), 5).unwrap());
    }

    #[test]
    fn appends_keep_order_and_foreign_fields() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("rejected_log.json");
        fs::write(&p, r#"{"owner": "dwight", "logs": []}"#).unwrap();

        let mut s = JsonFileLogStore::new(&p);
        s.append(test_entry("a", 1)).unwrap();
        s.append(test_entry("b", 2)).unwrap();

        let ids: Vec<_> = s.load().unwrap().into_iter().map(|e| e.comment_id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let v: Value = serde_json::from_str(&fs::read_to_string(&p).unwrap()).unwrap();
        assert_eq!(v["owner"], "dwight");
    }

    #[test]
    fn string_ratios_in_existing_logs_are_read() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("comment_log.json");
        fs::write(
            &p,
            r#"{"logs": [{"comment": "bears eat beets", "reply": "False.", "ratio": "72",
                "accepted_ratio": "100", "time": "09/03/2024 14:05:01", "season": "3",
                "episode": 20, "comment_id": "abc", "line_id": 7}]}"#,
        )
        .unwrap();

        let mut s = JsonFileLogStore::new(&p);
        assert!(s.is_logged("abc").unwrap());
        assert!(s.is_recent_duplicate(&Scalar::Int(7), 5).unwrap());
        let e = &s.load().unwrap()[0];
        assert_eq!(e.ratio, 72);
        assert_eq!(e.accepted_ratio, Some(100));

        s.append(test_entry("def", 8)).unwrap();
        let v: Value = serde_json::from_str(&fs::read_to_string(&p).unwrap()).unwrap();
        assert_eq!(v["logs"][0]["accepted_ratio"], 100);
        assert_eq!(v["logs"][0]["season"], "3");
        assert_eq!(v["logs"][1]["comment_id"], "def");
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("comment_log.json");
        fs::write(&p, "{ not json").unwrap();
        let s = JsonFileLogStore::new(&p);
        assert!(matches!(s.load(), Err(StoreError::Parse { .. })));
    }
}
