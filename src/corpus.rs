// src/corpus.rs
//! # Line Corpus
//! Scripted character lines with their canned responses, loaded from
//! `{ "lines": [...] }` and rewritten whenever a `reply_count` changes.
//!
//! Unknown fields (root and per line) survive the rewrite untouched.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::jsonio::{read_document, write_document, DocError};

/// Per-line threshold used when a line carries no `accepted_ratio`.
pub const DEFAULT_LINE_ACCEPTED_RATIO: u8 = 100;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("reading corpus {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing corpus {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("corpus file {0} does not exist")]
    Missing(PathBuf),
    #[error("corpus has no lines")]
    Empty,
    #[error("corpus line {id} is malformed: {reason}")]
    Malformed { id: Scalar, reason: &'static str },
    #[error("corpus line id {0} appears more than once")]
    DuplicateId(Scalar),
    #[error("no corpus line with id {0}")]
    UnknownLine(Scalar),
}

impl CorpusError {
    fn from_doc(path: &Path, e: DocError) -> Self {
        match e {
            DocError::Io(source) => Self::Io {
                path: path.to_path_buf(),
                source,
            },
            DocError::Parse(source) => Self::Parse {
                path: path.to_path_buf(),
                source,
            },
        }
    }
}

/// JSON scalar that may be written as an integer or a string (`"id": 7` or `"id": "s2e4-1"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Scalar::Int(n.into())
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: Scalar,
    /// Source text comments are matched against.
    pub line: String,
    pub response: Response,
    #[serde(default)]
    pub season: Option<Scalar>,
    #[serde(default)]
    pub episode: Option<Scalar>,
    /// Moderator override; a line accepts once the score reaches this value.
    #[serde(
        default,
        deserialize_with = "lenient_opt_u8",
        skip_serializing_if = "Option::is_none"
    )]
    pub accepted_ratio: Option<u8>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub reply_count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Line {
    pub fn new(id: impl Into<Scalar>, line: impl Into<String>, reply: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            line: line.into(),
            response: Response {
                text: reply.into(),
                extra: Map::new(),
            },
            season: None,
            episode: None,
            accepted_ratio: None,
            reply_count: 0,
            extra: Map::new(),
        }
    }

    pub fn with_episode(mut self, season: impl Into<Scalar>, episode: impl Into<Scalar>) -> Self {
        self.season = Some(season.into());
        self.episode = Some(episode.into());
        self
    }

    pub fn with_accepted_ratio(mut self, ratio: u8) -> Self {
        self.accepted_ratio = Some(ratio.min(100));
        self
    }

    /// Effective per-line threshold (defaults to 100).
    pub fn accepted_ratio(&self) -> u8 {
        self.accepted_ratio.unwrap_or(DEFAULT_LINE_ACCEPTED_RATIO)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CorpusDoc {
    lines: Vec<Line>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// The loaded corpus. File-backed corpora persist counter changes immediately.
#[derive(Debug, Clone)]
pub struct Corpus {
    path: Option<PathBuf>,
    doc: CorpusDoc,
}

impl Corpus {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let doc: CorpusDoc = read_document(path)
            .map_err(|e| CorpusError::from_doc(path, e))?
            .ok_or_else(|| CorpusError::Missing(path.to_path_buf()))?;
        debug!(target: "corpus", path = %path.display(), lines = doc.lines.len(), "corpus loaded");
        Ok(Self {
            path: Some(path.to_path_buf()),
            doc,
        })
    }

    /// In-memory corpus; counter changes are not persisted.
    pub fn from_lines(lines: Vec<Line>) -> Self {
        Self {
            path: None,
            doc: CorpusDoc {
                lines,
                extra: Map::new(),
            },
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.doc.lines
    }

    pub fn get(&self, id: &Scalar) -> Option<&Line> {
        self.doc.lines.iter().find(|l| &l.id == id)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Startup check: non-empty, well-formed, unique ids.
    pub fn validate(&self) -> Result<(), CorpusError> {
        if self.doc.lines.is_empty() {
            return Err(CorpusError::Empty);
        }
        let mut seen = HashSet::new();
        for l in &self.doc.lines {
            if l.line.trim().is_empty() {
                return Err(CorpusError::Malformed {
                    id: l.id.clone(),
                    reason: "empty line text",
                });
            }
            if l.response.text.trim().is_empty() {
                return Err(CorpusError::Malformed {
                    id: l.id.clone(),
                    reason: "empty response text",
                });
            }
            if !seen.insert(&l.id) {
                return Err(CorpusError::DuplicateId(l.id.clone()));
            }
        }
        Ok(())
    }

    /// Bump `reply_count` of line `id` by one and persist. Returns the new count.
    pub fn increment_reply_count(&mut self, id: &Scalar) -> Result<u64, CorpusError> {
        let line = self
            .doc
            .lines
            .iter_mut()
            .find(|l| &l.id == id)
            .ok_or_else(|| CorpusError::UnknownLine(id.clone()))?;
        line.reply_count = line.reply_count.saturating_add(1);
        let count = line.reply_count;

        if let Some(path) = &self.path {
            write_document(path, &self.doc).map_err(|e| CorpusError::from_doc(path, e))?;
        }
        debug!(target: "corpus", line_id = %id, reply_count = count, "reply count incremented");
        Ok(count)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Num(f64),
    Text(String),
}

impl NumOrText {
    fn as_f64(&self) -> Option<f64> {
        match self {
            NumOrText::Num(n) => Some(*n),
            NumOrText::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Finite and within `0..=100`; anything else is a malformed value.
fn ratio_in_range(v: &NumOrText) -> Option<u8> {
    v.as_f64()
        .filter(|n| n.is_finite() && (0.0..=100.0).contains(n))
        .map(|n| n as u8)
}

pub(crate) fn lenient_u8<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let v = NumOrText::deserialize(d)?;
    ratio_in_range(&v).ok_or_else(|| serde::de::Error::custom("ratio must be a number within 0..=100"))
}

pub(crate) fn lenient_opt_u8<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
    let raw: Option<NumOrText> = Option::deserialize(d)?;
    match raw {
        None => Ok(None),
        Some(v) => ratio_in_range(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("accepted_ratio must be a number within 0..=100")),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    NumOrText::deserialize(d)?
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64)
        .ok_or_else(|| serde::de::Error::custom("reply_count must be a non-negative number"))
}

#[cfg(test)]
pub(crate) fn test_line(id: i64, text: &str) -> Line {
    Line::new(id, text, format!("reply to {text}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = r#"{
        "character": "Dwight",
        "lines": [
            {"id": 1, "line": "Who is the best salesman?", "response": {"text": "Me."},
             "season": 2, "episode": "5", "accepted_ratio": "80", "reply_count": 3, "tags": ["x"]},
            {"id": "s3-7", "line": "Bears eat beets", "response": {"text": "False."},
             "season": 3, "episode": 20, "reply_count": "0"}
        ]
    }"#;

    #[test]
    fn loads_lenient_numbers_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("lines.json");
        fs::write(&p, SAMPLE).unwrap();

        let c = Corpus::load(&p).unwrap();
        c.validate().unwrap();
        assert_eq!(c.lines()[0].accepted_ratio(), 80);
        assert_eq!(c.lines()[0].reply_count, 3);
        assert_eq!(c.lines()[1].id, Scalar::Text("s3-7".into()));
        assert_eq!(c.lines()[1].accepted_ratio(), DEFAULT_LINE_ACCEPTED_RATIO);
        assert_eq!(c.lines()[1].episode, Some(Scalar::Int(20)));
    }

    #[test]
    fn increment_persists_and_keeps_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("lines.json");
        fs::write(&p, SAMPLE).unwrap();

        let mut c = Corpus::load(&p).unwrap();
        assert_eq!(c.increment_reply_count(&Scalar::Int(1)).unwrap(), 4);

        let v: Value = serde_json::from_str(&fs::read_to_string(&p).unwrap()).unwrap();
        assert_eq!(v["character"], "Dwight");
        assert_eq!(v["lines"][0]["reply_count"], 4);
        assert_eq!(v["lines"][0]["tags"][0], "x");
        assert_eq!(v["lines"][1]["id"], "s3-7");
        assert_eq!(v["lines"][0]["episode"], "5");
    }

    #[test]
    fn increment_unknown_line_fails() {
        let mut c = Corpus::from_lines(vec![test_line(1, "hello there")]);
        assert!(matches!(
            c.increment_reply_count(&Scalar::Int(9)),
            Err(CorpusError::UnknownLine(_))
        ));
    }

    #[test]
    fn validate_rejects_empty_duplicate_and_malformed() {
        assert!(matches!(
            Corpus::from_lines(vec![]).validate(),
            Err(CorpusError::Empty)
        ));
        assert!(matches!(
            Corpus::from_lines(vec![test_line(1, "a"), test_line(1, "b")]).validate(),
            Err(CorpusError::DuplicateId(Scalar::Int(1)))
        ));
        assert!(matches!(
            Corpus::from_lines(vec![Line::new(1, "  ", "x")]).validate(),
            Err(CorpusError::Malformed { .. })
        ));
    }

    #[test]
    fn out_of_range_or_non_numeric_ratio_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("lines.json");
        for bad in [r#""NaN""#, "-5", "150", r#""inf""#, r#""high""#] {
            let doc = format!(
                r#"{{"lines": [{{"id": 1, "line": "Bears eat beets", "response": {{"text": "False."}}, "accepted_ratio": {bad}}}]}}"#
            );
            fs::write(&p, doc).unwrap();
            assert!(
                matches!(Corpus::load(&p), Err(CorpusError::Parse { .. })),
                "accepted_ratio {bad} should not load"
            );
        }

        fs::write(
            &p,
            r#"{"lines": [{"id": 1, "line": "Bears eat beets", "response": {"text": "False."}, "accepted_ratio": " 0 "}]}"#,
        )
        .unwrap();
        assert_eq!(Corpus::load(&p).unwrap().lines()[0].accepted_ratio(), 0);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Corpus::load(dir.path().join("none.json")),
            Err(CorpusError::Missing(_))
        ));
    }
}
