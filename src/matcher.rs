// src/matcher.rs
//! Fuzzy matching of a comment against the line corpus.
//!
//! Similarity: `strsim::normalized_levenshtein` on normalized text, scaled to `0..=100`.

use once_cell::sync::OnceCell;
use regex::Regex;
use strsim::normalized_levenshtein;
use thiserror::Error;

use crate::corpus::Line;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MatchError {
    #[error("line corpus is empty; nothing to match against")]
    EmptyCorpus,
}

/// Best line for a comment plus its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'a> {
    pub line: &'a Line,
    pub ratio: u8,
}

/// Decode HTML entities, lowercase, collapse whitespace, trim.
pub fn normalize(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s).to_lowercase();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Similarity ratio between two texts in `0..=100`.
pub fn ratio(a: &str, b: &str) -> u8 {
    let sim = normalized_levenshtein(&normalize(a), &normalize(b));
    (sim * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Score `comment` against every line and return the best one.
///
/// Ties go to the *last* line reaching the running maximum (`>=` replacement).
pub fn best_match<'a>(comment: &str, lines: &'a [Line]) -> Result<Match<'a>, MatchError> {
    let first = lines.first().ok_or(MatchError::EmptyCorpus)?;
    let comment = normalize(comment);

    let mut best = Match {
        line: first,
        ratio: 0,
    };
    for line in lines {
        let sim = normalized_levenshtein(&comment, &normalize(&line.line));
        let score = (sim * 100.0).round().clamp(0.0, 100.0) as u8;
        if score >= best.ratio {
            best = Match { line, ratio: score };
        }
    }
    Ok(best)
}
