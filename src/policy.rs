// src/policy.rs
//! # Reply Policy
//! Turns one comment into an outcome: ignore, reply, near-miss log, or nothing.
//!
//! Order of side effects on accept: duplicate checks → accepted-log append →
//! reply → `reply_count` bump. A crash between the append and the reply leaves a
//! logged comment without a reply; it is never answered twice.

use chrono::Local;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Thresholds;
use crate::corpus::{Corpus, CorpusError, Scalar};
use crate::matcher::{best_match, MatchError};
use crate::platform::{Comment, Platform, PlatformError};
use crate::retry::{retry, Backoff};
use crate::store::{LogEntry, LogStore, StoreError};
use crate::telemetry::ensure_metrics_described;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("posting reply: {0}")]
    Platform(#[from] PlatformError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Written by one of the configured bot accounts.
    OwnComment,
    TooShort,
}

/// Which gate a score clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Accept,
    Reject,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    Accepted {
        line_id: Scalar,
        ratio: u8,
        reply_count: u64,
    },
    /// Accept band, but this comment is already in the accepted log.
    AlreadyReplied { line_id: Scalar, ratio: u8 },
    /// Accept band, but the line fired within the recency window.
    RecentDuplicate { line_id: Scalar, ratio: u8 },
    Rejected { line_id: Scalar, ratio: u8 },
    AlreadyRejected { line_id: Scalar, ratio: u8 },
    BelowThreshold { ratio: u8 },
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Ignored(_) => "ignored",
            Outcome::Accepted { .. } => "accepted",
            Outcome::AlreadyReplied { .. } => "already_replied",
            Outcome::RecentDuplicate { .. } => "recent_duplicate",
            Outcome::Rejected { .. } => "rejected",
            Outcome::AlreadyRejected { .. } => "already_rejected",
            Outcome::BelowThreshold { .. } => "below_threshold",
        }
    }
}

/// Accept if the score clears the global bar or the line's own bar; otherwise
/// reject-log if it clears the reject bar.
pub fn classify(ratio: u8, line_accepted_ratio: u8, t: &Thresholds) -> Band {
    if ratio >= t.accept_ratio || ratio >= line_accepted_ratio {
        Band::Accept
    } else if ratio >= t.reject_ratio {
        Band::Reject
    } else {
        Band::None
    }
}

#[derive(Debug, Clone)]
pub struct ReplyPolicy {
    thresholds: Thresholds,
    bot_identities: Vec<String>,
    backoff: Backoff,
}

impl ReplyPolicy {
    pub fn new(thresholds: Thresholds, bot_identities: Vec<String>) -> Self {
        Self {
            thresholds,
            bot_identities,
            backoff: Backoff::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn ignore_reason(&self, comment: &Comment) -> Option<IgnoreReason> {
        let own = comment.author.as_deref().is_some_and(|a| {
            self.bot_identities
                .iter()
                .any(|b| b.eq_ignore_ascii_case(a))
        });
        if own {
            return Some(IgnoreReason::OwnComment);
        }
        if comment.body.chars().count() < self.thresholds.min_comment_length {
            return Some(IgnoreReason::TooShort);
        }
        None
    }

    pub async fn handle<P>(
        &self,
        comment: &Comment,
        corpus: &mut Corpus,
        accepted: &mut dyn LogStore,
        rejected: &mut dyn LogStore,
        platform: &P,
    ) -> Result<Outcome, PolicyError>
    where
        P: Platform + ?Sized,
    {
        ensure_metrics_described();
        counter!("bot_comments_seen_total").increment(1);

        if let Some(reason) = self.ignore_reason(comment) {
            counter!("bot_ignored_total").increment(1);
            return Ok(Outcome::Ignored(reason));
        }

        let (entry, line_id, ratio, band) = {
            let m = best_match(&comment.body, corpus.lines())?;
            let band = classify(m.ratio, m.line.accepted_ratio(), &self.thresholds);
            debug!(
                target: "policy",
                comment_id = %comment.id,
                line_id = %m.line.id,
                ratio = m.ratio,
                comment = %comment.body,
                reply = %m.line.response.text,
                "best match"
            );
            let entry = LogEntry::new(&comment.id, &comment.body, m.line, m.ratio, Local::now());
            (entry, m.line.id.clone(), m.ratio, band)
        };

        match band {
            Band::Accept => {
                if accepted.is_logged(&comment.id)? {
                    return Ok(Outcome::AlreadyReplied { line_id, ratio });
                }
                if accepted.is_recent_duplicate(&line_id, self.thresholds.recency_window)? {
                    debug!(target: "policy", comment_id = %comment.id, line_id = %line_id, "line used recently, skipping");
                    return Ok(Outcome::RecentDuplicate { line_id, ratio });
                }

                let reply = entry.reply.clone();
                accepted.append(entry)?;
                retry("reply", &self.backoff, || platform.reply(&comment.id, &reply)).await?;
                let reply_count = corpus.increment_reply_count(&line_id)?;

                counter!("bot_replies_posted_total").increment(1);
                info!(
                    target: "policy",
                    comment_id = %comment.id,
                    line_id = %line_id,
                    ratio,
                    reply_count,
                    comment = %comment.body,
                    reply = %reply,
                    "ACCEPTED"
                );
                Ok(Outcome::Accepted {
                    line_id,
                    ratio,
                    reply_count,
                })
            }
            Band::Reject => {
                if rejected.is_logged(&comment.id)? {
                    return Ok(Outcome::AlreadyRejected { line_id, ratio });
                }
                rejected.append(entry)?;
                counter!("bot_rejected_logged_total").increment(1);
                info!(
                    target: "policy",
                    comment_id = %comment.id,
                    line_id = %line_id,
                    ratio,
                    comment = %comment.body,
                    "REJECTED"
                );
                Ok(Outcome::Rejected { line_id, ratio })
            }
            Band::None => Ok(Outcome::BelowThreshold { ratio }),
        }
    }
}
