// src/poll.rs
//! # Poll Loop
//! One `BotRunner` per bot identity. Runners take turns: one full cycle
//! (fetch → policy for every comment, in order), then a fixed sleep, then the
//! next runner. Anything that escapes the retry wrapper ends the loop.

use anyhow::{Context, Result};
use metrics::gauge;
use tracing::{debug, info};

use crate::config::{BotConfig, BotIdentity, Schedule, SourceMode};
use crate::corpus::Corpus;
use crate::platform::Platform;
use crate::policy::{Outcome, ReplyPolicy};
use crate::retry::{retry, Backoff};
use crate::store::{JsonFileLogStore, LogStore};

/// Per-cycle tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub seen: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub ignored: usize,
    /// Accept or reject band, but suppressed by a duplicate check.
    pub skipped: usize,
    pub below_threshold: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &Outcome) {
        self.seen += 1;
        match outcome {
            Outcome::Ignored(_) => self.ignored += 1,
            Outcome::Accepted { .. } => self.accepted += 1,
            Outcome::Rejected { .. } => self.rejected += 1,
            Outcome::AlreadyReplied { .. }
            | Outcome::RecentDuplicate { .. }
            | Outcome::AlreadyRejected { .. } => self.skipped += 1,
            Outcome::BelowThreshold { .. } => self.below_threshold += 1,
        }
    }
}

pub struct BotRunner {
    name: String,
    platform: Box<dyn Platform>,
    corpus: Corpus,
    accepted: Box<dyn LogStore>,
    rejected: Box<dyn LogStore>,
    source: SourceMode,
    policy: ReplyPolicy,
}

impl BotRunner {
    pub fn new(
        name: impl Into<String>,
        platform: Box<dyn Platform>,
        corpus: Corpus,
        accepted: Box<dyn LogStore>,
        rejected: Box<dyn LogStore>,
        source: SourceMode,
        policy: ReplyPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            platform,
            corpus,
            accepted,
            rejected,
            source,
            policy,
        }
    }

    /// File-backed runner for `bot`; loads and validates its corpus.
    pub fn from_config(bot: &BotIdentity, cfg: &BotConfig, platform: Box<dyn Platform>) -> Result<Self> {
        let corpus = Corpus::load(&bot.corpus)
            .with_context(|| format!("loading corpus for {}", bot.name))?;
        corpus
            .validate()
            .with_context(|| format!("corpus {} for {}", bot.corpus.display(), bot.name))?;
        let policy = ReplyPolicy::new(cfg.thresholds, cfg.bot_identities())
            .with_backoff(Backoff::from(cfg.retry));
        Ok(Self::new(
            bot.name.clone(),
            platform,
            corpus,
            Box::new(JsonFileLogStore::new(&bot.accepted_log)),
            Box::new(JsonFileLogStore::new(&bot.rejected_log)),
            bot.source.clone(),
            policy,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub async fn authenticate(&self, backoff: &Backoff) -> Result<()> {
        let platform = self.platform.as_ref();
        retry("authenticate", backoff, || platform.authenticate())
            .await
            .with_context(|| format!("authenticating {}", self.name))
    }

    /// Fetch one batch and run the policy over it in order.
    pub async fn run_cycle(&mut self, backoff: &Backoff) -> Result<CycleReport> {
        let platform = self.platform.as_ref();
        let comments = match &self.source {
            SourceMode::Stream { subreddit } => {
                let sub = subreddit.as_str();
                retry("new_comments", backoff, || platform.new_comments(sub))
                    .await
                    .with_context(|| format!("{}: fetching r/{sub} comments", self.name))?
            }
            SourceMode::Rising { limit } => {
                let limit = *limit;
                retry("rising_comments", backoff, || platform.rising_comments(limit))
                    .await
                    .with_context(|| format!("{}: scanning rising threads", self.name))?
            }
        };

        let mut report = CycleReport::default();
        for comment in &comments {
            let outcome = self
                .policy
                .handle(
                    comment,
                    &mut self.corpus,
                    self.accepted.as_mut(),
                    self.rejected.as_mut(),
                    platform,
                )
                .await
                .with_context(|| format!("{}: handling comment {}", self.name, comment.id))?;
            debug!(target: "poll", bot = %self.name, comment_id = %comment.id, outcome = outcome.label(), "comment handled");
            report.record(&outcome);
        }

        gauge!("bot_last_cycle_ts").set(chrono::Utc::now().timestamp() as f64);
        info!(
            target: "poll",
            bot = %self.name,
            account = platform.name(),
            seen = report.seen,
            accepted = report.accepted,
            rejected = report.rejected,
            ignored = report.ignored,
            skipped = report.skipped,
            "cycle finished"
        );
        Ok(report)
    }
}

/// Round-robin over `runners`; `max_rounds = None` runs until an error.
pub async fn run(
    runners: &mut [BotRunner],
    schedule: &Schedule,
    backoff: &Backoff,
    max_rounds: Option<u64>,
) -> Result<()> {
    anyhow::ensure!(!runners.is_empty(), "no bot runners to poll");
    let mut round: u64 = 0;
    loop {
        if max_rounds.is_some_and(|m| round >= m) {
            return Ok(());
        }
        round += 1;
        for runner in runners.iter_mut() {
            runner.run_cycle(backoff).await?;
            tokio::time::sleep(schedule.interval()).await;
        }
    }
}

pub async fn run_forever(runners: &mut [BotRunner], schedule: &Schedule, backoff: &Backoff) -> Result<()> {
    run(runners, schedule, backoff, None).await
}
