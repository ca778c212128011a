// src/config/mod.rs
//! Bot configuration: thresholds, schedule, retry budget and bot identities.
//!
//! Lookup order:
//! 1) $BOT_CONFIG_PATH (must exist)
//! 2) config/bot.toml
//! 3) config/bot.json
//!
//! Env overrides are applied after the file is parsed.

pub mod credentials;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_CONFIG_PATH: &str = "BOT_CONFIG_PATH";
pub const ENV_ACCEPT_RATIO: &str = "BOT_ACCEPT_RATIO";
pub const ENV_REJECT_RATIO: &str = "BOT_REJECT_RATIO";
pub const ENV_MIN_COMMENT_LENGTH: &str = "BOT_MIN_COMMENT_LENGTH";
pub const ENV_RECENCY_WINDOW: &str = "BOT_RECENCY_WINDOW";
pub const ENV_SLEEP_SECS: &str = "BOT_SLEEP_SECS";

pub const DEFAULT_CONFIG_TOML: &str = "config/bot.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/bot.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BOT_CONFIG_PATH points to non-existent path {0}")]
    MissingEnvPath(PathBuf),
    #[error("no config found (tried $BOT_CONFIG_PATH, config/bot.toml, config/bot.json)")]
    NotFound,
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config {path} as TOML or JSON: {reason}")]
    Format { path: PathBuf, reason: String },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("missing credential env var {0}")]
    MissingCredential(String),
}

fn default_accept_ratio() -> u8 {
    60
}
fn default_reject_ratio() -> u8 {
    50
}
fn default_min_comment_length() -> usize {
    20
}
fn default_recency_window() -> usize {
    5
}
fn default_sleep_interval_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    4
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_user_agent() -> String {
    concat!("scripted-reply-bot/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_accepted_log() -> PathBuf {
    PathBuf::from("comment_log.json")
}
fn default_rejected_log() -> PathBuf {
    PathBuf::from("rejected_log.json")
}
fn default_subreddit() -> String {
    "DunderMifflin".to_string()
}
fn default_rising_limit() -> u32 {
    10
}

/// Score gates for the reply policy. Ratios live in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_accept_ratio", deserialize_with = "clamped_ratio")]
    pub accept_ratio: u8,
    #[serde(default = "default_reject_ratio", deserialize_with = "clamped_ratio")]
    pub reject_ratio: u8,
    #[serde(default = "default_min_comment_length")]
    pub min_comment_length: usize,
    /// Last N accepted entries checked for a repeated line; 0 disables the check.
    #[serde(default = "default_recency_window")]
    pub recency_window: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            accept_ratio: default_accept_ratio(),
            reject_ratio: default_reject_ratio(),
            min_comment_length: default_min_comment_length(),
            recency_window: default_recency_window(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default = "default_sleep_interval_secs")]
    pub sleep_interval_secs: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            sleep_interval_secs: default_sleep_interval_secs(),
        }
    }
}

impl Schedule {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sleep_interval_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Where a bot reads comments from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceMode {
    /// New comments of one community, polled as a stream.
    Stream {
        #[serde(default = "default_subreddit")]
        subreddit: String,
    },
    /// Comment trees of the currently rising threads across the platform.
    Rising {
        #[serde(default = "default_rising_limit")]
        limit: u32,
    },
}

impl Default for SourceMode {
    fn default() -> Self {
        SourceMode::Stream {
            subreddit: default_subreddit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotIdentity {
    /// Account name; comments by any configured name are never answered.
    pub name: String,
    pub corpus: PathBuf,
    #[serde(default = "default_accepted_log")]
    pub accepted_log: PathBuf,
    #[serde(default = "default_rejected_log")]
    pub rejected_log: PathBuf,
    #[serde(default)]
    pub source: SourceMode,
    /// Env var prefix for this bot's credentials; derived from `name` when absent.
    #[serde(default)]
    pub credentials_env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub bots: Vec<BotIdentity>,
}

impl BotConfig {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext).map_err(|reason| ConfigError::Format {
            path: path.to_path_buf(),
            reason,
        })?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    /// Load using env var + fallbacks (see module docs).
    pub fn load_default() -> Result<Self, ConfigError> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(ConfigError::MissingEnvPath(pb));
            }
            return Self::load_from(&pb);
        }
        for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
            let p = PathBuf::from(candidate);
            if p.exists() {
                return Self::load_from(&p);
            }
        }
        Err(ConfigError::NotFound)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = parse_env::<u64>(ENV_ACCEPT_RATIO) {
            self.thresholds.accept_ratio = clamp_ratio(v);
        }
        if let Some(v) = parse_env::<u64>(ENV_REJECT_RATIO) {
            self.thresholds.reject_ratio = clamp_ratio(v);
        }
        if let Some(v) = parse_env(ENV_MIN_COMMENT_LENGTH) {
            self.thresholds.min_comment_length = v;
        }
        if let Some(v) = parse_env(ENV_RECENCY_WINDOW) {
            self.thresholds.recency_window = v;
        }
        if let Some(v) = parse_env(ENV_SLEEP_SECS) {
            self.schedule.sleep_interval_secs = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bots.is_empty() {
            return Err(ConfigError::Invalid("no bots configured".into()));
        }
        let mut names = HashSet::new();
        for b in &self.bots {
            let name = b.name.trim();
            if name.is_empty() {
                return Err(ConfigError::Invalid("bot with empty name".into()));
            }
            if !names.insert(name.to_ascii_lowercase()) {
                return Err(ConfigError::Invalid(format!("duplicate bot name {name}")));
            }
            if b.corpus.as_os_str().is_empty() {
                return Err(ConfigError::Invalid(format!("bot {name} has no corpus path")));
            }
            if matches!(b.source, SourceMode::Rising { limit: 0 }) {
                return Err(ConfigError::Invalid(format!("bot {name}: rising limit must be > 0")));
            }
        }
        if self.thresholds.accept_ratio > 100 || self.thresholds.reject_ratio > 100 {
            return Err(ConfigError::Invalid("ratios must be within 0..=100".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be >= 1".into()));
        }
        Ok(())
    }

    /// Every configured bot account name.
    pub fn bot_identities(&self) -> Vec<String> {
        self.bots.iter().map(|b| b.name.clone()).collect()
    }
}

/// Parse by extension hint; without one, JSON first then TOML (the TOML error is kept).
fn parse_config(s: &str, hint_ext: &str) -> Result<BotConfig, String> {
    match hint_ext {
        "toml" => toml::from_str(s).map_err(|e| e.to_string()),
        "json" => serde_json::from_str(s).map_err(|e| e.to_string()),
        _ => serde_json::from_str(s).or_else(|_| toml::from_str(s).map_err(|e| e.to_string())),
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn clamp_ratio(v: u64) -> u8 {
    v.min(100) as u8
}

fn clamped_ratio<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    u64::deserialize(d).map(clamp_ratio)
}
