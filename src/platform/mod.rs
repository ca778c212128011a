// src/platform/mod.rs
//! Social platform boundary: read comments, post replies.

pub mod reddit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub use reddit::RedditClient;

/// A platform comment. Read-only from the bot's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    /// `None` for deleted accounts.
    pub author: Option<String>,
    pub body: String,
    /// Unix seconds.
    pub created_utc: i64,
}

impl Comment {
    pub fn new(id: impl Into<String>, author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            author: Some(author.into()),
            body: body.into(),
            created_utc: chrono::Utc::now().timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("server error {status}")]
    Server { status: u16 },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("api error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::Network(_)
                | PlatformError::RateLimited { .. }
                | PlatformError::Server { .. }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PlatformError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Open (or refresh) the session. Called once at startup so bad credentials fail early.
    async fn authenticate(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    /// Next batch of not-yet-seen comments posted to `subreddit`, oldest first.
    async fn new_comments(&self, subreddit: &str) -> Result<Vec<Comment>, PlatformError>;

    /// Comment trees of up to `limit` rising threads, flattened breadth-first.
    async fn rising_comments(&self, limit: u32) -> Result<Vec<Comment>, PlatformError>;

    async fn reply(&self, comment_id: &str, text: &str) -> Result<(), PlatformError>;

    fn name(&self) -> &str;
}
