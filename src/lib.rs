// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod corpus;
pub mod matcher;
pub mod platform;
pub mod policy;
pub mod poll;
pub mod retry;
pub mod store;
pub mod telemetry;

mod jsonio;

// ---- Re-exports for stable public API ----
pub use crate::config::{BotConfig, BotIdentity, SourceMode, Thresholds};
pub use crate::corpus::{Corpus, Line, Scalar};
pub use crate::matcher::{best_match, Match};
pub use crate::platform::{Comment, Platform, PlatformError};
pub use crate::policy::{Outcome, ReplyPolicy};
pub use crate::poll::{BotRunner, CycleReport};
pub use crate::store::{JsonFileLogStore, LogEntry, LogStore, MemoryLogStore};
