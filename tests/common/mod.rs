// tests/common/mod.rs
// Scripted in-memory platform shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use scripted_reply_bot::{Comment, Platform, PlatformError};
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct State {
    batches: VecDeque<Result<Vec<Comment>, PlatformError>>,
    reply_failures: VecDeque<PlatformError>,
    replies: Vec<(String, String)>,
    fetches: usize,
    rising_limits: Vec<u32>,
}

/// Cloneable handle; clones share state so a test can inspect what the runner did.
#[derive(Clone, Default)]
pub struct FakeReddit {
    state: Arc<Mutex<State>>,
}

impl FakeReddit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one fetch result; fetches past the queue return an empty batch.
    pub fn push_batch(&self, batch: Vec<Comment>) -> &Self {
        self.state.lock().batches.push_back(Ok(batch));
        self
    }

    pub fn push_fetch_error(&self, err: PlatformError) -> &Self {
        self.state.lock().batches.push_back(Err(err));
        self
    }

    pub fn fail_next_reply(&self, err: PlatformError) -> &Self {
        self.state.lock().reply_failures.push_back(err);
        self
    }

    pub fn replies(&self) -> Vec<(String, String)> {
        self.state.lock().replies.clone()
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().fetches
    }

    pub fn rising_limits(&self) -> Vec<u32> {
        self.state.lock().rising_limits.clone()
    }

    fn next_batch(&self) -> Result<Vec<Comment>, PlatformError> {
        let mut st = self.state.lock();
        st.fetches += 1;
        st.batches.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[async_trait]
impl Platform for FakeReddit {
    async fn new_comments(&self, _subreddit: &str) -> Result<Vec<Comment>, PlatformError> {
        self.next_batch()
    }

    async fn rising_comments(&self, limit: u32) -> Result<Vec<Comment>, PlatformError> {
        self.state.lock().rising_limits.push(limit);
        self.next_batch()
    }

    async fn reply(&self, comment_id: &str, text: &str) -> Result<(), PlatformError> {
        let mut st = self.state.lock();
        if let Some(err) = st.reply_failures.pop_front() {
            return Err(err);
        }
        st.replies.push((comment_id.to_string(), text.to_string()));
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub const CORPUS_JSON: &str = r#"{
    "lines": [
        {"id": 1, "line": "I am Beyoncé, always", "response": {"text": "Identity theft is not a joke, Jim!"},
         "season": 3, "episode": 10, "reply_count": 0},
        {"id": 2, "line": "aaaaaaaaaaaaaaaaaaaa", "response": {"text": "Bears. Beets. Battlestar Galactica."},
         "season": 3, "episode": 20, "reply_count": "2"},
        {"id": 3, "line": "Whenever I'm about to do something, I think", "response": {"text": "Would an idiot do that?"},
         "season": 6, "episode": 1, "accepted_ratio": "90"}
    ]
}"#;

/// Write the sample corpus into `dir` and return its path.
pub fn write_corpus(dir: &std::path::Path) -> std::path::PathBuf {
    let p = dir.join("dwight-replies.json");
    std::fs::write(&p, CORPUS_JSON).unwrap();
    p
}
