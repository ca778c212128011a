// src/platform/reddit.rs
//! Reddit over OAuth (script app, password grant).
//!
//! - `new_comments` emulates a live stream: it polls `/r/{sub}/comments` and
//!   yields only ids not seen before (bounded seen-set).
//! - `rising_comments` walks `/r/all/rising` and flattens each thread's comment
//!   tree breadth-first; "load more" stubs are skipped.

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{Comment, Platform, PlatformError};
use crate::config::credentials::Credentials;

pub const AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const API_URL: &str = "https://oauth.reddit.com";

const SEEN_CAP: usize = 1000;
const STREAM_PAGE: u32 = 100;
const THREAD_LIMIT: u32 = 500;
/// Refresh the token this long before Reddit says it expires.
const TOKEN_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Token {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    http: Client,
    creds: Credentials,
    auth_url: String,
    api_url: String,
    token: tokio::sync::Mutex<Option<Token>>,
    seen: Mutex<SeenSet>,
}

impl RedditClient {
    pub fn new(creds: Credentials, user_agent: &str) -> Result<Self, PlatformError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| PlatformError::Network(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            creds,
            auth_url: AUTH_URL.to_string(),
            api_url: API_URL.to_string(),
            token: tokio::sync::Mutex::new(None),
            seen: Mutex::new(SeenSet::with_capacity(SEEN_CAP)),
        })
    }

    async fn bearer(&self, force: bool) -> Result<String, PlatformError> {
        let mut guard = self.token.lock().await;
        if let Some(t) = guard.as_ref() {
            if !force && Instant::now() + TOKEN_SLACK < t.expires_at {
                return Ok(t.value.clone());
            }
        }

        #[derive(Deserialize)]
        struct TokenResp {
            access_token: Option<String>,
            #[serde(default)]
            expires_in: Option<u64>,
            #[serde(default)]
            error: Option<String>,
        }

        let resp = self
            .http
            .post(&self.auth_url)
            .basic_auth(&self.creds.client_id, Some(&self.creds.client_secret))
            .form(&[
                ("grant_type", "password"),
                ("username", self.creds.username.as_str()),
                ("password", self.creds.password.as_str()),
            ])
            .send()
            .await
            .map_err(network)?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(PlatformError::Auth(format!("token endpoint returned {status}")));
        }
        let resp = check_status(resp).await?;
        let body: TokenResp = resp
            .json()
            .await
            .map_err(|e| PlatformError::Decode(format!("token response: {e}")))?;

        // Reddit reports bad passwords as 200 + {"error": "invalid_grant"}.
        let value = match (body.access_token, body.error) {
            (Some(tok), None) => tok,
            (_, Some(err)) => return Err(PlatformError::Auth(err)),
            (None, None) => return Err(PlatformError::Auth("no access_token in response".into())),
        };
        let ttl = Duration::from_secs(body.expires_in.unwrap_or(3600));
        info!(target: "platform", user = %self.creds.username, ttl_secs = ttl.as_secs(), "reddit session authenticated");
        *guard = Some(Token {
            value: value.clone(),
            expires_at: Instant::now() + ttl,
        });
        Ok(value)
    }

    /// Send an authenticated request; one transparent re-auth on 401.
    async fn send_authed<F>(&self, build: F) -> Result<reqwest::Response, PlatformError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.bearer(false).await?;
        let resp = build(&self.http)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(network)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp).await;
        }

        debug!(target: "platform", "401 from api, refreshing token");
        let token = self.bearer(true).await?;
        let resp = build(&self.http)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(network)?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Err(PlatformError::Auth("api rejected a fresh token".into()));
        }
        check_status(resp).await
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, PlatformError> {
        let url = format!("{}{}", self.api_url, path);
        let resp = self
            .send_authed(|c| c.get(&url).query(query).query(&[("raw_json", "1")]))
            .await?;
        resp.json()
            .await
            .map_err(|e| PlatformError::Decode(format!("{path}: {e}")))
    }

    async fn thread_comments(&self, thread_id: &str) -> Result<Vec<Comment>, PlatformError> {
        let v = self
            .get_json(
                &format!("/comments/{thread_id}"),
                &[("limit", THREAD_LIMIT.to_string())],
            )
            .await?;
        // [post listing, comment listing]
        let comments = v
            .get(1)
            .ok_or_else(|| PlatformError::Decode(format!("thread {thread_id}: missing comment listing")))?;
        Ok(flatten_comment_tree(comments))
    }
}

#[async_trait]
impl Platform for RedditClient {
    async fn authenticate(&self) -> Result<(), PlatformError> {
        self.bearer(true).await.map(|_| ())
    }

    async fn new_comments(&self, subreddit: &str) -> Result<Vec<Comment>, PlatformError> {
        let v = self
            .get_json(
                &format!("/r/{subreddit}/comments"),
                &[("limit", STREAM_PAGE.to_string())],
            )
            .await?;
        let mut fresh = parse_listing_comments(&v)?;
        // listing is newest first
        fresh.reverse();

        let mut seen = self
            .seen
            .lock()
            .map_err(|_| PlatformError::Decode("seen-set mutex poisoned".into()))?;
        fresh.retain(|c| seen.insert(&c.id));
        debug!(target: "platform", subreddit, fresh = fresh.len(), "stream poll");
        Ok(fresh)
    }

    async fn rising_comments(&self, limit: u32) -> Result<Vec<Comment>, PlatformError> {
        let v = self
            .get_json("/r/all/rising", &[("limit", limit.to_string())])
            .await?;
        let thread_ids = parse_listing_ids(&v, "t3")?;
        let mut out = Vec::new();
        for id in thread_ids.iter().take(limit as usize) {
            out.extend(self.thread_comments(id).await?);
        }
        debug!(target: "platform", threads = thread_ids.len(), comments = out.len(), "rising scan");
        Ok(out)
    }

    async fn reply(&self, comment_id: &str, text: &str) -> Result<(), PlatformError> {
        let url = format!("{}/api/comment", self.api_url);
        let thing_id = format!("t1_{comment_id}");
        let resp = self
            .send_authed(|c| {
                c.post(&url).form(&[
                    ("api_type", "json"),
                    ("thing_id", thing_id.as_str()),
                    ("text", text),
                ])
            })
            .await?;
        let v: Value = resp
            .json()
            .await
            .map_err(|e| PlatformError::Decode(format!("reply response: {e}")))?;
        check_api_errors(&v)
    }

    fn name(&self) -> &str {
        &self.creds.username
    }
}

fn network(e: reqwest::Error) -> PlatformError {
    PlatformError::Network(e.to_string())
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(PlatformError::RateLimited {
            retry_after: retry_after(resp.headers()),
        });
    }
    if status.is_server_error() {
        return Err(PlatformError::Server {
            status: status.as_u16(),
        });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PlatformError::Api {
        status: status.as_u16(),
        body: body.chars().take(300).collect(),
    })
}

/// `Retry-After` (seconds) or Reddit's `x-ratelimit-reset`.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    ["retry-after", "x-ratelimit-reset"].iter().find_map(|h| {
        headers
            .get(*h)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64)
    })
}

/// `{"json": {"errors": [["RATELIMIT", "...", "ratelimit"]]}}`
fn check_api_errors(v: &Value) -> Result<(), PlatformError> {
    let errors = v
        .pointer("/json/errors")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let Some(first) = errors.first() else {
        return Ok(());
    };
    let code = first.get(0).and_then(Value::as_str).unwrap_or_default();
    if code.eq_ignore_ascii_case("RATELIMIT") {
        let hinted = v
            .pointer("/json/ratelimit")
            .and_then(Value::as_f64)
            .filter(|s| s.is_finite() && *s >= 0.0)
            .map(Duration::from_secs_f64);
        let msg = first.get(1).and_then(Value::as_str).unwrap_or_default();
        return Err(PlatformError::RateLimited {
            retry_after: hinted.or_else(|| wait_from_message(msg)),
        });
    }
    Err(PlatformError::Api {
        status: 200,
        body: first.to_string(),
    })
}

/// "... try again in 9 minutes." -> 9 min. Takes the first `<n> <unit>` in the text.
fn wait_from_message(msg: &str) -> Option<Duration> {
    static RE_WAIT: OnceCell<Regex> = OnceCell::new();
    let re = RE_WAIT.get_or_init(|| {
        Regex::new(r"(?i)\b(\d+)\s*(millisecond|second|minute|hour)s?\b").unwrap()
    });
    let caps = re.captures(msg)?;
    let n: u64 = caps[1].parse().ok()?;
    let secs = match caps[2].to_ascii_lowercase().as_str() {
        "millisecond" => return Some(Duration::from_millis(n)),
        "second" => n,
        "minute" => n.saturating_mul(60),
        _ => n.saturating_mul(3600),
    };
    Some(Duration::from_secs(secs))
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    replies: Value,
}

impl RawComment {
    fn into_comment(self) -> Comment {
        let author = self.author.filter(|a| a != "[deleted]");
        Comment {
            id: self.id,
            author,
            body: self.body,
            created_utc: self.created_utc as i64,
        }
    }
}

fn listing_children(v: &Value) -> Option<&Vec<Value>> {
    v.pointer("/data/children").and_then(Value::as_array)
}

fn parse_listing_comments(v: &Value) -> Result<Vec<Comment>, PlatformError> {
    let children =
        listing_children(v).ok_or_else(|| PlatformError::Decode("not a listing".into()))?;
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        if child.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let raw: RawComment = serde_json::from_value(child["data"].clone())
            .map_err(|e| PlatformError::Decode(format!("comment: {e}")))?;
        out.push(raw.into_comment());
    }
    Ok(out)
}

fn parse_listing_ids(v: &Value, kind: &str) -> Result<Vec<String>, PlatformError> {
    let children =
        listing_children(v).ok_or_else(|| PlatformError::Decode("not a listing".into()))?;
    Ok(children
        .iter()
        .filter(|c| c.get("kind").and_then(Value::as_str) == Some(kind))
        .filter_map(|c| c.pointer("/data/id").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

/// Breadth-first flatten of a comment listing (replies nest as listings, or `""`).
fn flatten_comment_tree(listing: &Value) -> Vec<Comment> {
    let mut out = Vec::new();
    let mut queue: VecDeque<&Value> = listing_children(listing)
        .map(|c| c.iter().collect())
        .unwrap_or_default();

    while let Some(node) = queue.pop_front() {
        if node.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let data = &node["data"];
        if let Some(children) = listing_children(&data["replies"]) {
            queue.extend(children.iter());
        }
        if let Ok(raw) = serde_json::from_value::<RawComment>(data.clone()) {
            out.push(raw.into_comment());
        }
    }
    out
}

/// Insertion-ordered set that forgets its oldest ids past `cap`.
#[derive(Debug)]
struct SeenSet {
    order: VecDeque<String>,
    ids: HashSet<String>,
    cap: usize,
}

impl SeenSet {
    fn with_capacity(cap: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(cap),
            ids: HashSet::with_capacity(cap),
            cap,
        }
    }

    /// True if `id` was not present.
    fn insert(&mut self, id: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }
        self.ids.insert(id.to_string());
        self.order.push_back(id.to_string());
        while self.order.len() > self.cap {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
        true
    }
}
