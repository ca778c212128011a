// src/telemetry.rs
//! Logging and metrics setup.

use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "BOT_LOG_FORMAT";
pub const ENV_METRICS_ADDR: &str = "BOT_METRICS_ADDR";

const DEFAULT_FILTER: &str = "scripted_reply_bot=info,warn";

/// One-time metrics registration (so series show up before the first increment).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("bot_comments_seen_total", "Comments handed to the reply policy.");
        describe_counter!("bot_ignored_total", "Comments skipped (bot author or too short).");
        describe_counter!("bot_replies_posted_total", "Replies posted.");
        describe_counter!(
            "bot_rejected_logged_total",
            "Near-miss comments written to the rejected log."
        );
        describe_counter!(
            "bot_platform_retries_total",
            "Transient platform failures that were retried."
        );
        describe_gauge!("bot_last_cycle_ts", "Unix ts when a poll cycle last finished.");
    });
}

/// Compact logs by default; `BOT_LOG_FORMAT=json` for JSON lines.
/// Filter comes from `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialized: {e}");
    }
}

/// Install the Prometheus exporter when `BOT_METRICS_ADDR` is set (e.g. `0.0.0.0:9100`).
/// Must run inside the tokio runtime.
pub fn install_metrics_exporter() -> Result<Option<SocketAddr>> {
    let Ok(raw) = std::env::var(ENV_METRICS_ADDR) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .trim()
        .parse()
        .with_context(|| format!("{ENV_METRICS_ADDR}={raw} is not a socket address"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("installing prometheus exporter")?;
    ensure_metrics_described();
    Ok(Some(addr))
}
