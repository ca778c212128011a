//! Scripted Reply Bot: binary entrypoint.
//! Loads config, authenticates every bot identity, then polls until killed.
//!
//! Only one instance may run against a given set of log files.

use anyhow::{Context, Result};
use tracing::{error, info};

use scripted_reply_bot::config::credentials::Credentials;
use scripted_reply_bot::platform::RedditClient;
use scripted_reply_bot::retry::Backoff;
use scripted_reply_bot::{poll, telemetry, BotConfig, BotRunner};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    telemetry::init_tracing();

    if let Some(addr) = telemetry::install_metrics_exporter()? {
        info!(%addr, "prometheus exporter listening");
    }

    let cfg = BotConfig::load_default().context("loading bot config")?;
    cfg.validate()?;
    let backoff = Backoff::from(cfg.retry);

    // Config, credentials and corpora are all checked before the first network call.
    let mut runners = Vec::with_capacity(cfg.bots.len());
    for bot in &cfg.bots {
        let creds = Credentials::from_env(bot)?;
        let client = RedditClient::new(creds, &cfg.user_agent)?;
        runners.push(BotRunner::from_config(bot, &cfg, Box::new(client))?);
    }
    for runner in &runners {
        runner.authenticate(&backoff).await?;
    }

    info!(
        bots = runners.len(),
        accept_ratio = cfg.thresholds.accept_ratio,
        reject_ratio = cfg.thresholds.reject_ratio,
        sleep_secs = cfg.schedule.sleep_interval_secs,
        "bot started"
    );

    let res = poll::run_forever(&mut runners, &cfg.schedule, &backoff).await;
    if let Err(e) = &res {
        error!(error = %format!("{e:#}"), "poll loop stopped");
    }
    res
}
