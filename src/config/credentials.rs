// src/config/credentials.rs
//! Per-bot API credentials resolved from the environment.
//!
//! For prefix `DWIGHT_SCHRUTE_BOT` the variables are
//! `DWIGHT_SCHRUTE_BOT_CLIENT_ID`, `_CLIENT_SECRET`, `_USERNAME` (defaults to the bot name)
//! and `_PASSWORD`.

use super::{BotIdentity, ConfigError};

#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

// Never print secrets.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("secret_len", &self.client_secret.len())
            .finish_non_exhaustive()
    }
}

/// `dwight-schrute-bot` -> `DWIGHT_SCHRUTE_BOT`.
pub fn env_prefix(bot_name: &str) -> String {
    bot_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl Credentials {
    pub fn from_env(bot: &BotIdentity) -> Result<Self, ConfigError> {
        let prefix = bot
            .credentials_env
            .clone()
            .unwrap_or_else(|| env_prefix(&bot.name));
        let var = |suffix: &str| -> Result<String, ConfigError> {
            let name = format!("{prefix}_{suffix}");
            match std::env::var(&name) {
                Ok(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(ConfigError::MissingCredential(name)),
            }
        };

        let username = var("USERNAME").unwrap_or_else(|_| bot.name.clone());
        Ok(Self {
            client_id: var("CLIENT_ID")?,
            client_secret: var("CLIENT_SECRET")?,
            username,
            password: var("PASSWORD")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceMode;
    use std::env;
    use std::path::PathBuf;

    fn bot(name: &str) -> BotIdentity {
        BotIdentity {
            name: name.into(),
            corpus: PathBuf::from("c.json"),
            accepted_log: PathBuf::from("a.json"),
            rejected_log: PathBuf::from("r.json"),
            source: SourceMode::default(),
            credentials_env: None,
        }
    }

    #[test]
    fn prefix_from_name() {
        assert_eq!(env_prefix("dwight-schrute-bot"), "DWIGHT_SCHRUTE_BOT");
    }

    #[serial_test::serial]
    #[test]
    fn reads_env_and_reports_missing() {
        env::set_var("CRED_TEST_BOT_CLIENT_ID", "id");
        env::set_var("CRED_TEST_BOT_CLIENT_SECRET", "secret");
        env::remove_var("CRED_TEST_BOT_USERNAME");
        env::remove_var("CRED_TEST_BOT_PASSWORD");

        let b = bot("cred-test-bot");
        match Credentials::from_env(&b) {
            Err(ConfigError::MissingCredential(v)) => assert_eq!(v, "CRED_TEST_BOT_PASSWORD"),
            other => panic!("expected missing password, got {other:?}"),
        }

        env::set_var("CRED_TEST_BOT_PASSWORD", "pw");
        let c = Credentials::from_env(&b).unwrap();
        assert_eq!(c.username, "cred-test-bot");
        assert_eq!(c.client_secret, "secret");
        assert!(!format!("{c:?}").contains("secret\""));

        for s in ["CLIENT_ID", "CLIENT_SECRET", "PASSWORD"] {
            env::remove_var(format!("CRED_TEST_BOT_{s}"));
        }
    }
}
