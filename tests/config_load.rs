// tests/config_load.rs
use scripted_reply_bot::config::{ConfigError, ENV_ACCEPT_RATIO, ENV_CONFIG_PATH};
use scripted_reply_bot::{BotConfig, SourceMode};
use std::{env, fs};

const TOML: &str = r#"
user_agent = "linux:dunder-bot:1.0 (by u/someone)"

[schedule]
sleep_interval_secs = 30

[[bots]]
name = "dwight-schrute-bot"
corpus = "data/dwight-replies.json"
"#;

#[test]
fn explicit_toml_and_json_paths() {
    let dir = tempfile::tempdir().unwrap();

    let p_toml = dir.path().join("bot.toml");
    fs::write(&p_toml, TOML).unwrap();
    let cfg = BotConfig::load_from(&p_toml).unwrap();
    assert_eq!(cfg.schedule.sleep_interval_secs, 30);
    assert_eq!(cfg.bots[0].name, "dwight-schrute-bot");
    assert_eq!(cfg.user_agent, "linux:dunder-bot:1.0 (by u/someone)");

    let p_json = dir.path().join("bot.json");
    fs::write(
        &p_json,
        r#"{"thresholds": {"reject_ratio": 40},
            "bots": [{"name": "jim-bot", "corpus": "jim.json", "source": {"kind": "rising"}}]}"#,
    )
    .unwrap();
    let cfg = BotConfig::load_from(&p_json).unwrap();
    assert_eq!(cfg.thresholds.reject_ratio, 40);
    assert_eq!(cfg.thresholds.accept_ratio, 60);
    assert_eq!(cfg.bots[0].source, SourceMode::Rising { limit: 10 });
}

#[test]
fn garbage_is_a_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("bot.toml");
    fs::write(&p, "this is = = not toml").unwrap();
    assert!(matches!(BotConfig::load_from(&p), Err(ConfigError::Format { .. })));

    // valid TOML, wrong value type
    fs::write(&p, "[thresholds]\naccept_ratio = \"60\"\n").unwrap();
    let err = BotConfig::load_from(&p).unwrap_err().to_string();
    assert!(err.contains("invalid type"), "{err}");
}

#[serial_test::serial]
#[test]
fn default_uses_env_then_fallbacks() {
    // keep the repo's own config/ out of the picture
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();
    env::remove_var(ENV_CONFIG_PATH);

    // 1) nothing anywhere
    assert!(matches!(BotConfig::load_default(), Err(ConfigError::NotFound)));

    // 2) ./config/bot.toml fallback
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(cfg_dir.join("bot.toml"), TOML).unwrap();
    let cfg = BotConfig::load_default().unwrap();
    assert_eq!(cfg.bots[0].name, "dwight-schrute-bot");

    // 3) env path wins, and env overrides apply on top
    let p_env = tmp.path().join("other.json");
    fs::write(&p_env, r#"{"bots": [{"name": "x-bot", "corpus": "x.json"}]}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
    env::set_var(ENV_ACCEPT_RATIO, "75");
    let cfg = BotConfig::load_default().unwrap();
    assert_eq!(cfg.bots[0].name, "x-bot");
    assert_eq!(cfg.thresholds.accept_ratio, 75);
    env::remove_var(ENV_ACCEPT_RATIO);

    // 4) env path that does not exist is an error, not a silent fallback
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
    assert!(matches!(
        BotConfig::load_default(),
        Err(ConfigError::MissingEnvPath(_))
    ));
    env::remove_var(ENV_CONFIG_PATH);

    env::set_current_dir(&old).unwrap();
}
