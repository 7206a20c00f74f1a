// tests/config.rs
use std::env;
use std::fs;
use std::time::Duration;

use ai_news_aggregator::ai::Operation;
use ai_news_aggregator::config::{build_providers, ChatFlavor};
use ai_news_aggregator::{ConfigError, Language, RunConfig};
use serial_test::serial;

const KEYS: &[&str] = &[
    "PROVIDERS_PATH",
    "PROVIDER_PRIORITY",
    "OPENAI_API_KEY",
    "CLAUDE_API_KEY",
    "GEMINI_API_KEY",
    "OLLAMA_URL",
    "STAGING_API_KEY",
    "BATCH_SIZE",
    "DISPLAY_LANGUAGE",
    "PROVIDER_TIMEOUT_SECS",
    "RETENTION_DAYS",
];

fn clear_env() {
    for k in KEYS {
        env::remove_var(k);
    }
}

#[test]
#[serial]
fn providers_file_resolves_env_keys() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("providers.toml");
    fs::write(
        &path,
        r#"
[[provider]]
name = "Staging"
flavor = "anthropic"
endpoint = "https://llm.internal.example/v1/messages"
model = "claude-3-5-haiku-latest"
api_key = "ENV"
requests_per_minute = 20

[[provider]]
name = "local"
flavor = "openai"
endpoint = "http://localhost:11434/v1/chat/completions"
model = "llama3.1"
capabilities = ["summarize", "translate"]
"#,
    )
    .unwrap();

    env::set_var("PROVIDERS_PATH", path.display().to_string());
    env::set_var("STAGING_API_KEY", "secret");
    env::set_var("BATCH_SIZE", "3");
    env::set_var("PROVIDER_TIMEOUT_SECS", "15");
    env::set_var("RETENTION_DAYS", "7");

    let cfg = RunConfig::from_env().unwrap();
    assert_eq!(cfg.batch_size, 3);
    assert_eq!(cfg.provider_timeout, Duration::from_secs(15));
    assert_eq!(cfg.retention_days, 7);
    assert_eq!(cfg.providers.len(), 2);
    assert_eq!(cfg.providers[0].name, "staging");
    assert_eq!(cfg.providers[0].flavor, ChatFlavor::Anthropic);
    assert_eq!(cfg.providers[0].api_key, "secret");
    assert_eq!(cfg.providers[0].requests_per_minute, 20);
    assert_eq!(
        cfg.providers[1].capabilities,
        vec![Operation::Summarize, Operation::Translate]
    );
    assert_eq!(build_providers(&cfg.providers).unwrap().len(), 2);

    // missing key for an ENV provider
    env::remove_var("STAGING_API_KEY");
    let err = RunConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::File { .. }));

    clear_env();
}

#[test]
#[serial]
fn well_known_keys_in_priority_order() {
    clear_env();
    env::set_var("CLAUDE_API_KEY", "c");
    env::set_var("OPENAI_API_KEY", "o");
    env::set_var("OLLAMA_URL", "http://localhost:11434/");
    env::set_var("DISPLAY_LANGUAGE", "english");

    let cfg = RunConfig::from_env().unwrap();
    let names: Vec<_> = cfg.providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["openai", "claude", "local"]);
    assert_eq!(
        cfg.providers[2].endpoint,
        "http://localhost:11434/v1/chat/completions"
    );
    assert_eq!(cfg.display_language, Language::En);

    env::set_var("PROVIDER_PRIORITY", "local, claude");
    let cfg = RunConfig::from_env().unwrap();
    let names: Vec<_> = cfg.providers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["local", "claude"]);

    clear_env();
}

#[test]
#[serial]
fn blank_keys_are_ignored() {
    clear_env();
    env::set_var("CLAUDE_API_KEY", "   ");
    let cfg = RunConfig::from_env().unwrap();
    assert!(cfg.providers.is_empty());
    assert!(build_providers(&cfg.providers).unwrap().is_empty());
    clear_env();
}
