//! Configuration loading and validation tests
//!
//! Every section falls back to its defaults, so partial files must load and
//! validation must catch values that would make a polling loop spin.

use crate::config::{Config, PollingConfig, TimelineConfig};
use crate::errors::OrchestratorError;
use crate::timeline::lines;
use std::io::Write;
use std::time::Duration;

#[test]
fn test_default_config_is_valid() {
    let config = Config::default();
    assert!(config.validate().is_ok());

    assert_eq!(config.api.chain_id, "devnet");
    assert_eq!(config.polling.job_interval(), Duration::from_secs(10));
    assert_eq!(config.polling.job_budget(), Duration::from_secs(3_600));
    assert_eq!(config.polling.submission_backoff_step(), Duration::from_secs(5));
    assert_eq!(config.polling.inclusion_initial_interval(), Duration::from_secs(10));
    assert_eq!(config.polling.verification_max_attempts, 100);
    assert_eq!(config.timeline.tick(), Duration::from_secs(1));
    assert!(!config.batch.verify_contract_state);
    assert!(config.batch.celebrate);
}

#[test]
fn test_default_immediate_lines() {
    let timeline = TimelineConfig::default();
    for line in [lines::PRIVATE_KEYS_SAVED, lines::TX_SIGNED, lines::O1JS] {
        assert!(timeline.immediate_lines.iter().any(|l| l == line), "{}", line);
    }
    assert!(!timeline.immediate_lines.iter().any(|l| l == lines::TX_PROVED));
}

#[test]
fn test_partial_file_keeps_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[api]
base_url = "http://localhost:3000/api"
chain_id = "zeko"

[polling]
job_interval_ms = 2500

[batch]
verify_contract_state = true
"#
    )
    .unwrap();

    let config = Config::from_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.api.base_url, "http://localhost:3000/api");
    assert_eq!(config.api.chain_id, "zeko");
    assert_eq!(config.polling.job_interval_ms, 2_500);
    // Untouched fields keep their defaults
    assert_eq!(config.polling.submission_backoff_step_ms, 5_000);
    assert_eq!(config.timeline.tick_ms, 1_000);
    assert!(config.batch.verify_contract_state);
    assert!(config.batch.celebrate);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_file_is_an_error() {
    assert!(Config::from_file("/nonexistent/nft-orchestrator.toml").is_err());
}

#[test]
fn test_malformed_file_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[polling]\njob_interval_ms = \"fast\"").unwrap();
    assert!(Config::from_file(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_env_overrides_api_settings() {
    std::env::set_var("NFT_ORCH_API_URL", "https://staging.example.org/v1");
    std::env::set_var("NFT_ORCH_API_KEY", "secret-key");

    let mut config = Config::default();
    config.apply_env_overrides();

    std::env::remove_var("NFT_ORCH_API_URL");
    std::env::remove_var("NFT_ORCH_API_KEY");

    assert_eq!(config.api.base_url, "https://staging.example.org/v1");
    assert_eq!(config.api.api_key.as_deref(), Some("secret-key"));
}

#[test]
fn test_zero_intervals_are_rejected() {
    let mut config = Config::default();
    config.polling.job_interval_ms = 0;
    match config.validate() {
        Err(OrchestratorError::Configuration(message)) => {
            assert!(message.contains("polling.job_interval_ms"))
        }
        other => panic!("unexpected result: {:?}", other),
    }

    let mut config = Config::default();
    config.timeline.tick_ms = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.polling.verification_max_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.api.chain_id = "  ".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_scaled_polling() {
    let scaled = PollingConfig::default().scaled(0.01);

    assert_eq!(scaled.job_interval_ms, 100);
    assert_eq!(scaled.submission_backoff_step_ms, 50);
    assert_eq!(scaled.job_budget_secs, 36);
    // Budgets keep a floor of one second
    assert_eq!(PollingConfig::default().scaled(0.0001).submission_timeout_secs, 1);
    // Counts are not scaled
    assert_eq!(scaled.verification_max_attempts, 100);
    assert_eq!(scaled.submission_error_log_every, 5);
}
