//! Configuration module for the transaction orchestrator
//!
//! This module handles configuration loading from TOML files, environment
//! variable overrides, and provides structured configuration types. Every
//! section has defaults, so a partial file (or no file at all) is valid.

use crate::errors::{OrchestratorError, OrchestratorResult};
use crate::timeline::lines;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API and chain settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Poll cadences and budgets
    #[serde(default)]
    pub polling: PollingConfig,

    /// Timeline update delivery
    #[serde(default)]
    pub timeline: TimelineConfig,

    /// Batch behaviour
    #[serde(default)]
    pub batch: BatchConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the marketplace API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional API key sent with every request
    #[serde(default)]
    pub api_key: Option<String>,

    /// Chain the wallet must be connected to
    #[serde(default = "default_chain_id")]
    pub chain_id: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Fixed interval between proof job polls
    #[serde(default = "default_job_interval")]
    pub job_interval_ms: u64,

    /// Wall-clock budget for a proof job
    #[serde(default = "default_job_budget")]
    pub job_budget_secs: u64,

    /// Submission retry delay is `step × attempt`
    #[serde(default = "default_backoff_step")]
    pub submission_backoff_step_ms: u64,

    /// Hard wall-clock timeout for submission, measured from the first attempt
    #[serde(default = "default_submission_timeout")]
    pub submission_timeout_secs: u64,

    /// Every n-th failed submission attempt is logged at error level
    #[serde(default = "default_error_log_every")]
    pub submission_error_log_every: u32,

    /// First interval between inclusion polls
    #[serde(default = "default_inclusion_interval")]
    pub inclusion_initial_interval_ms: u64,

    /// Added to the inclusion interval after every reported error
    #[serde(default = "default_backoff_step")]
    pub inclusion_slowdown_step_ms: u64,

    /// Wall-clock budget for inclusion
    #[serde(default = "default_inclusion_budget")]
    pub inclusion_budget_secs: u64,

    /// Interval between contract-state checks
    #[serde(default = "default_verification_interval")]
    pub verification_interval_ms: u64,

    /// Attempt ceiling for contract-state checks
    #[serde(default = "default_verification_attempts")]
    pub verification_max_attempts: u32,

    /// Cadence of the batch settle loop
    #[serde(default = "default_settle_interval")]
    pub settle_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// One queued update is delivered per tick
    #[serde(default = "default_tick")]
    pub tick_ms: u64,

    /// Line ids delivered synchronously
    #[serde(default = "default_immediate_lines")]
    pub immediate_lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Poll the contract-state endpoint after confirmation
    #[serde(default)]
    pub verify_contract_state: bool,

    /// Emit the celebration event on success
    #[serde(default = "default_true")]
    pub celebrate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

// Default value functions
fn default_base_url() -> String { "https://api.minanft.io/v1".to_string() }
fn default_chain_id() -> String { "devnet".to_string() }
fn default_request_timeout() -> u64 { 60 }
fn default_job_interval() -> u64 { 10_000 }
fn default_job_budget() -> u64 { 3_600 }
fn default_backoff_step() -> u64 { 5_000 }
fn default_submission_timeout() -> u64 { 1_800 }
fn default_error_log_every() -> u32 { 5 }
fn default_inclusion_interval() -> u64 { 10_000 }
fn default_inclusion_budget() -> u64 { 3_600 }
fn default_verification_interval() -> u64 { 10_000 }
fn default_verification_attempts() -> u32 { 100 }
fn default_settle_interval() -> u64 { 5_000 }
fn default_tick() -> u64 { 1_000 }
fn default_immediate_lines() -> Vec<String> {
    lines::DEFAULT_IMMEDIATE.iter().map(|s| s.to_string()).collect()
}
fn default_metrics_port() -> u16 { 9090 }
fn default_true() -> bool { true }

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chain_id: default_chain_id(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            job_interval_ms: default_job_interval(),
            job_budget_secs: default_job_budget(),
            submission_backoff_step_ms: default_backoff_step(),
            submission_timeout_secs: default_submission_timeout(),
            submission_error_log_every: default_error_log_every(),
            inclusion_initial_interval_ms: default_inclusion_interval(),
            inclusion_slowdown_step_ms: default_backoff_step(),
            inclusion_budget_secs: default_inclusion_budget(),
            verification_interval_ms: default_verification_interval(),
            verification_max_attempts: default_verification_attempts(),
            settle_poll_interval_ms: default_settle_interval(),
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick(),
            immediate_lines: default_immediate_lines(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            verify_contract_state: false,
            celebrate: default_true(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl PollingConfig {
    pub fn job_interval(&self) -> Duration {
        Duration::from_millis(self.job_interval_ms)
    }

    pub fn job_budget(&self) -> Duration {
        Duration::from_secs(self.job_budget_secs)
    }

    pub fn submission_backoff_step(&self) -> Duration {
        Duration::from_millis(self.submission_backoff_step_ms)
    }

    pub fn submission_timeout(&self) -> Duration {
        Duration::from_secs(self.submission_timeout_secs)
    }

    pub fn inclusion_initial_interval(&self) -> Duration {
        Duration::from_millis(self.inclusion_initial_interval_ms)
    }

    pub fn inclusion_slowdown_step(&self) -> Duration {
        Duration::from_millis(self.inclusion_slowdown_step_ms)
    }

    pub fn inclusion_budget(&self) -> Duration {
        Duration::from_secs(self.inclusion_budget_secs)
    }

    pub fn verification_interval(&self) -> Duration {
        Duration::from_millis(self.verification_interval_ms)
    }

    pub fn settle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.settle_poll_interval_ms)
    }

    /// Scale every interval and budget by `factor` (simulation runs)
    ///
    /// Budgets keep a floor of one second.
    pub fn scaled(&self, factor: f64) -> Self {
        let ms = |value: u64| ((value as f64) * factor).round().max(1.0) as u64;
        let secs = |value: u64| ((value as f64) * factor).round().max(1.0) as u64;
        Self {
            job_interval_ms: ms(self.job_interval_ms),
            job_budget_secs: secs(self.job_budget_secs),
            submission_backoff_step_ms: ms(self.submission_backoff_step_ms),
            submission_timeout_secs: secs(self.submission_timeout_secs),
            submission_error_log_every: self.submission_error_log_every,
            inclusion_initial_interval_ms: ms(self.inclusion_initial_interval_ms),
            inclusion_slowdown_step_ms: ms(self.inclusion_slowdown_step_ms),
            inclusion_budget_secs: secs(self.inclusion_budget_secs),
            verification_interval_ms: ms(self.verification_interval_ms),
            verification_max_attempts: self.verification_max_attempts,
            settle_poll_interval_ms: ms(self.settle_poll_interval_ms),
        }
    }
}

impl TimelineConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override API settings from `NFT_ORCH_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("NFT_ORCH_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(key) = std::env::var("NFT_ORCH_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Ok(chain_id) = std::env::var("NFT_ORCH_CHAIN_ID") {
            self.api.chain_id = chain_id;
        }
    }

    /// Reject values that would make a loop spin or never start
    pub fn validate(&self) -> OrchestratorResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(OrchestratorError::Configuration("api.base_url is empty".to_string()));
        }
        if self.api.chain_id.trim().is_empty() {
            return Err(OrchestratorError::Configuration("api.chain_id is empty".to_string()));
        }
        let p = &self.polling;
        let intervals = [
            ("polling.job_interval_ms", p.job_interval_ms),
            ("polling.submission_backoff_step_ms", p.submission_backoff_step_ms),
            ("polling.inclusion_initial_interval_ms", p.inclusion_initial_interval_ms),
            ("polling.verification_interval_ms", p.verification_interval_ms),
            ("polling.settle_poll_interval_ms", p.settle_poll_interval_ms),
            ("polling.job_budget_secs", p.job_budget_secs),
            ("polling.submission_timeout_secs", p.submission_timeout_secs),
            ("polling.inclusion_budget_secs", p.inclusion_budget_secs),
            ("timeline.tick_ms", self.timeline.tick_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(OrchestratorError::Configuration(format!("{} must be greater than zero", name)));
        }
        if p.verification_max_attempts == 0 {
            return Err(OrchestratorError::Configuration(
                "polling.verification_max_attempts must be greater than zero".to_string(),
            ));
        }
        if p.submission_error_log_every == 0 {
            return Err(OrchestratorError::Configuration(
                "polling.submission_error_log_every must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
