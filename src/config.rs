//! Configuration loading and validation
//!
//! Layered: `config.toml` (optional) overlaid with `WINGO__`-prefixed
//! environment variables. Every tunable the worker and engines use lives
//! here rather than in compile-time constants.

use crate::error::{BotError, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Telegram user id allowed to issue mutating commands.
    pub admin_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            page_size: default_page_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between broadcast cycles.
    #[serde(default = "default_post_interval")]
    pub post_interval_secs: u64,
    /// Seconds to wait before retrying after a failed or empty fetch.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
    /// Trailing rounds fed to the majority vote.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Rows kept in the round and forecast stores.
    #[serde(default = "default_retention")]
    pub retention: i64,
    /// Rounds rendered in the status message.
    #[serde(default = "default_display_count")]
    pub display_count: i64,
    /// Ceiling of the Martingale ladder.
    #[serde(default = "default_multiplier_cap")]
    pub multiplier_cap: i64,
    /// Numbers at or above this are HIGH.
    #[serde(default = "default_high_threshold")]
    pub high_threshold: i64,
    #[serde(default = "default_header_title")]
    pub header_title: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            post_interval_secs: default_post_interval(),
            retry_backoff_secs: default_retry_backoff(),
            history_window: default_history_window(),
            retention: default_retention(),
            display_count: default_display_count(),
            multiplier_cap: default_multiplier_cap(),
            high_threshold: default_high_threshold(),
            header_title: default_header_title(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummaryConfig {
    /// Wall-clock hour of the daily summary boundary.
    #[serde(default)]
    pub hour: u32,
    #[serde(default)]
    pub minute: u32,
    /// Offset of the boundary's time zone from UTC, in minutes.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            hour: 0,
            minute: 0,
            utc_offset_minutes: 0,
        }
    }
}

fn default_api_url() -> String {
    "https://draw.ar-lottery01.com/WinGo/WinGo_1M/GetHistoryIssuePage.json".to_string()
}

fn default_page_size() -> u32 {
    20
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_db_path() -> String {
    "win_go.db".to_string()
}

fn default_post_interval() -> u64 {
    60
}

fn default_retry_backoff() -> u64 {
    10
}

fn default_history_window() -> usize {
    10
}

fn default_retention() -> i64 {
    15
}

fn default_display_count() -> i64 {
    15
}

fn default_multiplier_cap() -> i64 {
    81
}

fn default_high_threshold() -> i64 {
    5
}

fn default_header_title() -> String {
    "WinGo 1M".to_string()
}

impl Config {
    /// Load configuration from a TOML file plus environment overrides.
    /// Missing or invalid required values are fatal.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("WINGO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Config = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(BotError::InvalidConfig("telegram.bot_token is empty".into()));
        }
        if self.telegram.admin_id == 0 {
            return Err(BotError::InvalidConfig("telegram.admin_id is not set".into()));
        }
        if self.source.page_size == 0 {
            return Err(BotError::InvalidConfig("source.page_size must be > 0".into()));
        }
        if self.worker.history_window == 0 {
            return Err(BotError::InvalidConfig(
                "worker.history_window must be > 0".into(),
            ));
        }
        if self.worker.retention <= 0 {
            return Err(BotError::InvalidConfig("worker.retention must be > 0".into()));
        }
        if self.worker.display_count <= 0 {
            return Err(BotError::InvalidConfig(
                "worker.display_count must be > 0".into(),
            ));
        }
        if self.worker.multiplier_cap < 1 {
            return Err(BotError::InvalidConfig(
                "worker.multiplier_cap must be >= 1".into(),
            ));
        }
        if self.summary.hour > 23 {
            return Err(BotError::InvalidConfig("summary.hour must be 0-23".into()));
        }
        if self.summary.minute > 59 {
            return Err(BotError::InvalidConfig("summary.minute must be 0-59".into()));
        }
        if self.summary.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(BotError::InvalidConfig(
                "summary.utc_offset_minutes out of range".into(),
            ));
        }
        Ok(())
    }
}
