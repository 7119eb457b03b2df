//! Crate-wide error type

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("draw feed error: {0}")]
    Source(String),

    #[error("telegram error: {0}")]
    Telegram(String),

    #[error("malformed stored value: {0}")]
    Malformed(String),

    #[error("forecast worker already running")]
    AlreadyRunning,

    #[error("forecast worker is not running")]
    NotRunning,
}
