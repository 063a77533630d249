use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::feed::client::{AreaBounds, DEFAULT_BROADCAST_URL, DEFAULT_FEED_URL};
use crate::notify::telegram::DEFAULT_TELEGRAM_API_URL;
use crate::state::CategoryFilters;

/// Central configuration loaded from environment variables.
///
/// Secrets come from env vars (never hardcoded). The .env file is loaded
/// automatically at startup via dotenvy.
#[derive(Debug, Clone)]
pub struct Config {
    /// Georss alert feed (bounds get appended as query parameters)
    pub feed_url: String,
    /// Broadcast feed used for the users-online count
    pub broadcast_url: String,
    pub bounds: AreaBounds,
    pub db_path: String,

    pub fetch_every_minutes: u32,
    pub sample_every_minutes: u32,
    pub report_every_minutes: u32,
    pub persist_every_minutes: u32,
    /// How long a processed alert id is remembered. 0 = forever.
    pub dedup_retention_hours: u32,

    pub push_queue_capacity: usize,
    pub push_timeout_secs: u64,
    /// Categories forwarded to the push sink (WAZEWATCH_PUSH_CATEGORIES)
    pub push_categories: CategoryFilters,

    pub telegram_api_url: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,

    pub bind: String,
    pub port: u16,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables. Everything has a
    /// default except the Telegram credentials.
    pub fn load() -> Result<Self> {
        let bounds = match env::var("WAZEWATCH_BOUNDS") {
            Ok(raw) => AreaBounds::parse(&raw).context("WAZEWATCH_BOUNDS")?,
            Err(_) => AreaBounds::default(),
        };

        let push_categories = CategoryFilters::from_names(&var_or("WAZEWATCH_PUSH_CATEGORIES", "all"))
            .map_err(|e| anyhow::anyhow!("WAZEWATCH_PUSH_CATEGORIES: {e}"))?;

        Ok(Self {
            feed_url: var_or("WAZEWATCH_FEED_URL", DEFAULT_FEED_URL),
            broadcast_url: var_or("WAZEWATCH_BROADCAST_URL", DEFAULT_BROADCAST_URL),
            bounds,
            db_path: var_or("WAZEWATCH_DB_PATH", "./wazewatch.db"),
            fetch_every_minutes: parse_var("WAZEWATCH_FETCH_EVERY_MINUTES", 1)?,
            sample_every_minutes: parse_var("WAZEWATCH_SAMPLE_EVERY_MINUTES", 1)?,
            report_every_minutes: parse_var("WAZEWATCH_REPORT_EVERY_MINUTES", 60)?,
            persist_every_minutes: parse_var("WAZEWATCH_PERSIST_EVERY_MINUTES", 5)?,
            dedup_retention_hours: parse_var("WAZEWATCH_DEDUP_RETENTION_HOURS", 72)?,
            push_queue_capacity: parse_var("WAZEWATCH_PUSH_QUEUE", 64)?,
            push_timeout_secs: parse_var("WAZEWATCH_PUSH_TIMEOUT_SECS", 10)?,
            push_categories,
            telegram_api_url: var_or("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL),
            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").unwrap_or_default(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").unwrap_or_default(),
            bind: var_or("WAZEWATCH_BIND", "0.0.0.0"),
            port: parse_var("WAZEWATCH_PORT", 9091)?,
        })
    }

    /// True when both Telegram credentials are present.
    pub fn telegram_configured(&self) -> bool {
        !self.telegram_bot_token.is_empty() && !self.telegram_chat_id.is_empty()
    }

    /// Dedup retention window, or None to keep ids forever.
    pub fn dedup_retention(&self) -> Option<chrono::Duration> {
        (self.dedup_retention_hours > 0)
            .then(|| chrono::Duration::hours(i64::from(self.dedup_retention_hours)))
    }
}
