use crate::reminders::{ParserConfig, SchedulerConfig};
use chrono::{Duration as ChronoDuration, NaiveTime};
use poise::serenity_prelude::ChannelId;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {key}: `{value}`")]
    Invalid { key: &'static str, value: String },
}

/// Settings read from the environment (and `.env`) at startup.
pub struct Config {
    pub discord_token: String,
    pub database_url: String,
    pub prefix: String,
    /// Where reminders go when neither a DM nor the original channel works.
    pub fallback_channel: Option<ChannelId>,
    pub max_reminders: usize,
    pub snapshot_interval: Duration,
    pub fuzzy_threshold: f64,
    pub default_reminder_time: NaiveTime,
    pub max_horizon_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &'static str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let fallback_channel = match var("FALLBACK_CHANNEL") {
            Some(v) => Some(ChannelId::new(parse_nonzero("FALLBACK_CHANNEL", &v)?)),
            None => None,
        };
        let fuzzy_threshold = parse_or("FUZZY_THRESHOLD", var("FUZZY_THRESHOLD"), 0.85)?;
        if !(0.0..=1.0).contains(&fuzzy_threshold) {
            return Err(invalid("FUZZY_THRESHOLD", fuzzy_threshold));
        }
        let default_reminder_time = match var("DEFAULT_REMINDER_TIME") {
            Some(v) => NaiveTime::parse_from_str(&v, "%H:%M").map_err(|_| invalid("DEFAULT_REMINDER_TIME", v))?,
            None => NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        };
        let max_horizon_days = parse_or("MAX_HORIZON_DAYS", var("MAX_HORIZON_DAYS"), 400i64)?;
        if !(1..=36_500).contains(&max_horizon_days) {
            return Err(invalid("MAX_HORIZON_DAYS", max_horizon_days));
        }

        Ok(Config {
            discord_token: var("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?,
            database_url: var("DATABASE_URL").unwrap_or_else(|| "sqlite://reminders.db".into()),
            prefix: var("BOT_PREFIX").unwrap_or_else(|| "h!".into()),
            fallback_channel,
            max_reminders: parse_or("MAX_REMINDERS", var("MAX_REMINDERS"), 25)?,
            snapshot_interval: Duration::from_secs(parse_nonzero_or(
                "SNAPSHOT_INTERVAL_SECS",
                var("SNAPSHOT_INTERVAL_SECS"),
                60,
            )?),
            fuzzy_threshold,
            default_reminder_time,
            max_horizon_days,
        })
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            parser: ParserConfig {
                similarity_threshold: self.fuzzy_threshold,
                default_time: self.default_reminder_time,
                max_horizon: ChronoDuration::days(self.max_horizon_days),
                ..Default::default()
            },
            max_per_user: self.max_reminders,
        }
    }
}

fn invalid(key: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid { key, value: value.to_string() }
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => v.parse().map_err(|_| invalid(key, v)),
        None => Ok(default),
    }
}

fn parse_nonzero(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse().ok().filter(|n| *n != 0).ok_or_else(|| invalid(key, value))
}

fn parse_nonzero_or(key: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        Some(v) => parse_nonzero(key, &v),
        None => Ok(default),
    }
}
