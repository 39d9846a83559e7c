use super::ReminderId;
use chrono::{DateTime, Utc};
use poise::serenity_prelude::UserId;

/// Problems with the time a user typed. Always shown back to them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("I couldn't make sense of `{input}` as a time.{}", suggestion_hint(.suggestion))]
    Unparseable { input: String, suggestion: Option<String> },
    #[error("<t:{}:F> is already in the past.", unix(.at))]
    PastOrPresent { at: DateTime<Utc> },
    #[error("That's too far away, reminders can be at most {max_days} days out.")]
    TooFar { max_days: i64 },
    #[error("`{0}` is not a valid UTC offset, try something like +02:00.")]
    InvalidOffset(String),
}

fn unix(at: &DateTime<Utc>) -> i64 {
    at.timestamp()
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(word) => format!(" Did you mean `{word}`?"),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Reminder #{0} doesn't exist or has already gone off.")]
    NotFound(ReminderId),
    #[error("Reminder #{0} already exists.")]
    DuplicateId(ReminderId),
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("no way to reach user {0}")]
    Unreachable(UserId),
    #[error("discord request failed: {0}")]
    Discord(String),
}

/// Everything a reminder command can get back from the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReminderError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("You already have {limit} active reminders.")]
    LimitReached { limit: usize },
    #[error("You already have a reminder with that message at that time.")]
    AlreadyExists,
}
