//! Reminder engine: time parsing, the heap-backed store and the scheduler
//! that the dispatch loop and the commands share.

mod clock;
mod error;
mod parser;
mod scheduler;
mod store;

pub use clock::{Clock, SystemClock};
pub use error::{DeliveryError, ParseError, ReminderError, StoreError};
pub use parser::{ParserConfig, TimeParser};
pub use scheduler::{Scheduler, SchedulerConfig};
pub use store::ReminderStore;

#[cfg(test)]
pub use clock::TokioClock;

use chrono::{DateTime, Utc};
use poise::serenity_prelude::{ChannelId, GuildId, MessageId, UserId};
use serde::{Deserialize, Serialize};

pub type ReminderId = u64;

/// Who asked for a reminder and where. The engine only ever looks at `user_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub message_id: Option<MessageId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderState {
    Pending,
    Fired,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub id: ReminderId,
    pub owner: Owner,
    pub trigger_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub payload: String,
    pub state: ReminderState,
}

/// A reminder that has not been given a slot in the store yet.
#[derive(Debug, Clone)]
pub struct NewReminder {
    /// Leave empty to let the store pick the next id.
    pub id: Option<ReminderId>,
    pub owner: Owner,
    pub trigger_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub payload: String,
}

impl From<Reminder> for NewReminder {
    fn from(r: Reminder) -> Self {
        NewReminder {
            id: Some(r.id),
            owner: r.owner,
            trigger_at: r.trigger_at,
            created_at: r.created_at,
            payload: r.payload,
        }
    }
}
