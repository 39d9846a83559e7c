use crate::reminders::{Owner, Reminder, ReminderState};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use poise::serenity_prelude::UserId;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{query, query_as, query_scalar, FromRow, SqlitePool};
use std::str::FromStr;
use tracing::{info, warn};

const SCHEMA: [&str; 2] = [
    r"CREATE TABLE IF NOT EXISTS reminders (
        id INTEGER PRIMARY KEY,
        owner TEXT NOT NULL,
        payload TEXT NOT NULL,
        trigger_at INTEGER NOT NULL,
        created_at INTEGER NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS users (
        discord_id INTEGER PRIMARY KEY,
        utc_offset INTEGER NOT NULL DEFAULT 0
    )",
];

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not encode reminder owner: {0}")]
    Owner(#[from] serde_json::Error),
}

/// Where reminder snapshots live between runs.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Replaces whatever was saved before.
    async fn save_snapshot(&self, reminders: &[Reminder]) -> Result<(), PersistenceError>;
    /// An empty result means there is nothing to restore.
    async fn load_snapshot(&self) -> Result<Vec<Reminder>, PersistenceError>;
}

pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().max_connections(5).connect_with(options).await?;
    create_schema(&pool).await?;
    info!(url, "connected to database");
    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        query(statement).execute(pool).await?;
    }
    Ok(())
}

#[derive(FromRow)]
struct ReminderRow {
    id: i64,
    owner: String,
    payload: String,
    trigger_at: i64,
    created_at: i64,
}

impl ReminderRow {
    fn into_reminder(self) -> Option<Reminder> {
        let owner: Owner = match serde_json::from_str(&self.owner) {
            Ok(owner) => owner,
            Err(e) => {
                warn!(id = self.id, error = %e, "unreadable reminder owner");
                return None;
            }
        };
        Some(Reminder {
            id: u64::try_from(self.id).ok()?,
            owner,
            trigger_at: DateTime::from_timestamp_millis(self.trigger_at)?,
            created_at: DateTime::from_timestamp_millis(self.created_at)?,
            payload: self.payload,
            state: ReminderState::Pending,
        })
    }
}

#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    pub fn new(pool: SqlitePool) -> Self {
        SqlitePersistence { pool }
    }
}

#[async_trait]
impl Persistence for SqlitePersistence {
    async fn save_snapshot(&self, reminders: &[Reminder]) -> Result<(), PersistenceError> {
        let mut tx = self.pool.begin().await?;
        query("DELETE FROM reminders").execute(&mut *tx).await?;
        for r in reminders {
            let id = r.id as i64;
            let owner = serde_json::to_string(&r.owner)?;
            query("INSERT INTO reminders (id, owner, payload, trigger_at, created_at) VALUES (?, ?, ?, ?, ?)")
                .bind(id)
                .bind(owner)
                .bind(r.payload.as_str())
                .bind(r.trigger_at.timestamp_millis())
                .bind(r.created_at.timestamp_millis())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Vec<Reminder>, PersistenceError> {
        let rows: Vec<ReminderRow> = query_as(
            "SELECT id, owner, payload, trigger_at, created_at FROM reminders ORDER BY trigger_at, id",
        )
        .fetch_all(&self.pool)
        .await?;
        let total = rows.len();
        let reminders: Vec<Reminder> = rows.into_iter().filter_map(ReminderRow::into_reminder).collect();
        if reminders.len() < total {
            warn!(skipped = total - reminders.len(), "skipped unreadable reminders");
        }
        Ok(reminders)
    }
}

/// The user's saved UTC offset, UTC if they never set one.
pub async fn get_utc_offset(pool: &SqlitePool, user: UserId) -> Result<FixedOffset, sqlx::Error> {
    let user_id = user.get() as i64;
    let minutes: Option<i64> = query_scalar("SELECT utc_offset FROM users WHERE discord_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    let offset = minutes
        .and_then(|m| i32::try_from(m * 60).ok())
        .and_then(FixedOffset::east_opt)
        .unwrap_or(Utc.fix());
    Ok(offset)
}

pub async fn set_utc_offset(
    pool: &SqlitePool, user: UserId, offset: FixedOffset,
) -> Result<(), sqlx::Error> {
    let user_id = user.get() as i64;
    let minutes = i64::from(offset.local_minus_utc() / 60);
    query(
        r"INSERT INTO users (discord_id, utc_offset) VALUES (?, ?)
        ON CONFLICT(discord_id) DO UPDATE SET utc_offset = excluded.utc_offset",
    )
    .bind(user_id)
    .bind(minutes)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::testing::{owner, t0};
    use chrono::Duration;
    use poise::serenity_prelude::{GuildId, MessageId};

    async fn memory_pool() -> SqlitePool {
        // every connection to :memory: is its own database, so keep exactly one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    fn reminder(id: u64, user: u64, minutes: i64, payload: &str) -> Reminder {
        Reminder {
            id,
            owner: owner(user),
            trigger_at: t0() + Duration::minutes(minutes),
            created_at: t0(),
            payload: payload.into(),
            state: ReminderState::Pending,
        }
    }

    #[tokio::test]
    async fn empty_database_loads_nothing() {
        let db = SqlitePersistence::new(memory_pool().await);
        assert!(db.load_snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_survives_a_round_trip() {
        let db = SqlitePersistence::new(memory_pool().await);
        let mut with_context = reminder(3, 2, 5, "standup");
        with_context.owner.guild_id = Some(GuildId::new(77));
        with_context.owner.message_id = Some(MessageId::new(88));
        let saved = vec![with_context, reminder(9, 1, 90, "laundry")];

        db.save_snapshot(&saved).await.unwrap();
        assert_eq!(db.load_snapshot().await.unwrap(), saved);
    }

    #[tokio::test]
    async fn saving_replaces_the_previous_snapshot() {
        let db = SqlitePersistence::new(memory_pool().await);
        db.save_snapshot(&[reminder(1, 1, 5, "old"), reminder(2, 1, 6, "gone")]).await.unwrap();
        db.save_snapshot(&[reminder(2, 1, 6, "kept")]).await.unwrap();

        let loaded = db.load_snapshot().await.unwrap();
        assert_eq!(loaded, vec![reminder(2, 1, 6, "kept")]);
    }

    #[tokio::test]
    async fn corrupt_rows_are_skipped() {
        let pool = memory_pool().await;
        let db = SqlitePersistence::new(pool.clone());
        db.save_snapshot(&[reminder(1, 1, 5, "fine")]).await.unwrap();
        query("INSERT INTO reminders (id, owner, payload, trigger_at, created_at) VALUES (2, 'nope', 'x', 0, 0)")
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(db.load_snapshot().await.unwrap(), vec![reminder(1, 1, 5, "fine")]);
    }

    #[tokio::test]
    async fn utc_offsets_default_to_utc_and_can_be_changed() {
        let pool = memory_pool().await;
        let user = UserId::new(42);
        assert_eq!(get_utc_offset(&pool, user).await.unwrap(), Utc.fix());

        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        set_utc_offset(&pool, user, ist).await.unwrap();
        assert_eq!(get_utc_offset(&pool, user).await.unwrap(), ist);

        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        set_utc_offset(&pool, user, est).await.unwrap();
        assert_eq!(get_utc_offset(&pool, user).await.unwrap(), est);
    }
}
