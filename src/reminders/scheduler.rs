use super::{
    Clock, NewReminder, Owner, ParserConfig, Reminder, ReminderError, ReminderId, ReminderStore,
    StoreError, TimeParser,
};
use chrono::{DateTime, FixedOffset, Utc};
use poise::serenity_prelude::UserId;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub parser: ParserConfig,
    /// Active reminders one user may hold at once.
    pub max_per_user: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { parser: ParserConfig::default(), max_per_user: 25 }
    }
}

/// Owns every pending reminder for the lifetime of the process. Commands call
/// in from any task; the dispatch loop drains it through [`Scheduler::pop_due`]
/// and sleeps on [`Scheduler::woken`].
pub struct Scheduler {
    store: Mutex<ReminderStore>,
    parser: TimeParser,
    clock: Arc<dyn Clock>,
    wake: Notify,
    shutdown: CancellationToken,
    max_per_user: usize,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Result<Self, regex::Error> {
        Ok(Scheduler {
            store: Mutex::new(ReminderStore::new()),
            parser: TimeParser::new(config.parser)?,
            clock,
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            max_per_user: config.max_per_user,
        })
    }

    fn store(&self) -> MutexGuard<'_, ReminderStore> {
        // only a panic while holding the lock can poison it
        self.store.lock().expect("reminder store lock poisoned")
    }

    pub fn parser(&self) -> &TimeParser {
        &self.parser
    }

    pub fn max_per_user(&self) -> usize {
        self.max_per_user
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn parse(&self, text: &str, offset: FixedOffset) -> Result<DateTime<Utc>, ReminderError> {
        let reference = self.now().with_timezone(&offset);
        Ok(self.parser.parse(text, reference)?)
    }

    /// Looks up `id` for `user`. Someone else's reminder looks the same as a
    /// missing one.
    fn owned(store: &ReminderStore, user: UserId, id: ReminderId) -> Result<&Reminder, StoreError> {
        store.get(id).filter(|r| r.owner.user_id == user).ok_or(StoreError::NotFound(id))
    }

    fn has_duplicate(
        store: &ReminderStore, user: UserId, trigger_at: DateTime<Utc>, payload: &str,
    ) -> bool {
        store
            .iter()
            .any(|r| r.owner.user_id == user && r.trigger_at == trigger_at && r.payload == payload)
    }

    /// Inserts under the lock and reports whether the loop has to wake up.
    fn insert_locked(store: &mut ReminderStore, new: NewReminder) -> Result<(ReminderId, bool), StoreError> {
        let trigger_at = new.trigger_at;
        let earlier = store.earliest_trigger().map_or(true, |earliest| trigger_at < earliest);
        Ok((store.insert(new)?, earlier))
    }

    fn wake_if(&self, earlier: bool) {
        if earlier {
            self.wake.notify_one();
        }
    }

    pub fn create_reminder(
        &self, owner: Owner, text_time: &str, payload: String, offset: FixedOffset,
    ) -> Result<Reminder, ReminderError> {
        let trigger_at = self.parse(text_time, offset)?;
        let created_at = self.now();

        let (reminder, earlier) = {
            let mut store = self.store();
            if self.count_locked(&store, owner.user_id) >= self.max_per_user {
                return Err(ReminderError::LimitReached { limit: self.max_per_user });
            }
            if Self::has_duplicate(&store, owner.user_id, trigger_at, &payload) {
                return Err(ReminderError::AlreadyExists);
            }
            let new = NewReminder { id: None, owner, trigger_at, created_at, payload };
            let (id, earlier) = Self::insert_locked(&mut store, new)?;
            (Self::owned(&store, owner.user_id, id)?.clone(), earlier)
        };
        self.wake_if(earlier);

        info!(id = reminder.id, user = %owner.user_id, trigger_at = %reminder.trigger_at, "reminder created");
        Ok(reminder)
    }

    pub fn cancel_reminder(&self, user: UserId, id: ReminderId) -> Result<Reminder, ReminderError> {
        let mut store = self.store();
        Self::owned(&store, user, id)?;
        let cancelled = store.cancel(id)?;
        drop(store);

        info!(id, user = %user, "reminder cancelled");
        Ok(cancelled)
    }

    /// Moves a reminder to a new time. It comes back under a new id, which is
    /// returned with the rest of the reminder.
    pub fn reschedule_reminder(
        &self, user: UserId, id: ReminderId, text_time: &str, offset: FixedOffset,
    ) -> Result<Reminder, ReminderError> {
        let trigger_at = self.parse(text_time, offset)?;

        let (reminder, earlier) = {
            let mut store = self.store();
            let current = Self::owned(&store, user, id)?;
            if Self::has_duplicate(&store, user, trigger_at, &current.payload) {
                return Err(ReminderError::AlreadyExists);
            }
            let earlier = store.earliest_trigger().map_or(true, |earliest| trigger_at < earliest);
            let new_id = store.reschedule(id, trigger_at)?;
            (Self::owned(&store, user, new_id)?.clone(), earlier)
        };
        self.wake_if(earlier);

        info!(old_id = id, new_id = reminder.id, user = %user, trigger_at = %trigger_at, "reminder rescheduled");
        Ok(reminder)
    }

    pub fn edit_reminder(
        &self, user: UserId, id: ReminderId, payload: String,
    ) -> Result<Reminder, ReminderError> {
        let mut store = self.store();
        let current = Self::owned(&store, user, id)?;
        if current.payload != payload && Self::has_duplicate(&store, user, current.trigger_at, &payload) {
            return Err(ReminderError::AlreadyExists);
        }
        store.set_payload(id, payload)?;
        let edited = Self::owned(&store, user, id)?.clone();
        drop(store);

        debug!(id, user = %user, "reminder edited");
        Ok(edited)
    }

    /// The user's pending reminders, soonest first.
    pub fn list_reminders(&self, user: UserId) -> Vec<Reminder> {
        let mut reminders: Vec<Reminder> =
            self.store().iter().filter(|r| r.owner.user_id == user).cloned().collect();
        reminders.sort_by_key(|r| (r.trigger_at, r.id));
        reminders
    }

    /// Best matches of `query` against the user's reminder messages, for
    /// autocomplete. An empty query lists everything, soonest first.
    pub fn search_reminders(&self, user: UserId, query: &str, limit: usize) -> Vec<Reminder> {
        let mut reminders = self.list_reminders(user);
        let query = query.trim().to_lowercase();
        if !query.is_empty() {
            let score = |r: &Reminder| {
                let payload = r.payload.to_lowercase();
                if payload.contains(&query) {
                    1.0
                } else {
                    strsim::sorensen_dice(&query, &payload)
                }
            };
            // sort is stable, so ties keep the soonest-first order
            reminders.sort_by(|a, b| score(b).total_cmp(&score(a)));
        }
        reminders.truncate(limit);
        reminders
    }

    fn count_locked(&self, store: &ReminderStore, user: UserId) -> usize {
        store.iter().filter(|r| r.owner.user_id == user).count()
    }

    pub fn count_for(&self, user: UserId) -> usize {
        self.count_locked(&self.store(), user)
    }

    /// Pending reminders across every user.
    pub fn pending(&self) -> usize {
        self.store().len()
    }

    /// Every pending reminder, for persistence.
    pub fn snapshot(&self) -> Vec<Reminder> {
        let mut reminders: Vec<Reminder> = self.store().iter().cloned().collect();
        reminders.sort_by_key(|r| (r.trigger_at, r.id));
        reminders
    }

    /// Loads reminders saved by a previous run, keeping their ids. Anything
    /// that came due while the bot was offline fires on the next loop cycle.
    pub fn restore(&self, reminders: Vec<Reminder>) -> usize {
        let mut restored = 0;
        let mut earlier = false;
        {
            let mut store = self.store();
            for reminder in reminders {
                let id = reminder.id;
                match Self::insert_locked(&mut store, NewReminder::from(reminder)) {
                    Ok((_, e)) => {
                        restored += 1;
                        earlier |= e;
                    }
                    Err(e) => warn!(id, error = %e, "skipping restored reminder"),
                }
            }
        }
        self.wake_if(earlier);
        restored
    }

    pub fn earliest_trigger(&self) -> Option<DateTime<Utc>> {
        self.store().earliest_trigger()
    }

    /// Takes the next due reminder out of the store. The lock is released
    /// before this returns.
    pub fn pop_due(&self) -> Option<Reminder> {
        let now = self.now();
        self.store().pop_due(now)
    }

    /// Resolves after an insert produced a new earliest trigger. A wake-up
    /// that happens before this is awaited is kept, not lost.
    pub fn woken(&self) -> Notified<'_> {
        self.wake.notified()
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn stop(&self) {
        info!("stopping reminder scheduler");
        self.shutdown.cancel();
    }
}
