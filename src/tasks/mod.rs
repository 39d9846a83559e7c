use crate::db::SqlitePersistence;
use crate::{Data, Error};
use poise::serenity_prelude::Context;
use reminders::{run_reminder_tasks, DiscordNotifier};
use std::sync::Arc;

mod reminders;

pub async fn task_handler(ctx: Context, data: Arc<Data>) -> Result<(), Error> {
    let notifier = DiscordNotifier::new(ctx, data.config.fallback_channel);
    let persistence = SqlitePersistence::new(data.pool.clone());
    run_reminder_tasks(data.scheduler.clone(), notifier, &persistence, data.config.snapshot_interval)
        .await;
    Ok(())
}
