use super::dispatch::dispatch_reminders;
use super::Notifier;
use crate::db::Persistence;
use crate::reminders::Scheduler;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, warn};

/// Dispatches reminders and saves snapshots until the scheduler is stopped,
/// then writes one last snapshot once the dispatcher has drained.
pub async fn run_reminder_tasks<N, P>(
    scheduler: Arc<Scheduler>, notifier: N, persistence: &P, every: Duration,
) where
    N: Notifier + 'static,
    P: Persistence + ?Sized,
{
    let dispatcher = tokio::spawn(dispatch_reminders(scheduler.clone(), notifier));
    snapshot_reminders(scheduler.clone(), persistence, every).await;

    if let Err(e) = dispatcher.await {
        error!(error = %e, "reminder dispatcher stopped unexpectedly");
    }
    save_snapshot(&scheduler, persistence).await;
}

pub async fn save_snapshot<P: Persistence + ?Sized>(scheduler: &Scheduler, persistence: &P) {
    let reminders = scheduler.snapshot();
    match persistence.save_snapshot(&reminders).await {
        Ok(()) => debug!(count = reminders.len(), "saved reminder snapshot"),
        Err(e) => warn!(error = %e, "failed to save reminder snapshot"),
    }
}

/// Saves a snapshot every `every` until the scheduler is stopped.
pub async fn snapshot_reminders<P: Persistence + ?Sized>(
    scheduler: Arc<Scheduler>, persistence: &P, every: Duration,
) {
    let shutdown = scheduler.shutdown_token().clone();
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately and startup already loaded this state
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => save_snapshot(&scheduler, persistence).await,
        }
    }
}
