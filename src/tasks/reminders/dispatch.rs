use crate::reminders::{DeliveryError, Reminder, Scheduler};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest single sleep. The wall clock can jump while we wait.
const MAX_SLEEP: Duration = Duration::from_secs(15 * 60);

/// Hands a due reminder to its owner.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy)]
enum Wake {
    At(DateTime<Utc>),
    Forever,
}

#[derive(Debug, Clone, Copy)]
enum LoopState {
    Sleeping(Wake),
    Dispatching,
}

/// Fires reminders as they come due until the scheduler is stopped.
/// Everything already due at that point is still delivered before returning.
pub async fn dispatch_reminders<N: Notifier>(scheduler: Arc<Scheduler>, notifier: N) {
    let shutdown = scheduler.shutdown_token().clone();
    info!("reminder dispatch started");

    let mut state = LoopState::Dispatching;
    loop {
        state = match state {
            LoopState::Dispatching => {
                dispatch_due(&scheduler, &notifier).await;
                if shutdown.is_cancelled() {
                    break;
                }
                match scheduler.earliest_trigger() {
                    Some(at) => LoopState::Sleeping(Wake::At(at)),
                    None => LoopState::Sleeping(Wake::Forever),
                }
            }
            LoopState::Sleeping(wake) => {
                debug!(?wake, "dispatcher sleeping");
                let sleep = async {
                    match wake {
                        Wake::At(at) => {
                            let wait = (at - scheduler.now()).to_std().unwrap_or(Duration::ZERO);
                            tokio::time::sleep(wait.min(MAX_SLEEP)).await
                        }
                        Wake::Forever => std::future::pending().await,
                    }
                };
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => {
                        dispatch_due(&scheduler, &notifier).await;
                        break;
                    }
                    _ = scheduler.woken() => LoopState::Dispatching,
                    _ = sleep => LoopState::Dispatching,
                }
            }
        };
    }
    info!("reminder dispatch stopped");
}

async fn dispatch_due<N: Notifier>(scheduler: &Scheduler, notifier: &N) {
    while let Some(reminder) = scheduler.pop_due() {
        match notifier.deliver(&reminder).await {
            Ok(()) => info!(id = reminder.id, user = %reminder.owner.user_id, "reminder delivered"),
            Err(e) => warn!(id = reminder.id, user = %reminder.owner.user_id, error = %e, "reminder delivery failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::testing::{owner, t0};
    use crate::reminders::{Clock, ReminderId, SchedulerConfig, TokioClock};
    use chrono::FixedOffset;
    use poise::serenity_prelude::UserId;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Recorder {
        clock: Arc<dyn Clock>,
        delivered: Arc<Mutex<Vec<(ReminderId, DateTime<Utc>)>>>,
    }

    impl Recorder {
        fn new(clock: Arc<dyn Clock>) -> Self {
            Recorder { clock, delivered: Arc::default() }
        }

        fn delivered(&self) -> Vec<(ReminderId, DateTime<Utc>)> {
            self.delivered.lock().unwrap().clone()
        }

        fn ids(&self) -> Vec<ReminderId> {
            self.delivered().into_iter().map(|(id, _)| id).collect()
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn deliver(&self, reminder: &Reminder) -> Result<(), DeliveryError> {
            self.delivered.lock().unwrap().push((reminder.id, self.clock.now()));
            if reminder.payload == "boom" {
                return Err(DeliveryError::Unreachable(reminder.owner.user_id));
            }
            Ok(())
        }
    }

    fn setup() -> (Arc<Scheduler>, Recorder) {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(t0()));
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), clock.clone()).unwrap());
        (scheduler, Recorder::new(clock))
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_the_trigger_time() {
        let (scheduler, recorder) = setup();
        let r = scheduler.create_reminder(owner(1), "in 5 minutes", "tea".into(), utc()).unwrap();
        let handle = tokio::spawn(dispatch_reminders(scheduler.clone(), recorder.clone()));

        tokio::time::sleep(secs(299)).await;
        assert!(recorder.delivered().is_empty());

        tokio::time::sleep(secs(3600)).await;
        assert_eq!(recorder.delivered(), vec![(r.id, r.trigger_at)]);
        assert_eq!(scheduler.count_for(UserId::new(1)), 0);

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn one_second_reminder_then_empty() {
        let (scheduler, recorder) = setup();
        let handle = tokio::spawn(dispatch_reminders(scheduler.clone(), recorder.clone()));
        let r = scheduler.create_reminder(owner(1), "in 1 second", "now-ish".into(), utc()).unwrap();

        tokio::time::sleep(secs(1)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(recorder.delivered(), vec![(r.id, r.trigger_at)]);
        assert_eq!(scheduler.earliest_trigger(), None);
        assert!(scheduler.snapshot().is_empty());

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_insert_wakes_the_loop() {
        let (scheduler, recorder) = setup();
        let late = scheduler.create_reminder(owner(1), "in 1 hour", "late".into(), utc()).unwrap();
        let handle = tokio::spawn(dispatch_reminders(scheduler.clone(), recorder.clone()));
        tokio::time::sleep(secs(1)).await;

        let early = scheduler.create_reminder(owner(2), "in 1 minute", "early".into(), utc()).unwrap();
        tokio::time::sleep(secs(61)).await;
        assert_eq!(recorder.delivered(), vec![(early.id, early.trigger_at)]);

        tokio::time::sleep(secs(3600)).await;
        assert_eq!(recorder.ids(), vec![early.id, late.id]);

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_store_sleeps_until_something_arrives() {
        let (scheduler, recorder) = setup();
        let handle = tokio::spawn(dispatch_reminders(scheduler.clone(), recorder.clone()));
        tokio::time::sleep(secs(24 * 3600)).await;
        assert!(recorder.delivered().is_empty());

        let r = scheduler.create_reminder(owner(1), "in 10 seconds", "hi".into(), utc()).unwrap();
        tokio::time::sleep(secs(11)).await;
        assert_eq!(recorder.delivered(), vec![(r.id, r.trigger_at)]);

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_reminders_never_fire() {
        let (scheduler, recorder) = setup();
        let doomed = scheduler.create_reminder(owner(1), "in 1 minute", "doomed".into(), utc()).unwrap();
        let kept = scheduler.create_reminder(owner(1), "in 2 minutes", "kept".into(), utc()).unwrap();
        let handle = tokio::spawn(dispatch_reminders(scheduler.clone(), recorder.clone()));
        tokio::time::sleep(secs(30)).await;

        scheduler.cancel_reminder(UserId::new(1), doomed.id).unwrap();
        tokio::time::sleep(secs(600)).await;
        assert_eq!(recorder.ids(), vec![kept.id]);

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduled_reminder_fires_at_the_new_time() {
        let (scheduler, recorder) = setup();
        let r = scheduler.create_reminder(owner(1), "in 1 hour", "moved".into(), utc()).unwrap();
        let handle = tokio::spawn(dispatch_reminders(scheduler.clone(), recorder.clone()));
        tokio::time::sleep(secs(1)).await;

        let moved = scheduler.reschedule_reminder(UserId::new(1), r.id, "in 2 minutes", utc()).unwrap();
        tokio::time::sleep(secs(7200)).await;
        assert_eq!(recorder.delivered(), vec![(moved.id, moved.trigger_at)]);

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delivery_does_not_stop_the_loop() {
        let (scheduler, recorder) = setup();
        let bad = scheduler.create_reminder(owner(1), "in 1 minute", "boom".into(), utc()).unwrap();
        let good = scheduler.create_reminder(owner(1), "in 2 minutes", "fine".into(), utc()).unwrap();
        let handle = tokio::spawn(dispatch_reminders(scheduler.clone(), recorder.clone()));

        tokio::time::sleep(secs(600)).await;
        // attempted once each, the failure isn't retried
        assert_eq!(recorder.ids(), vec![bad.id, good.id]);
        assert!(scheduler.snapshot().is_empty());

        scheduler.stop();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_delivers_what_is_due_and_keeps_the_rest() {
        let (scheduler, recorder) = setup();
        let overdue = Reminder {
            id: 7,
            owner: owner(1),
            trigger_at: t0() - chrono::Duration::minutes(5),
            created_at: t0() - chrono::Duration::hours(1),
            payload: "missed while offline".into(),
            state: crate::reminders::ReminderState::Pending,
        };
        scheduler.restore(vec![overdue]);
        let later = scheduler.create_reminder(owner(1), "in 1 hour", "later".into(), utc()).unwrap();

        scheduler.stop();
        dispatch_reminders(scheduler.clone(), recorder.clone()).await;

        assert_eq!(recorder.ids(), vec![7]);
        assert_eq!(scheduler.snapshot(), vec![later]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_long_sleep() {
        let (scheduler, recorder) = setup();
        scheduler.create_reminder(owner(1), "in 3 days", "far".into(), utc()).unwrap();
        let handle = tokio::spawn(dispatch_reminders(scheduler.clone(), recorder.clone()));
        tokio::time::sleep(secs(5)).await;

        scheduler.stop();
        handle.await.unwrap();
        assert!(recorder.delivered().is_empty());
        assert_eq!(scheduler.snapshot().len(), 1);
    }
}
