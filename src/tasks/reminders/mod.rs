mod dispatch;
mod notify;
mod snapshot;

pub use dispatch::Notifier;
pub use notify::DiscordNotifier;
pub use snapshot::run_reminder_tasks;
