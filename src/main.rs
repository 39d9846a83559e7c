mod commands;
mod config;
mod db;
mod reminders;
mod tasks;
mod util;

use crate::config::Config;
use crate::db::{Persistence, SqlitePersistence};
use crate::reminders::{Scheduler, SystemClock};
use crate::tasks::task_handler;
use dotenvy::dotenv;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::Color;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const BOT_COLOR: Color = Color::new(0xfcaaf9);

pub struct Data {
    scheduler: Arc<Scheduler>,
    pool: SqlitePool,
    config: Config,
    tasks: TaskTracker,
} // User data, which is stored and accessible in all command invocations
type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Arc<Data>, Error>;
pub type Command = poise::Command<Arc<Data>, Error>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let intents = serenity::GatewayIntents::non_privileged() | serenity::GatewayIntents::MESSAGE_CONTENT;

    let pool = db::connect(&config.database_url).await?;
    let scheduler = Arc::new(Scheduler::new(config.scheduler(), Arc::new(SystemClock))?);
    match SqlitePersistence::new(pool.clone()).load_snapshot().await {
        Ok(saved) => {
            let restored = scheduler.restore(saved);
            info!(restored, pending = scheduler.pending(), "restored reminders");
        }
        Err(e) => warn!(error = %e, "could not load saved reminders, starting empty"),
    }

    let token = config.discord_token.clone();
    let prefix = config.prefix.clone();
    let data = Arc::new(Data { scheduler: scheduler.clone(), pool, config, tasks: TaskTracker::new() });
    let tasks = data.tasks.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            commands: commands::commands(),
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                let ctx_clone = ctx.clone();
                let data_clone = data.clone();
                data.tasks.spawn(async move {
                    if let Err(e) = task_handler(ctx_clone, data_clone).await {
                        error!(error = %e, "background tasks failed");
                    }
                });
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(token, intents).framework(framework).await?;

    let shard_manager = client.shard_manager.clone();
    let stopping = scheduler.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            stopping.stop();
            shard_manager.shutdown_all().await;
        }
    });

    client.start().await?;

    // background tasks watch the scheduler, make sure they wind down
    scheduler.stop();
    tasks.close();
    tasks.wait().await;
    info!(pending = scheduler.pending(), "reminders left for next start");
    Ok(())
}
