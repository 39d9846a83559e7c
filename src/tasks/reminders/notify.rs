use super::Notifier;
use crate::reminders::{DeliveryError, Reminder};
use crate::util::context_link;
use crate::BOT_COLOR;
use async_trait::async_trait;
use poise::serenity_prelude::{
    ChannelId, Context, CreateEmbed, CreateEmbedAuthor, CreateMessage, Error as SerenityError,
    Mentionable, UserId,
};
use tracing::{debug, warn};

/// Sends reminders as a DM, falling back to pinging the user in the channel
/// they asked from and then in the configured fallback channel.
pub struct DiscordNotifier {
    ctx: Context,
    fallback: Option<ChannelId>,
}

impl DiscordNotifier {
    pub fn new(ctx: Context, fallback: Option<ChannelId>) -> Self {
        DiscordNotifier { ctx, fallback }
    }

    fn embed(&self, reminder: &Reminder, greeting: &str) -> CreateEmbed {
        let mut description = format!(
            "{greeting} <t:{0}:R> on <t:{0}:F>, you asked me to remind you of {1}.",
            reminder.created_at.timestamp(),
            reminder.payload
        );
        if let Some(link) = context_link(&reminder.owner) {
            description.push_str(&format!("\n\n[View Message]({link})"));
        }
        CreateEmbed::new()
            .color(BOT_COLOR)
            .author(
                CreateEmbedAuthor::new("Reminder notification!")
                    .icon_url(self.ctx.cache.current_user().face()),
            )
            .description(description)
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, reminder: &Reminder) -> Result<(), DeliveryError> {
        let user_id = reminder.owner.user_id;
        let greeting = match user_id.to_user(&self.ctx).await {
            Ok(user) => format!("Hey {}!", user.name),
            Err(_) => "Hey!".to_string(),
        };
        let dm = CreateMessage::new().embed(self.embed(reminder, &greeting));
        match user_id.direct_message(&self.ctx, dm).await {
            Ok(_) => return Ok(()),
            Err(e) => debug!(id = reminder.id, error = %e, "could not DM reminder"),
        }

        let ping = || {
            CreateMessage::new()
                .embed(self.embed(reminder, "Hey!"))
                .content(user_id.mention().to_string())
        };
        let channels = std::iter::once(reminder.owner.channel_id).chain(self.fallback);
        let mut last_error = None;
        for channel in channels {
            match channel.send_message(&self.ctx, ping()).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    warn!(id = reminder.id, channel = %channel, error = %e, "could not post reminder");
                    last_error = Some(e);
                }
            }
        }
        Err(delivery_error(user_id, last_error))
    }
}

/// Discord answering every attempt with a refusal means nobody will see it.
fn delivery_error(user_id: UserId, last_error: Option<SerenityError>) -> DeliveryError {
    match last_error {
        Some(SerenityError::Http(_)) | None => DeliveryError::Unreachable(user_id),
        Some(e) => DeliveryError::Discord(e.to_string()),
    }
}
