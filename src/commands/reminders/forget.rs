use crate::commands::reminders::util::autocomplete_reminder;
use crate::util::send_ephemeral_text;
use crate::{Context, Error, BOT_COLOR};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedAuthor};
use poise::CreateReply;

/// Cancel one of your reminders
///
/// h!forget <reminder ID>
#[poise::command(
    slash_command,
    prefix_command,
    aliases("reminderremove", "removerm", "forgor", "cancel"),
    discard_spare_arguments
)]
pub async fn forget(
    ctx: Context<'_>,
    #[description = "The reminder to cancel"]
    #[autocomplete = "autocomplete_reminder"]
    reminder_id: u64,
) -> Result<(), Error> {
    let cancelled = match ctx.data().scheduler.cancel_reminder(ctx.author().id, reminder_id) {
        Ok(cancelled) => cancelled,
        Err(e) => return send_ephemeral_text(ctx, &e.to_string()).await,
    };

    let embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::from(ctx.author().clone()))
        .description(format!(
            "Um, reminder #{0} about {1} has been removed. I-I hope that's okay!",
            cancelled.id, cancelled.payload
        ))
        .color(BOT_COLOR);
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
