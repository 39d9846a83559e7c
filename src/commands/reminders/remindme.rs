use crate::commands::reminders::util::{
    author_offset, check_author_reminder_count, create_error_text, reminder_embed,
};
use crate::commands::util::{owner_from_ctx, referenced_from_ctx};
use crate::util::send_ephemeral_text;
use crate::{Context, Error};
use poise::serenity_prelude::CreateEmbedFooter;
use poise::CreateReply;

/// Create a reminder
///
/// h!remindme "<when>" <message>
/// Examples: "in 10 minutes", "tomorrow at 5pm", "25-12-2026 09:00", "next friday"
#[poise::command(
    slash_command,
    prefix_command,
    aliases("rm", "rember", "reminder", "remind", "dothething"),
    check = "check_author_reminder_count"
)]
pub async fn remindme(
    ctx: Context<'_>, #[description = "When you want to be reminded"] when: String,
    #[description = "What you would like to be reminded of"]
    #[rest]
    mut message: Option<String>,
) -> Result<(), Error> {
    if let Some(reference) = referenced_from_ctx(ctx) {
        if message.is_none() && !reference.content.is_empty() {
            message = Some(reference.content);
        }
    }
    let message = message.unwrap_or("something".into());
    let offset = author_offset(ctx).await?;

    let reminder = match ctx.data().scheduler.create_reminder(owner_from_ctx(ctx), &when, message, offset) {
        Ok(reminder) => reminder,
        Err(e) => {
            let prefix = matches!(ctx, poise::Context::Prefix(_)).then(|| ctx.prefix());
            return send_ephemeral_text(ctx, &create_error_text(&e, prefix)).await;
        }
    };
    let embed = reminder_embed(ctx, format!("Reminder #{0} created.", reminder.id), &reminder).footer(
        CreateEmbedFooter::new(format!(
            "Tip: use \"{0}forget {1}\" if you change your mind!",
            ctx.prefix(),
            reminder.id
        )),
    );
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
