use crate::commands::reminders::util::{author_offset, autocomplete_reminder, reminder_embed};
use crate::util::send_ephemeral_text;
use crate::{Context, Error};
use poise::CreateReply;

/// Move one of your reminders to a different time
///
/// h!reschedule <reminder ID> <when>
#[poise::command(slash_command, prefix_command, aliases("snooze", "moverm"))]
pub async fn reschedule(
    ctx: Context<'_>,
    #[description = "The reminder to move"]
    #[autocomplete = "autocomplete_reminder"]
    reminder_id: u64,
    #[description = "When you want to be reminded instead"]
    #[rest]
    when: String,
) -> Result<(), Error> {
    let offset = author_offset(ctx).await?;
    let moved = match ctx.data().scheduler.reschedule_reminder(ctx.author().id, reminder_id, &when, offset) {
        Ok(moved) => moved,
        Err(e) => return send_ephemeral_text(ctx, &e.to_string()).await,
    };

    let title = format!("Reminder #{reminder_id} moved, it's #{} now.", moved.id);
    ctx.send(CreateReply::default().embed(reminder_embed(ctx, title, &moved))).await?;
    Ok(())
}
