use crate::commands::reminders::util::{autocomplete_reminder, reminder_embed};
use crate::util::send_ephemeral_text;
use crate::{Context, Error};
use poise::CreateReply;

/// Change what one of your reminders says
///
/// h!editreminder <reminder ID> <message>
#[poise::command(
    slash_command,
    prefix_command,
    rename = "editreminder",
    aliases("editrm", "modify")
)]
pub async fn edit(
    ctx: Context<'_>,
    #[description = "The reminder to change"]
    #[autocomplete = "autocomplete_reminder"]
    reminder_id: u64,
    #[description = "The new message"]
    #[rest]
    message: String,
) -> Result<(), Error> {
    let edited = match ctx.data().scheduler.edit_reminder(ctx.author().id, reminder_id, message) {
        Ok(edited) => edited,
        Err(e) => return send_ephemeral_text(ctx, &e.to_string()).await,
    };

    let title = format!("Reminder #{} updated.", edited.id);
    ctx.send(CreateReply::default().embed(reminder_embed(ctx, title, &edited)).ephemeral(true)).await?;
    Ok(())
}
