use crate::util::{context_link, paginate};
use crate::{Context, Error};

const PAGE_ITEMS: usize = 8;

/// Shows your list of reminders
#[poise::command(
    slash_command,
    prefix_command,
    rename = "reminders",
    aliases("reminderlist", "rl"),
    discard_spare_arguments
)]
pub async fn reminder_list(
    ctx: Context<'_>, #[description = "The page to start on"] start_page: Option<usize>,
) -> Result<(), Error> {
    let reminders = ctx.data().scheduler.list_reminders(ctx.author().id);
    if reminders.is_empty() {
        return Err("You have no active reminders.".into());
    }
    let lines: Vec<String> = reminders
        .iter()
        .map(|r| {
            let mut line = format!("ID: {0} · <t:{1}:f> · `{2}`", r.id, r.trigger_at.timestamp(), r.payload);
            if let Some(link) = context_link(&r.owner) {
                line.push_str(&format!(" ([Context]({link}))"));
            }
            line
        })
        .collect();
    let reminder_pages: Vec<Vec<String>> = lines.chunks(PAGE_ITEMS).map(<[String]>::to_vec).collect();

    paginate(
        ctx,
        &reminder_pages,
        format!("Active reminders for {}", ctx.author().name),
        start_page.map(|p| p.saturating_sub(1)).unwrap_or_default(),
    )
    .await
}
