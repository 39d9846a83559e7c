use crate::db::get_utc_offset;
use crate::reminders::{ParseError, Reminder, ReminderError};
use crate::util::{context_link, send_ephemeral_text};
use crate::{Context, Error, BOT_COLOR};
use chrono::FixedOffset;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedAuthor};

/// Discord caps autocomplete at 25 choices of at most 100 characters.
const MAX_CHOICES: usize = 25;
const CHOICE_LEN: usize = 100;

pub async fn check_author_reminder_count(ctx: Context<'_>) -> Result<bool, Error> {
    let scheduler = &ctx.data().scheduler;
    if scheduler.count_for(ctx.author().id) >= scheduler.max_per_user() {
        send_ephemeral_text(ctx, "You have too many active reminders").await?;
        return Ok(false);
    }
    Ok(true)
}

pub async fn author_offset(ctx: Context<'_>) -> Result<FixedOffset, Error> {
    Ok(get_utc_offset(&ctx.data().pool, ctx.author().id).await?)
}

/// Prefix invocations split `when` on spaces, so an unreadable time there
/// usually just needed quotes.
pub fn create_error_text(error: &ReminderError, prefix: Option<&str>) -> String {
    let mut text = error.to_string();
    if let (ReminderError::Parse(ParseError::Unparseable { .. }), Some(prefix)) = (error, prefix) {
        text.push_str(&format!(
            "\nTimes with spaces need quotes, like `{prefix}remindme \"in 10 minutes\" stretch`."
        ));
    }
    text
}

pub async fn autocomplete_reminder(
    ctx: Context<'_>, partial: &str,
) -> impl Iterator<Item = serenity::AutocompleteChoice> {
    ctx.data()
        .scheduler
        .search_reminders(ctx.author().id, partial, MAX_CHOICES)
        .into_iter()
        .map(|r| {
            let name: String = format!("#{} · {}", r.id, r.payload).chars().take(CHOICE_LEN).collect();
            serenity::AutocompleteChoice::new(name, r.id)
        })
}

pub fn reminder_embed(ctx: Context<'_>, title: String, reminder: &Reminder) -> CreateEmbed {
    let ts = reminder.trigger_at.timestamp();
    let mut description =
        format!("I will remind you <t:{ts}:R> on <t:{ts}:F> about {}", reminder.payload);
    if let Some(link) = context_link(&reminder.owner) {
        description.push_str(&format!(" ([Context]({link}))"));
    }
    CreateEmbed::new()
        .author(CreateEmbedAuthor::from(ctx.author().clone()))
        .color(BOT_COLOR)
        .title(title)
        .description(description)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unparseable(input: &str) -> ReminderError {
        ParseError::Unparseable { input: input.into(), suggestion: None }.into()
    }

    #[test]
    fn prefix_callers_get_the_quoting_hint() {
        let text = create_error_text(&unparseable("in"), Some("h!"));
        assert!(text.starts_with("I couldn't make sense of `in` as a time."));
        assert!(text.ends_with("like `h!remindme \"in 10 minutes\" stretch`."));
    }

    #[test]
    fn slash_callers_and_other_errors_are_left_alone() {
        assert_eq!(create_error_text(&unparseable("in"), None), unparseable("in").to_string());
        let full = ReminderError::LimitReached { limit: 25 };
        assert_eq!(create_error_text(&full, Some("h!")), full.to_string());
    }
}
