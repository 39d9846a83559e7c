use crate::db::set_utc_offset as save_utc_offset;
use crate::util::send_ephemeral_text;
use crate::{Context, Error, BOT_COLOR};
use chrono::{TimeZone, Utc};
use poise::serenity_prelude::{CreateEmbed, CreateEmbedAuthor};
use poise::CreateReply;

/// Set your UTC offset
///
/// Example: h!setoffset +02:00
#[poise::command(
    slash_command,
    prefix_command,
    rename = "setoffset",
    aliases("setutcoffset", "setutc", "utcoffset"),
    discard_spare_arguments
)]
pub async fn set_utc_offset(
    ctx: Context<'_>, #[description = "UTC offset"] offset: String,
) -> Result<(), Error> {
    let offset = match ctx.data().scheduler.parser().utc_offset(&offset) {
        Ok(offset) => offset,
        Err(e) => return send_ephemeral_text(ctx, &e.to_string()).await,
    };
    save_utc_offset(&ctx.data().pool, ctx.author().id, offset).await?;

    let noon = Utc::now().date_naive().and_hms_opt(12, 0, 0).ok_or("no noon today?")?;
    let local_noon = offset
        .from_local_datetime(&noon)
        .single()
        .ok_or("12:00 doesn't exist in that offset")?
        .timestamp();

    let embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::from(ctx.author().clone()))
        .color(BOT_COLOR)
        .title("UTC offset set!".to_string())
        .description(format!("12:00 in UTC{offset} is <t:{local_noon}:t> in your local time."));
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}
