use crate::reminders::Owner;
use crate::{Context, Error, BOT_COLOR};
use poise::serenity_prelude::{
    ComponentInteractionCollector, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedAuthor,
    CreateEmbedFooter, CreateInteractionResponse, CreateInteractionResponseMessage, ReactionType,
};
use poise::CreateReply;

fn create_page_embed(ctx: Context<'_>, pages: &[Vec<String>], title: &str, page: usize) -> CreateEmbed {
    let total: usize = pages.iter().map(Vec::len).sum();
    let first = pages[..page].iter().map(Vec::len).sum::<usize>() + 1;
    CreateEmbed::default()
        .color(BOT_COLOR)
        .author(CreateEmbedAuthor::from(ctx.author().clone()))
        .title(title)
        .description(pages[page].join("\n"))
        .footer(CreateEmbedFooter::new(format!(
            "Page {}/{} - Showing entries {}-{} out of {}.",
            page + 1,
            pages.len(),
            first,
            first + pages[page].len() - 1,
            total
        )))
}

pub async fn paginate(
    ctx: Context<'_>, pages: &[Vec<String>], title: String, mut page: usize,
) -> Result<(), Error> {
    if pages.is_empty() {
        return Ok(());
    }
    // Define some unique identifiers for the navigation buttons
    let ctx_id = ctx.id();
    if page >= pages.len() {
        page = 0;
    }
    let prev_button_id = format!("{}prev", ctx_id);
    let next_button_id = format!("{}next", ctx_id);

    let mut reply = CreateReply::default().embed(create_page_embed(ctx, pages, &title, page));
    if pages.len() > 1 {
        let components = CreateActionRow::Buttons(vec![
            CreateButton::new(&prev_button_id).emoji(ReactionType::Unicode("◀".into())),
            CreateButton::new(&next_button_id).emoji(ReactionType::Unicode("▶".into())),
        ]);
        reply = reply.components(vec![components])
    }

    ctx.send(reply).await?;

    if pages.len() == 1 {
        return Ok(());
    }

    // Loop through incoming interactions with the navigation buttons
    while let Some(press) = ComponentInteractionCollector::new(ctx)
        .filter(move |press| press.data.custom_id.starts_with(&ctx_id.to_string()))
        // Timeout when no navigation button has been pressed for 2 minutes
        .timeout(std::time::Duration::from_secs(120))
        .await
    {
        if press.data.custom_id == next_button_id {
            page = (page + 1) % pages.len();
        } else {
            page = page.checked_sub(1).unwrap_or(pages.len() - 1);
        }

        press
            .create_response(
                ctx.serenity_context(),
                CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .embed(create_page_embed(ctx, pages, &title, page)),
                ),
            )
            .await?;
    }

    Ok(())
}

pub async fn send_ephemeral_text(ctx: Context<'_>, content: &str) -> Result<(), Error> {
    ctx.send(CreateReply::default().content(content).ephemeral(true)).await?;
    Ok(())
}

/// Jump link to the message a reminder was made from, if there was one.
pub fn context_link(owner: &Owner) -> Option<String> {
    owner.message_id.map(|message_id| message_id.link(owner.channel_id, owner.guild_id))
}
