use crate::reminders::Owner;
use crate::Context;
use poise::serenity_prelude::{Message, MessageId};

/// Slash commands have no message to link back to.
pub fn message_id_from_ctx(ctx: Context<'_>) -> Option<MessageId> {
    match ctx {
        Context::Application(_actx) => None,
        Context::Prefix(pctx) => Some(pctx.msg.id),
    }
}

pub fn referenced_from_ctx(ctx: Context<'_>) -> Option<Message> {
    match ctx {
        Context::Application(_actx) => None,
        Context::Prefix(pctx) => pctx.msg.referenced_message.as_ref().map(|m| *m.clone()),
    }
}

pub fn owner_from_ctx(ctx: Context<'_>) -> Owner {
    Owner {
        user_id: ctx.author().id,
        channel_id: ctx.channel_id(),
        guild_id: ctx.guild_id(),
        message_id: message_id_from_ctx(ctx),
    }
}
