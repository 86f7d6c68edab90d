use crate::embeds;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, GetMessages, MessageId, Timestamp};
use tracing::info;

const DEFAULT_AMOUNT: usize = 10;
/// Discord only bulk-deletes messages younger than two weeks.
const BULK_DELETE_MAX_AGE_SECS: i64 = 14 * 24 * 60 * 60;

/// `None` means every message in the channel.
pub fn parse_amount(input: Option<&str>) -> Result<Option<usize>, String> {
    match input.map(str::trim) {
        None => Ok(Some(DEFAULT_AMOUNT)),
        Some(all) if all.eq_ignore_ascii_case("all") => Ok(None),
        Some(number) => match number.parse::<usize>() {
            Ok(0) | Err(_) => Err(format!("`{}` is neither `all` nor a positive number", number)),
            Ok(n) => Ok(Some(n)),
        },
    }
}

async fn purge(
    ctx: Context<'_>,
    channel_id: ChannelId,
    limit: Option<usize>,
) -> Result<usize, Error> {
    let cutoff = Timestamp::now().unix_timestamp() - BULK_DELETE_MAX_AGE_SECS;
    let mut deleted = 0;

    loop {
        let batch = limit.map_or(100, |limit| (limit - deleted).min(100));
        if batch == 0 {
            break;
        }
        let messages = channel_id
            .messages(ctx, GetMessages::new().limit(batch as u8))
            .await?;
        if messages.is_empty() {
            break;
        }

        let (recent, old): (Vec<_>, Vec<_>) = messages
            .iter()
            .partition(|m| m.timestamp.unix_timestamp() > cutoff);
        let recent: Vec<MessageId> = recent.into_iter().map(|m| m.id).collect();

        match recent.len() {
            0 => {}
            1 => channel_id.delete_message(ctx, recent[0]).await?,
            _ => channel_id.delete_messages(ctx, &recent).await?,
        }
        for message in old {
            channel_id.delete_message(ctx, message.id).await?;
        }

        deleted += messages.len();
        if messages.len() < batch {
            break;
        }
    }
    Ok(deleted)
}

/// Delete messages (a number, or `all`)
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR",
    required_bot_permissions = "MANAGE_MESSAGES | READ_MESSAGE_HISTORY"
)]
pub async fn clear(
    ctx: Context<'_>,
    #[description = "How many messages (default 10), or `all`"] amount: Option<String>,
    #[description = "Channel to clear (default: this one)"] channel: Option<serenity::GuildChannel>,
) -> Result<(), Error> {
    let limit = match parse_amount(amount.as_deref()) {
        Ok(limit) => limit,
        Err(problem) => {
            ctx.say(problem).await?;
            return Ok(());
        }
    };
    ctx.defer().await?;

    let target = channel.map(|c| c.id).unwrap_or_else(|| ctx.channel_id());
    // The invoking message of a prefix command sits on top of the history
    let includes_invocation = matches!(ctx, poise::Context::Prefix(_)) && target == ctx.channel_id();
    let purge_limit = if includes_invocation { limit.map(|n| n + 1) } else { limit };

    let mut deleted = purge(ctx, target, purge_limit).await?;
    if includes_invocation {
        deleted = deleted.saturating_sub(1);
    }
    info!("{} cleared {} messages in {}", ctx.author().name, deleted, target);

    let description = match (limit, deleted) {
        (None, n) => format!("All messages in <#{}> were deleted (`{}` messages).", target, n),
        (_, 1) => "Cleared the message.".to_string(),
        (_, n) => format!("Cleared `{}` messages.", n),
    };
    let embed = embeds::reply(ctx, "Cleared!")
        .description(description)
        .thumbnail(ctx.author().face());

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(None), Ok(Some(10)));
        assert_eq!(parse_amount(Some("all")), Ok(None));
        assert_eq!(parse_amount(Some("ALL")), Ok(None));
        assert_eq!(parse_amount(Some("25")), Ok(Some(25)));
        assert!(parse_amount(Some("0")).is_err());
        assert!(parse_amount(Some("-3")).is_err());
        assert!(parse_amount(Some("lots")).is_err());
    }
}
