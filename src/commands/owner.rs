use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::{CreateMessage, GuildId, Member};
use tracing::info;

/// Upper bound for the spam commands.
const MAX_SPAM: u32 = 10;

/// Splits an optional leading repeat count (default 1, capped) off a message.
fn split_count(input: &str) -> (u32, &str) {
    let input = input.trim();
    if let Some((first, rest)) = input.split_once(char::is_whitespace) {
        if let Ok(count) = first.parse::<u32>() {
            return (count.clamp(1, MAX_SPAM), rest.trim_start());
        }
    }
    (1, input)
}

/// Developer tools
#[poise::command(
    prefix_command,
    slash_command,
    owners_only,
    hide_in_help,
    subcommands("shutdown"),
    subcommand_required
)]
pub async fn dev(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Shut down the bot
#[poise::command(prefix_command, slash_command, owners_only, hide_in_help)]
pub async fn shutdown(ctx: Context<'_>) -> Result<(), Error> {
    info!("Shutdown command received from owner: {}", ctx.author().name);
    ctx.say("👋 Shutting down...").await?;
    ctx.data().hycheck.force_stop().await;
    ctx.framework().shard_manager().shutdown_all().await;
    Ok(())
}

/// Make the bot leave servers
#[poise::command(
    prefix_command,
    slash_command,
    owners_only,
    hide_in_help,
    subcommands("leave_current", "leave_by_id", "leave_by_name"),
    subcommand_required
)]
pub async fn guild(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Leave this server
#[poise::command(prefix_command, slash_command, owners_only, guild_only)]
pub async fn leave_current(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    ctx.say("Leaving this server. Bye!").await?;
    guild_id.leave(ctx).await?;
    info!("Left guild {} on request of {}", guild_id, ctx.author().name);
    Ok(())
}

/// Leave a server by its ID
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn leave_by_id(
    ctx: Context<'_>,
    #[description = "Server ID"] guild_id: u64,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.cache().guilds().into_iter().find(|id| id.get() == guild_id) else {
        ctx.say(format!("I am not a member of the server `{}`.", guild_id)).await?;
        return Ok(());
    };
    guild_id.leave(ctx).await?;
    info!("Left guild {} on request of {}", guild_id, ctx.author().name);
    ctx.say(format!("Left the server `{}`.", guild_id)).await?;
    Ok(())
}

/// Leave every server with the given name
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn leave_by_name(
    ctx: Context<'_>,
    #[description = "Server name"]
    #[rest]
    name: String,
) -> Result<(), Error> {
    let matching: Vec<GuildId> = ctx
        .cache()
        .guilds()
        .into_iter()
        .filter(|id| id.name(ctx.cache()).as_deref() == Some(name.as_str()))
        .collect();
    if matching.is_empty() {
        ctx.say(format!("I am not a member of a server called `{}`.", name)).await?;
        return Ok(());
    }

    for guild_id in &matching {
        guild_id.leave(ctx).await?;
        info!("Left guild {} ({}) on request of {}", guild_id, name, ctx.author().name);
    }
    ctx.say(format!("Left {} server(s) called `{}`.", matching.len(), name)).await?;
    Ok(())
}

/// Send a member the same direct message several times
#[poise::command(prefix_command, slash_command, owners_only, hide_in_help, guild_only)]
pub async fn spamuser(
    ctx: Context<'_>,
    #[description = "Member to message"] member: Member,
    #[description = "Optional count (max 10) followed by the message"]
    #[rest]
    input: String,
) -> Result<(), Error> {
    let (count, message) = split_count(&input);
    if message.is_empty() {
        ctx.say("Please pass a message.").await?;
        return Ok(());
    }
    ctx.defer().await?;

    for _ in 0..count {
        member
            .user
            .direct_message(ctx, CreateMessage::new().content(message))
            .await?;
    }
    info!("{} sent {} messages to {}", ctx.author().name, count, member.user.name);
    ctx.say(format!("Sent {} message(s) to {}.", count, member.user.tag()))
        .await?;
    Ok(())
}

/// Post the same message in this channel several times
#[poise::command(prefix_command, slash_command, owners_only, hide_in_help)]
pub async fn spamchannel(
    ctx: Context<'_>,
    #[description = "Optional count (max 10) followed by the message"]
    #[rest]
    input: String,
) -> Result<(), Error> {
    let (count, message) = split_count(&input);
    if message.is_empty() {
        ctx.say("Please pass a message.").await?;
        return Ok(());
    }

    for _ in 0..count {
        ctx.say(message).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_count() {
        assert_eq!(split_count("3 hello there"), (3, "hello there"));
        assert_eq!(split_count("hello there"), (1, "hello there"));
        assert_eq!(split_count("500 hi"), (MAX_SPAM, "hi"));
        assert_eq!(split_count("0 hi"), (1, "hi"));
        assert_eq!(split_count("7"), (1, "7"));
    }
}
