use crate::embeds;
use crate::hycheck::{ChannelSink, StartOutcome};
use crate::{Context, Error};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Hypixel online checks for a list of players
#[poise::command(
    prefix_command,
    slash_command,
    owners_only,
    subcommands(
        "toggle_ignore_exceptions",
        "set_interval",
        "start_requests",
        "stop_requests",
        "force_stop_requests",
        "add_friend",
        "add_friends",
        "remove_friend",
        "remove_friends",
        "checklist"
    ),
    subcommand_required
)]
pub async fn hycheck(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Toggle whether API errors stop the online check
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn toggle_ignore_exceptions(ctx: Context<'_>) -> Result<(), Error> {
    let ignoring = ctx.data().hycheck.toggle_ignore_exceptions().await;
    if ignoring {
        ctx.say("From now on, exceptions will be ignored.").await?;
    } else {
        ctx.say("Exceptions will no longer be ignored.").await?;
    }
    Ok(())
}

/// `None` when the total does not fit in seconds.
fn interval_from(hours: Option<u64>, minutes: Option<u64>, seconds: Option<u64>) -> Option<Duration> {
    let total = hours
        .unwrap_or(0)
        .checked_mul(3_600)?
        .checked_add(minutes.unwrap_or(0).checked_mul(60)?)?
        .checked_add(seconds.unwrap_or(0))?;
    Some(Duration::from_secs(total))
}

/// Change how often players are checked
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn set_interval(
    ctx: Context<'_>,
    #[description = "Hours"] hours: Option<u64>,
    #[description = "Minutes"] minutes: Option<u64>,
    #[description = "Seconds"] seconds: Option<u64>,
) -> Result<(), Error> {
    let Some(interval) = interval_from(hours, minutes, seconds) else {
        ctx.say("That interval is too large.").await?;
        return Ok(());
    };
    if ctx.data().hycheck.set_interval(interval).await {
        ctx.say(format!(
            "The online check now runs every {}.",
            humantime::format_duration(interval)
        ))
        .await?;
    } else {
        ctx.say("The interval has to be longer than zero seconds.").await?;
    }
    Ok(())
}

/// Start checking and report changes in this channel
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn start_requests(ctx: Context<'_>) -> Result<(), Error> {
    let channel_id = ctx.channel_id();
    let sink = ChannelSink::new(
        ctx.serenity_context().http.clone(),
        channel_id,
        format!("<#{}>", channel_id),
    );

    let embed = match ctx.data().hycheck.start(Arc::new(sink)).await {
        StartOutcome::Started => {
            info!("{} started the online check in {}", ctx.author().name, channel_id);
            let interval = ctx.data().hycheck.interval().await;
            embeds::reply(ctx, "Started!").description(format!(
                "The online check is running every {} and reports here.",
                humantime::format_duration(interval)
            ))
        }
        StartOutcome::AlreadyRunning { target } => embeds::reply(ctx, "Failed!")
            .description(format!("The online check is already running and reports to {}.", target)),
    };
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Stop after the current check round
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn stop_requests(ctx: Context<'_>) -> Result<(), Error> {
    if ctx.data().hycheck.stop().await {
        ctx.say("The online check stops after the current round.").await?;
    } else {
        ctx.say("The online check is not running.").await?;
    }
    Ok(())
}

/// Stop immediately, even mid-round
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn force_stop_requests(ctx: Context<'_>) -> Result<(), Error> {
    if ctx.data().hycheck.force_stop().await {
        ctx.say("The online check has been stopped.").await?;
    } else {
        ctx.say("The online check is not running.").await?;
    }
    Ok(())
}

async fn add_one(ctx: Context<'_>, player: &str) -> Result<String, Error> {
    if ctx.data().hycheck.contains_player(player).await {
        return Ok(format!("`{}` is already in the online checklist.", player));
    }
    let uuid = match ctx.data().apis.mojang.uuid(player).await {
        Ok(Some(uuid)) => uuid,
        Ok(None) => {
            return Ok(format!(
                "The player \"{}\" does not exist or an API-Error occurred.",
                player
            ))
        }
        Err(e) => {
            warn!("Mojang lookup for {} failed: {}", player, e);
            return Ok(format!(
                "The player \"{}\" does not exist or an API-Error occurred.",
                player
            ));
        }
    };

    if ctx.data().hycheck.add_player(&uuid, player).await {
        Ok(format!(
            "`{}` has successfully been added to the online checklist!",
            player
        ))
    } else {
        Ok(format!("`{}` is already in the online checklist.", player))
    }
}

async fn remove_one(ctx: Context<'_>, player: &str) -> String {
    if ctx.data().hycheck.remove_player(player).await {
        format!("`{}` has been removed from the online checklist.", player)
    } else {
        format!("`{}` is not in the online checklist.", player)
    }
}

/// Track a player
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn add_friend(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] player: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let reply = add_one(ctx, &player).await?;
    ctx.say(reply).await?;
    Ok(())
}

/// Track several players (space separated)
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn add_friends(
    ctx: Context<'_>,
    #[description = "Minecraft player names, space separated"]
    #[rest]
    players: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let mut lines = Vec::new();
    for player in players.split_whitespace() {
        lines.push(add_one(ctx, player).await?);
    }
    if lines.is_empty() {
        ctx.say("Please name at least one player.").await?;
    } else {
        ctx.say(lines.join("\n")).await?;
    }
    Ok(())
}

/// Stop tracking a player
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn remove_friend(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] player: String,
) -> Result<(), Error> {
    let reply = remove_one(ctx, &player).await;
    ctx.say(reply).await?;
    Ok(())
}

/// Stop tracking several players (space separated)
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn remove_friends(
    ctx: Context<'_>,
    #[description = "Minecraft player names, space separated"]
    #[rest]
    players: String,
) -> Result<(), Error> {
    let mut lines = Vec::new();
    for player in players.split_whitespace() {
        lines.push(remove_one(ctx, player).await);
    }
    if lines.is_empty() {
        ctx.say("Please name at least one player.").await?;
    } else {
        ctx.say(lines.join("\n")).await?;
    }
    Ok(())
}

/// Show who is online and who is offline
#[poise::command(prefix_command, slash_command, owners_only)]
pub async fn checklist(ctx: Context<'_>) -> Result<(), Error> {
    let (online, offline) = ctx.data().hycheck.checklist().await;
    let running = ctx.data().hycheck.is_running().await;

    let embed = embeds::reply(ctx, "Checklist")
        .description(if running {
            "The online check is running."
        } else {
            "The online check is not running."
        })
        .field("Online", embeds::clip(&embeds::field_list(&online, ",\n")), true)
        .field("Offline", embeds::clip(&embeds::field_list(&offline, ",\n")), true);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from() {
        assert_eq!(
            interval_from(Some(1), Some(2), Some(3)),
            Some(Duration::from_secs(3_723))
        );
        assert_eq!(interval_from(None, None, Some(30)), Some(Duration::from_secs(30)));
        assert_eq!(interval_from(None, None, None), Some(Duration::ZERO));
        assert_eq!(interval_from(Some(u64::MAX), None, None), None);
        assert_eq!(interval_from(None, Some(u64::MAX / 2), None), None);
        assert_eq!(interval_from(None, Some(1), Some(u64::MAX)), None);
    }
}
