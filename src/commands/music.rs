use super::voice::author_voice_channel;
use crate::embeds;
use crate::music::{MusicError, PlayOutcome, PlayerState, QueuedTrack};
use crate::{Context, Error};
use std::sync::Arc;

const QUEUE_PREVIEW: usize = 10;

async fn songbird(ctx: Context<'_>) -> Result<Arc<songbird::Songbird>, Error> {
    songbird::get(ctx.serenity_context())
        .await
        .ok_or_else(|| "Songbird Voice client not initialized".into())
}

async fn enqueue(ctx: Context<'_>, query: String) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let Some(channel_id) = author_voice_channel(ctx) else {
        ctx.say("❌ You must be in a voice channel to use this command").await?;
        return Ok(());
    };
    ctx.defer().await?;

    let Some(found) = ctx.data().music.resolve(&query).await else {
        ctx.say(format!("❌ Could not find anything for `{}`", query)).await?;
        return Ok(());
    };

    let track = QueuedTrack {
        source_url: found.source_url,
        title: found.title.clone(),
        channel_id,
    };
    let manager = songbird(ctx).await?;

    let reply = match ctx.data().music.enqueue(&manager, guild_id, track).await {
        Ok(PlayOutcome::Started(track)) => format!("🎵 Now playing **{}**", track.title),
        Ok(PlayOutcome::Queued { position }) => {
            format!("➕ Added **{}** to the queue (position {})", found.title, position)
        }
        Ok(PlayOutcome::Resumed) => format!("▶️ Added **{}** and resumed playback", found.title),
        Err(MusicError::Join(e)) => format!(
            "❌ Could not join <#{}>: {}. The song stays queued.",
            channel_id, e
        ),
        Err(e) => return Err(e.into()),
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Play a song from YouTube (URL or search words)
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "YouTube URL or search query"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    enqueue(ctx, query).await
}

/// Add a song to the queue; starts playback when idle
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_bot_permissions = "CONNECT | SPEAK"
)]
pub async fn queue(
    ctx: Context<'_>,
    #[description = "YouTube URL or search query"]
    #[rest]
    query: String,
) -> Result<(), Error> {
    enqueue(ctx, query).await
}

/// Pause the current song
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn pause(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if ctx.data().music.pause(guild_id).await? {
        ctx.say("⏸️ Paused").await?;
    } else {
        ctx.say("❌ Nothing is playing").await?;
    }
    Ok(())
}

/// Resume a paused song
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn resume(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if ctx.data().music.resume(guild_id).await? {
        ctx.say("▶️ Resumed").await?;
    } else {
        ctx.say("❌ Nothing is paused").await?;
    }
    Ok(())
}

/// Skip the current song
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if ctx.data().music.skip(guild_id).await? {
        ctx.say("⏭️ Skipped current song").await?;
    } else {
        ctx.say("📭 Nothing to skip").await?;
    }
    Ok(())
}

/// Stop playback, clear the queue and leave
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let manager = songbird(ctx).await?;
    ctx.data().music.stop(&manager, guild_id).await;
    ctx.say("⏹️ Stopped and left the voice channel").await?;
    Ok(())
}

/// Remove all queued songs but keep the current one playing
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn clear_queue(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let removed = ctx.data().music.clear_queue(guild_id).await;
    ctx.say(format!("🧹 Removed {} song(s) from the queue", removed))
        .await?;
    Ok(())
}

/// Show the current song and what comes next
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn display_queue(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let snapshot = ctx.data().music.snapshot(guild_id, QUEUE_PREVIEW).await;

    let status = match snapshot.state {
        PlayerState::Idle => "Idle",
        PlayerState::Connecting => "Connecting",
        PlayerState::Playing => "Playing",
        PlayerState::Paused => "Paused",
    };
    let upcoming = snapshot.render_upcoming();

    let embed = embeds::reply(ctx, "🎶 Current Queue")
        .field(
            "Now Playing",
            snapshot.now_playing.as_deref().unwrap_or("-"),
            false,
        )
        .field(
            "Up Next",
            if upcoming.is_empty() { "📭 Queue is empty" } else { upcoming.as_str() },
            false,
        )
        .field("Status", status, true)
        .field("Volume", format!("{}%", snapshot.volume), true);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Set the playback volume (0-100)
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume in percent, 0 to 100"] volume: i64,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    match ctx.data().music.set_volume(guild_id, volume).await {
        Ok(volume) => ctx.say(format!("🔊 Volume set to {}%", volume)).await?,
        Err(MusicError::VolumeOutOfRange(_)) => {
            ctx.say("❌ The volume must be between 0 and 100").await?
        }
        Err(e) => return Err(e.into()),
    };
    Ok(())
}
