use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::{ChannelId, ChannelType, EditMember, UserId};

/// Voice channel the invoking user is connected to, from the cache.
pub(crate) fn author_voice_channel(ctx: Context<'_>) -> Option<ChannelId> {
    voice_channel_of(ctx, ctx.author().id)
}

fn voice_channel_of(ctx: Context<'_>, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.guild()?;
    guild.voice_states.get(&user_id).and_then(|vs| vs.channel_id)
}

/// (muted, deafened) as enforced by the server, if the member is in voice.
fn server_voice_flags(ctx: Context<'_>, user_id: UserId) -> Option<(bool, bool)> {
    let guild = ctx.guild()?;
    guild
        .voice_states
        .get(&user_id)
        .filter(|vs| vs.channel_id.is_some())
        .map(|vs| (vs.mute, vs.deaf))
}

/// Manage the bot and members in voice channels
#[poise::command(
    prefix_command,
    slash_command,
    subcommands("join", "leave", "toggle_mute", "toggle_deafen", "move_member", "voice_kick"),
    subcommand_required,
    guild_only,
    aliases("voice_call", "voicecall")
)]
pub async fn vc(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Join your voice channel
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    aliases("connect"),
    required_bot_permissions = "CONNECT"
)]
pub async fn join(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let Some(channel_id) = author_voice_channel(ctx) else {
        ctx.say(format!("{}, you are not connected to a voice channel.", ctx.author()))
            .await?;
        return Ok(());
    };

    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?;

    if manager.get(guild_id).is_some() {
        ctx.say(format!("{}, I am already connected to a voice channel.", ctx.author()))
            .await?;
        return Ok(());
    }

    match manager.join(guild_id, channel_id).await {
        Ok(_) => ctx.say(format!("🔊 Joined <#{}>", channel_id)).await?,
        Err(e) => ctx.say(format!("❌ Failed to join voice channel: {}", e)).await?,
    };
    Ok(())
}

/// Leave the voice channel (you must be in it)
#[poise::command(prefix_command, slash_command, guild_only, aliases("disconnect"))]
pub async fn leave(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let manager = songbird::get(ctx.serenity_context())
        .await
        .ok_or("Songbird Voice client not initialized")?;

    let bot_channel = voice_channel_of(ctx, ctx.framework().bot_id);
    if manager.get(guild_id).is_none() || bot_channel.is_none() {
        ctx.say(format!("{}, I am not connected to a voice channel.", ctx.author()))
            .await?;
        return Ok(());
    }
    if author_voice_channel(ctx) != bot_channel {
        ctx.say(format!(
            "{}, you need to be in the same voice channel as me to make me leave.",
            ctx.author()
        ))
        .await?;
        return Ok(());
    }

    ctx.data().music.stop(&manager, guild_id).await;
    ctx.say("👋 Left voice channel").await?;
    Ok(())
}

/// Server-mute or unmute a member
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MUTE_MEMBERS"
)]
pub async fn toggle_mute(
    ctx: Context<'_>,
    #[description = "Member to (un)mute"] member: serenity::Member,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let Some((muted, _)) = server_voice_flags(ctx, member.user.id) else {
        ctx.say(format!("{} is not in a voice channel.", member.user.tag())).await?;
        return Ok(());
    };

    guild_id
        .edit_member(
            ctx,
            member.user.id,
            EditMember::new().mute(!muted).audit_log_reason(&reason),
        )
        .await?;

    let verb = if muted { "Unmuted" } else { "Muted" };
    ctx.say(format!("**{}** {} for reason: \n```{}```", verb, member.user.tag(), reason))
        .await?;
    Ok(())
}

/// Server-deafen or undeafen a member
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "DEAFEN_MEMBERS"
)]
pub async fn toggle_deafen(
    ctx: Context<'_>,
    #[description = "Member to (un)deafen"] member: serenity::Member,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let Some((_, deafened)) = server_voice_flags(ctx, member.user.id) else {
        ctx.say(format!("{} is not in a voice channel.", member.user.tag())).await?;
        return Ok(());
    };

    guild_id
        .edit_member(
            ctx,
            member.user.id,
            EditMember::new().deafen(!deafened).audit_log_reason(&reason),
        )
        .await?;

    let verb = if deafened { "Undeafened" } else { "Deafened" };
    ctx.say(format!("**{}** {} for reason: \n```{}```", verb, member.user.tag(), reason))
        .await?;
    Ok(())
}

/// Move a member to another voice channel
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    rename = "move",
    required_permissions = "MOVE_MEMBERS"
)]
pub async fn move_member(
    ctx: Context<'_>,
    #[description = "Member to move"] member: serenity::Member,
    #[description = "Target voice channel"] channel: serenity::GuildChannel,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if !matches!(channel.kind, ChannelType::Voice | ChannelType::Stage) {
        ctx.say(format!("{} is not a voice channel.", channel.name)).await?;
        return Ok(());
    }

    guild_id
        .edit_member(
            ctx,
            member.user.id,
            EditMember::new()
                .voice_channel(channel.id)
                .audit_log_reason(&reason),
        )
        .await?;

    ctx.say(format!(
        "**Moved** {} to {} for reason: \n```{}```",
        member.user.tag(),
        channel.name,
        reason
    ))
    .await?;
    Ok(())
}

/// Disconnect a member from voice
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    aliases("voicekick", "vkick"),
    required_permissions = "KICK_MEMBERS"
)]
pub async fn voice_kick(
    ctx: Context<'_>,
    #[description = "Member to disconnect"] member: serenity::Member,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    guild_id
        .edit_member(
            ctx,
            member.user.id,
            EditMember::new().disconnect_member().audit_log_reason(&reason),
        )
        .await?;

    ctx.say(format!(
        "**Voice-kicked** {} for reason: \n```{}```",
        member.user.tag(),
        reason
    ))
    .await?;
    Ok(())
}
