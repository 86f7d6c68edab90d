use crate::embeds;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::{EditMember, Member, Timestamp, UserId};
use std::time::Duration;
use tracing::info;

/// Discord refuses timeouts longer than 28 days.
const MAX_TIMEOUT: Duration = Duration::from_secs(28 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    SelfTarget,
    NotAbove,
}

impl Refusal {
    fn message(self, action: &str) -> String {
        match self {
            Refusal::SelfTarget => format!("You cannot {} yourself.", action),
            Refusal::NotAbove => {
                "You can only moderate members that are below you in the server hierarchy.".to_string()
            }
        }
    }
}

/// Who may moderate whom: never yourself, and only members whose highest
/// role sits strictly below yours. The guild owner outranks everyone.
pub fn check_hierarchy(
    actor: UserId,
    target: UserId,
    owner: UserId,
    actor_top: u16,
    target_top: u16,
) -> Result<(), Refusal> {
    if actor == target {
        return Err(Refusal::SelfTarget);
    }
    if actor == owner {
        return Ok(());
    }
    if target == owner || target_top >= actor_top {
        return Err(Refusal::NotAbove);
    }
    Ok(())
}

pub fn timeout_duration(days: u32, hours: u32, minutes: u32, seconds: u32) -> Result<Duration, String> {
    let total = u64::from(days) * 86_400
        + u64::from(hours) * 3_600
        + u64::from(minutes) * 60
        + u64::from(seconds);
    let duration = Duration::from_secs(total);
    if duration.is_zero() {
        return Err("The timeout has to be longer than zero seconds.".to_string());
    }
    if duration > MAX_TIMEOUT {
        return Err("A timeout can last at most 28 days.".to_string());
    }
    Ok(duration)
}

async fn ensure_can_moderate(
    ctx: Context<'_>,
    target: &Member,
    action: &str,
) -> Result<Option<String>, Error> {
    let actor = ctx
        .author_member()
        .await
        .ok_or("Could not load your server membership")?
        .into_owned();

    let verdict = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        let top = |member: &Member| {
            guild
                .member_highest_role(member)
                .map(|role| role.position)
                .unwrap_or(0)
        };
        check_hierarchy(actor.user.id, target.user.id, guild.owner_id, top(&actor), top(target))
    };
    Ok(verdict.err().map(|refusal| refusal.message(action)))
}

async fn send_result(ctx: Context<'_>, title: &str, description: String) -> Result<(), Error> {
    let embed = embeds::reply(ctx, title)
        .description(description)
        .thumbnail(ctx.author().face());
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Time out a member (default 15 minutes)
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    aliases("mute"),
    required_permissions = "MODERATE_MEMBERS"
)]
pub async fn timeout(
    ctx: Context<'_>,
    #[description = "Member to time out"] member: Member,
    #[description = "Days"] days: Option<u32>,
    #[description = "Hours"] hours: Option<u32>,
    #[description = "Minutes (default 15)"] minutes: Option<u32>,
    #[description = "Seconds"] seconds: Option<u32>,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if let Some(refusal) = ensure_can_moderate(ctx, &member, "timeout").await? {
        return send_result(ctx, "Failed", refusal).await;
    }

    let (days, hours, minutes, seconds) = (
        days.unwrap_or(0),
        hours.unwrap_or(0),
        minutes.unwrap_or(15),
        seconds.unwrap_or(0),
    );
    let duration = match timeout_duration(days, hours, minutes, seconds) {
        Ok(duration) => duration,
        Err(problem) => return send_result(ctx, "Failed", problem).await,
    };

    let until =
        Timestamp::from_unix_timestamp(Timestamp::now().unix_timestamp() + duration.as_secs() as i64)?;
    guild_id
        .edit_member(
            ctx,
            member.user.id,
            EditMember::new()
                .disable_communication_until_datetime(until)
                .audit_log_reason(&reason),
        )
        .await?;
    info!(
        "{} timed out {} for {}",
        ctx.author().name,
        member.user.name,
        humantime::format_duration(duration)
    );

    send_result(
        ctx,
        "Timed out",
        format!(
            "{} has successfully been timed out for {}!\nReason: \n```{}```",
            member.user.tag(),
            humantime::format_duration(duration),
            reason
        ),
    )
    .await
}

/// Kick a member from the server
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "KICK_MEMBERS"
)]
pub async fn kick(
    ctx: Context<'_>,
    #[description = "Member to kick"] member: Member,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if let Some(refusal) = ensure_can_moderate(ctx, &member, "kick").await? {
        return send_result(ctx, "Failed", refusal).await;
    }

    guild_id.kick_with_reason(ctx, member.user.id, &reason).await?;
    info!("{} kicked {}", ctx.author().name, member.user.name);

    send_result(
        ctx,
        "Kicked",
        format!(
            "{} has successfully been kicked from this discord server!\nReason: \n```{}```",
            member.user.tag(),
            reason
        ),
    )
    .await
}

/// Ban a member from the server
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "BAN_MEMBERS"
)]
pub async fn ban(
    ctx: Context<'_>,
    #[description = "Member to ban"] member: Member,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    if let Some(refusal) = ensure_can_moderate(ctx, &member, "ban").await? {
        return send_result(ctx, "Failed", refusal).await;
    }

    guild_id.ban_with_reason(ctx, member.user.id, 0, &reason).await?;
    info!("{} banned {}", ctx.author().name, member.user.name);

    send_result(
        ctx,
        "Banned",
        format!(
            "{} has successfully been banned from this discord server!\nReason: \n```{}```",
            member.user.tag(),
            reason
        ),
    )
    .await
}

/// Lift a ban
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "BAN_MEMBERS"
)]
pub async fn unban(
    ctx: Context<'_>,
    #[description = "Banned user"] user: serenity::User,
    #[description = "Reason"]
    #[rest]
    reason: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    guild_id.unban(ctx, user.id).await?;
    info!("{} unbanned {}: {}", ctx.author().name, user.name, reason);

    send_result(
        ctx,
        "Unbanned",
        format!(
            "{} has successfully been unbanned from this discord server!\nReason: \n```{}```",
            user.tag(),
            reason
        ),
    )
    .await
}
