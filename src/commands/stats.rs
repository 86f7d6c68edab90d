use crate::embeds;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;
use serenity::{Member, Mentionable, Timestamp};

/// Discord timestamp markup, rendered in each reader's own timezone.
fn discord_time(timestamp: Timestamp) -> String {
    format!("<t:{}:F>", timestamp.unix_timestamp())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Show information about a member
#[poise::command(prefix_command, slash_command, guild_only, aliases("userstats"))]
pub async fn user_stats(
    ctx: Context<'_>,
    #[description = "Member to inspect (default: you)"] member: Option<Member>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let member = match member {
        Some(member) => member,
        None => ctx
            .author_member()
            .await
            .ok_or("Could not load your server membership")?
            .into_owned(),
    };

    let (top_role, activity, status) = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        let top_role = guild
            .member_highest_role(&member)
            .map(|role| role.id.mention().to_string())
            .unwrap_or_else(|| "-".to_string());
        let presence = guild.presences.get(&member.user.id);
        let activity = presence
            .and_then(|p| p.activities.first())
            .map(|a| a.name.clone())
            .unwrap_or_else(|| "-".to_string());
        let status = presence
            .map(|p| p.status.name().to_string())
            .unwrap_or_else(|| "offline".to_string());
        (top_role, activity, status)
    };

    let (guild_key, user_key) = (guild_id.get(), member.user.id.get());
    let messages = ctx
        .data()
        .db
        .run_blocking(move |db| db.get_message_count(guild_key, user_key))
        .await?;

    let joined = member
        .joined_at
        .map(discord_time)
        .unwrap_or_else(|| "-".to_string());

    let embed = embeds::reply(ctx, format!("Stats of {}", member.display_name()))
        .thumbnail(member.face())
        .field("Name", member.user.tag(), true)
        .field("ID", member.user.id.to_string(), true)
        .field("Bot", yes_no(member.user.bot), true)
        .field("Joined", joined, true)
        .field("Created", discord_time(member.user.created_at()), true)
        .field("Status", status, true)
        .field("Activity", activity, true)
        .field("Top Role", top_role, true)
        .field("Roles", member.roles.len().to_string(), true)
        .field(
            "Berb-Bot",
            format!("Messages sent on this server: {}", messages),
            false,
        );

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show information about this server
#[poise::command(prefix_command, slash_command, guild_only, aliases("serverstats"))]
pub async fn server_stats(ctx: Context<'_>) -> Result<(), Error> {
    let embed = {
        let guild = ctx.guild().ok_or("Could not access guild")?;
        let mut embed = embeds::reply(ctx, format!("Stats of {}", guild.name))
            .field("ID", guild.id.to_string(), true)
            .field("Owner", guild.owner_id.mention().to_string(), true)
            .field("Created", discord_time(guild.id.created_at()), true)
            .field("Members", guild.member_count.to_string(), true)
            .field("Channels", guild.channels.len().to_string(), true)
            .field("Roles", guild.roles.len().to_string(), true);
        if let Some(icon) = guild.icon_url() {
            embed = embed.thumbnail(icon);
        }
        embed
    };

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discord_time_markup() {
        let ts = Timestamp::from_unix_timestamp(1_600_000_000).unwrap();
        assert_eq!(discord_time(ts), "<t:1600000000:F>");
    }

    #[test]
    fn test_yes_no() {
        assert_eq!(yes_no(true), "Yes");
        assert_eq!(yes_no(false), "No");
    }
}
