use crate::embeds;
use crate::services::prefix::parse_prefix_input;
use crate::{Context, Error};
use poise::serenity_prelude as serenity;

/// Show or change the command prefixes of this server
#[poise::command(
    prefix_command,
    slash_command,
    subcommands("get", "set", "reset"),
    subcommand_required,
    guild_only
)]
pub async fn prefix(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Backtick-quoted prefix list plus the mention, which always works.
fn render_prefixes(prefixes: &[String], bot_id: serenity::UserId) -> String {
    let mut lines: Vec<String> = prefixes.iter().map(|p| format!("`{}`", p)).collect();
    lines.push(format!("<@{}>", bot_id));
    lines.join("\n")
}

async fn send_prefixes(
    ctx: Context<'_>,
    title: &str,
    description: &str,
    field: &str,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let prefixes = ctx.data().prefixes.prefixes_for(Some(guild_id.get())).await?;
    let (bot_id, bot_face) = {
        let me = ctx.cache().current_user();
        (me.id, me.face())
    };

    let embed = embeds::reply(ctx, title)
        .description(description)
        .field(field, render_prefixes(&prefixes, bot_id), false)
        .thumbnail(bot_face);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// List the valid prefixes for this server
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn get(ctx: Context<'_>) -> Result<(), Error> {
    send_prefixes(
        ctx,
        "Prefixes",
        "All valid Berb-Bot prefixes for this discord server",
        "Berb-Bot Prefixes:",
    )
    .await
}

/// Replace this server's prefixes (space separated)
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn set(
    ctx: Context<'_>,
    #[description = "New prefixes, separated by spaces"]
    #[rest]
    prefixes: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    let prefixes = parse_prefix_input(&prefixes);
    if prefixes.is_empty() {
        ctx.say("Please pass at least one prefix.").await?;
        return Ok(());
    }

    ctx.data()
        .prefixes
        .set_prefixes(guild_id.get(), prefixes)
        .await?;

    send_prefixes(
        ctx,
        "New Prefixes",
        "The Berb-Bot prefixes for this discord server have changed!",
        "New Berb-Bot Prefixes:",
    )
    .await
}

/// Remove custom prefixes and go back to the defaults
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "ADMINISTRATOR"
)]
pub async fn reset(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command must be used in a server")?;
    ctx.data().prefixes.reset_prefixes(guild_id.get()).await?;

    send_prefixes(
        ctx,
        "New Prefixes",
        "The Berb-Bot prefixes for this discord server have changed! They were reset!",
        "Default Berb-Bot Prefixes:",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prefixes() {
        let rendered = render_prefixes(&[".".to_string(), "b!".to_string()], serenity::UserId::new(5));
        assert_eq!(rendered, "`.`\n`b!`\n<@5>");
    }
}
