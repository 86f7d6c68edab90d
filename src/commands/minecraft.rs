use crate::apis::hypixel::{GuildMember, GuildRecord, PlayerRecord};
use crate::apis::mojang::{avatar_url, is_valid_player_name, skin_url, SkinPart};
use crate::embeds;
use crate::{Context, Error};
use tracing::warn;

const NOT_FOUND: &str = "This player does not exist or an API-Error occurred.";

/// Player UUID, or `None` after telling the user why there is none.
async fn lookup_uuid(ctx: Context<'_>, player: &str) -> Result<Option<String>, Error> {
    if !is_valid_player_name(player) {
        ctx.say(format!("`{}` is not a valid Minecraft player name.", player))
            .await?;
        return Ok(None);
    }
    match ctx.data().apis.mojang.uuid(player).await {
        Ok(Some(uuid)) => Ok(Some(uuid)),
        Ok(None) => {
            ctx.say(NOT_FOUND).await?;
            Ok(None)
        }
        Err(e) => {
            warn!("Mojang lookup for {} failed: {}", player, e);
            ctx.say(NOT_FOUND).await?;
            Ok(None)
        }
    }
}

async fn send_skin(ctx: Context<'_>, player: String, part: SkinPart) -> Result<(), Error> {
    ctx.defer().await?;
    if let Some(uuid) = lookup_uuid(ctx, &player).await? {
        ctx.say(skin_url(&uuid, part)).await?;
    }
    Ok(())
}

/// Render a Minecraft skin
#[poise::command(
    prefix_command,
    slash_command,
    subcommands("face", "head", "body"),
    subcommand_required,
    aliases("renderskin", "rnsn")
)]
pub async fn render_skin(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Render a player's face
#[poise::command(prefix_command, slash_command)]
pub async fn face(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] player: String,
) -> Result<(), Error> {
    send_skin(ctx, player, SkinPart::Face).await
}

/// Render a player's head
#[poise::command(prefix_command, slash_command)]
pub async fn head(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] player: String,
) -> Result<(), Error> {
    send_skin(ctx, player, SkinPart::Head).await
}

/// Render a player's full body
#[poise::command(prefix_command, slash_command)]
pub async fn body(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] player: String,
) -> Result<(), Error> {
    send_skin(ctx, player, SkinPart::Body).await
}

/// Look up Hypixel statistics
#[poise::command(
    prefix_command,
    slash_command,
    subcommands("general", "guild_member"),
    subcommand_required,
    aliases("hypx")
)]
pub async fn hypixel(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

fn online_label(player: &PlayerRecord) -> &'static str {
    match player.is_online() {
        Some(true) => "Yes",
        Some(false) => "No",
        None => "Hidden",
    }
}

/// Newest day first, one `day: exp` line each.
fn render_exp_history(member: &GuildMember) -> String {
    let lines: Vec<String> = member
        .exp_by_day()
        .map(|(day, exp)| format!("{}: {}", day, exp))
        .collect();
    embeds::field_list(&lines, "\n")
}

fn guild_summary(guild: Option<&GuildRecord>) -> String {
    match guild {
        Some(guild) => format!("Name: {}\nID: {}", guild.name, guild.id),
        None => "-".to_string(),
    }
}

/// Overall Hypixel stats of a player
#[poise::command(prefix_command, slash_command, aliases("overall"))]
pub async fn general(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] player: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let Some(uuid) = lookup_uuid(ctx, &player).await? else {
        return Ok(());
    };

    let hypixel = &ctx.data().apis.hypixel;
    let record = match hypixel.player(&uuid).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            ctx.say(format!("`{}` has never joined Hypixel.", player)).await?;
            return Ok(());
        }
        Err(e) => {
            warn!("Hypixel player lookup for {} failed: {}", player, e);
            ctx.say(NOT_FOUND).await?;
            return Ok(());
        }
    };
    let guild = match hypixel.guild_of(&uuid).await {
        Ok(guild) => guild,
        Err(e) => {
            warn!("Hypixel guild lookup for {} failed: {}", player, e);
            None
        }
    };

    let name = record.displayname.clone().unwrap_or(player);
    let embed = embeds::reply(ctx, "Overall Hypixel Stats")
        .description(format!("**{}**", name))
        .thumbnail(avatar_url(&uuid))
        .field("UUID", &uuid, false)
        .field("Rank", record.rank(), true)
        .field("Hypixel Level", format!("{:.2}", record.level()), true)
        .field("Karma", record.karma.to_string(), true)
        .field("Twitter", record.social_link("TWITTER").unwrap_or("-"), true)
        .field("Discord", record.social_link("DISCORD").unwrap_or("-"), true)
        .field("Online", online_label(&record), true)
        .field("Guild", guild_summary(guild.as_ref()), false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Hypixel guild stats of a player
#[poise::command(prefix_command, slash_command, aliases("gm"))]
pub async fn guild_member(
    ctx: Context<'_>,
    #[description = "Minecraft player name"] player: String,
) -> Result<(), Error> {
    ctx.defer().await?;
    let Some(uuid) = lookup_uuid(ctx, &player).await? else {
        return Ok(());
    };

    let guild = match ctx.data().apis.hypixel.guild_of(&uuid).await {
        Ok(Some(guild)) => guild,
        Ok(None) => {
            ctx.say(format!("`{}` is not in a Hypixel guild.", player)).await?;
            return Ok(());
        }
        Err(e) => {
            warn!("Hypixel guild lookup for {} failed: {}", player, e);
            ctx.say(NOT_FOUND).await?;
            return Ok(());
        }
    };
    let Some(member) = guild.member(&uuid) else {
        ctx.say(format!("`{}` is not in a Hypixel guild.", player)).await?;
        return Ok(());
    };

    let embed = embeds::reply(ctx, "Hypixel Guild Member Stats")
        .description(format!("**{}**", player))
        .thumbnail(avatar_url(&uuid))
        .field("Guild Name", &guild.name, true)
        .field("Guild ID", &guild.id, true)
        .field("Quests", member.quest_participation.to_string(), true)
        .field("Rank", member.rank.as_deref().unwrap_or("-"), true)
        .field("Overall Guild EXP (7 days)", member.weekly_exp().to_string(), true)
        .field("Guild EXP In Days", render_exp_history(member), false);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_member(history: &[(&str, u64)]) -> GuildMember {
        GuildMember {
            uuid: "abc".to_string(),
            rank: Some("Member".to_string()),
            quest_participation: 3,
            exp_history: history
                .iter()
                .map(|(day, exp)| (day.to_string(), *exp))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_exp_history_newest_first() {
        let member = sample_member(&[("2024-01-01", 10), ("2024-01-03", 30), ("2024-01-02", 20)]);
        assert_eq!(
            render_exp_history(&member),
            "2024-01-03: 30\n2024-01-02: 20\n2024-01-01: 10"
        );
        assert_eq!(render_exp_history(&sample_member(&[])), "-");
    }

    #[test]
    fn test_guild_summary() {
        let guild = GuildRecord {
            name: "Berbs".to_string(),
            id: "g1".to_string(),
            members: vec![],
        };
        assert_eq!(guild_summary(Some(&guild)), "Name: Berbs\nID: g1");
        assert_eq!(guild_summary(None), "-");
    }
}
