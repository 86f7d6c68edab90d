//! Gateway event listeners.

use crate::music::MusicManager;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use serenity::{ActivityData, ChannelId, CreateMessage, FullEvent, GuildId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub async fn handle(ctx: &serenity::Context, event: &FullEvent, data: &Data) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!(
                "Logged in as {} ({}) in {} guilds",
                data_about_bot.user.name,
                data_about_bot.user.id,
                data_about_bot.guilds.len()
            );
            let status = &data.config.status_message;
            let activity = match ActivityData::streaming(status, data.config.stream_url.as_str()) {
                Ok(activity) => activity,
                Err(e) => {
                    warn!("Invalid stream URL {}: {}", data.config.stream_url, e);
                    ActivityData::playing(status)
                }
            };
            ctx.set_activity(Some(activity));
        }
        FullEvent::Message { new_message } => {
            let Some(guild_id) = new_message.guild_id else {
                return Ok(());
            };
            if new_message.author.bot {
                return Ok(());
            }
            let (guild_key, user_key) = (guild_id.get(), new_message.author.id.get());
            if let Err(e) = data
                .db
                .run_blocking(move |db| db.increment_message_count(guild_key, user_key))
                .await
            {
                warn!("Failed to count message in guild {}: {}", guild_id, e);
            }
        }
        FullEvent::VoiceStateUpdate { new, .. } => {
            let Some(guild_id) = new.guild_id else {
                return Ok(());
            };
            let bot_id = ctx.cache.current_user().id;
            if new.user_id == bot_id {
                return Ok(());
            }
            if let Some(channel_id) = bot_left_alone(ctx, guild_id, bot_id) {
                spawn_alone_check(
                    ctx.clone(),
                    Arc::clone(&data.music),
                    guild_id,
                    channel_id,
                    new.user_id,
                    Duration::from_secs(data.config.voice_alone_timeout_secs),
                );
            }
        }
        _ => {}
    }
    Ok(())
}

/// Users other than the bot sitting in `channel`.
fn others_in_channel(
    states: impl IntoIterator<Item = (UserId, Option<ChannelId>)>,
    channel: ChannelId,
    bot_id: UserId,
) -> usize {
    states
        .into_iter()
        .filter(|(user, state_channel)| *user != bot_id && *state_channel == Some(channel))
        .count()
}

/// The bot's voice channel, if nobody else is in it.
fn bot_left_alone(ctx: &serenity::Context, guild_id: GuildId, bot_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    let channel = guild.voice_states.get(&bot_id)?.channel_id?;
    let states = guild.voice_states.values().map(|vs| (vs.user_id, vs.channel_id));
    (others_in_channel(states, channel, bot_id) == 0).then_some(channel)
}

fn spawn_alone_check(
    ctx: serenity::Context,
    music: Arc<MusicManager>,
    guild_id: GuildId,
    channel_id: ChannelId,
    notify: UserId,
    wait: Duration,
) {
    tokio::spawn(async move {
        debug!(
            "Alone in voice in guild {}, re-checking in {}",
            guild_id,
            humantime::format_duration(wait)
        );
        tokio::time::sleep(wait).await;

        let bot_id = ctx.cache.current_user().id;
        if bot_left_alone(&ctx, guild_id, bot_id) != Some(channel_id) {
            debug!("Alone timer aborted in guild {}", guild_id);
            return;
        }
        let Some(manager) = songbird::get(&ctx).await else {
            return;
        };

        info!("Alone timer expired in guild {}, leaving <#{}>", guild_id, channel_id);
        music.stop(&manager, guild_id).await;
        music.reset(guild_id).await;

        let notice = CreateMessage::new().content(format!(
            "I left <#{}> because everybody else did. The music queue has been cleared.",
            channel_id
        ));
        if let Err(e) = notify.direct_message(&ctx, notice).await {
            debug!("Could not DM {} about leaving voice: {}", notify, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_others_in_channel() {
        let bot = UserId::new(1);
        let channel = ChannelId::new(10);
        let other_channel = ChannelId::new(11);

        let alone = vec![(bot, Some(channel)), (UserId::new(2), Some(other_channel))];
        assert_eq!(others_in_channel(alone, channel, bot), 0);

        let company = vec![
            (bot, Some(channel)),
            (UserId::new(2), Some(channel)),
            (UserId::new(3), None),
        ];
        assert_eq!(others_in_channel(company, channel, bot), 1);
    }
}
