use super::{PresenceEvent, PresenceSink};
use crate::apis::mojang::avatar_url;
use crate::embeds;
use async_trait::async_trait;
use poise::serenity_prelude::{
    ChannelId, Colour, CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, CreateMessage, Http,
};
use std::sync::Arc;
use tracing::error;

const HYPIXEL_ICON: &str =
    "https://pbs.twimg.com/profile_images/1346968969849171970/DdNypQdN_400x400.png";

/// Posts presence events into one Discord channel.
pub struct ChannelSink {
    http: Arc<Http>,
    channel_id: ChannelId,
    label: String,
}

impl ChannelSink {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, label: impl Into<String>) -> Self {
        Self {
            http,
            channel_id,
            label: label.into(),
        }
    }
}

fn presence_embed(uuid: &str, title: String, description: String, colour: Colour) -> CreateEmbed {
    CreateEmbed::new()
        .title(title)
        .description(description)
        .colour(colour)
        .footer(CreateEmbedFooter::new(embeds::footer_text()))
        .author(CreateEmbedAuthor::new(uuid).icon_url(HYPIXEL_ICON))
        .thumbnail(avatar_url(uuid))
}

pub fn render(event: &PresenceEvent) -> CreateMessage {
    match event {
        PresenceEvent::CameOnline { uuid, name } => CreateMessage::new().embed(presence_embed(
            uuid,
            format!("{} is online!", name),
            format!("**{}** is now **`online`** on the Hypixel network!", name),
            Colour::DARK_GREEN,
        )),
        PresenceEvent::WentOffline { uuid, name } => CreateMessage::new().embed(presence_embed(
            uuid,
            format!("{} is offline!", name),
            format!("**{}** is now **`offline`** and left the Hypixel network!", name),
            Colour::ORANGE,
        )),
        PresenceEvent::Removed { name, .. } => CreateMessage::new().content(format!(
            "The player {} never played on hypixel and was therefore removed from the checklist",
            name
        )),
        PresenceEvent::Halted { error } => CreateMessage::new().content(format!(
            "An API-Error occurred. The online check loop has been stopped.\n\
             You may want to disable this feature using the \"toggle_ignore_exceptions\" command.\n\n\
             **Error:** {}",
            error
        )),
    }
}

#[async_trait]
impl PresenceSink for ChannelSink {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn notify(&self, event: &PresenceEvent) {
        if let Err(e) = self.channel_id.send_message(&self.http, render(event)).await {
            error!("Failed to post presence update to {}: {}", self.channel_id, e);
        }
    }
}
