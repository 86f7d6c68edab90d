use crate::config::DISCORD_FIELD_LIMIT;
use crate::Context;
use chrono::Local;
use poise::serenity_prelude::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter, User};

pub fn footer_text() -> String {
    format!("BerbBot - {}", Local::now().format("%H:%M"))
}

/// Embed with the bot footer and the given colour.
pub fn base(color: u32) -> CreateEmbed {
    CreateEmbed::new()
        .color(color)
        .footer(CreateEmbedFooter::new(footer_text()))
}

pub fn requested_by(embed: CreateEmbed, user: &User) -> CreateEmbed {
    embed.author(CreateEmbedAuthor::new(format!("Requested by: {}", user.tag())).icon_url(user.face()))
}

/// Titled reply embed in the configured colour, attributed to the invoking user.
pub fn reply(ctx: Context<'_>, title: impl Into<String>) -> CreateEmbed {
    requested_by(base(ctx.data().config.embed_color).title(title), ctx.author())
}

/// Joins names for an embed field, or `-` when there are none.
pub fn field_list(items: &[String], separator: &str) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(separator)
    }
}

/// Embed field names are capped at 256 characters
pub const FIELD_NAME_LIMIT: usize = 256;

fn clip_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

/// Cuts `text` so it fits an embed field value.
pub fn clip(text: &str) -> String {
    clip_chars(text, DISCORD_FIELD_LIMIT)
}

/// Cuts `text` so it fits an embed field name.
pub fn clip_name(text: &str) -> String {
    clip_chars(text, FIELD_NAME_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footer_format() {
        let footer = footer_text();
        assert!(footer.starts_with("BerbBot - "));
        assert_eq!(footer.len(), "BerbBot - 00:00".len());
    }

    #[test]
    fn test_field_list() {
        assert_eq!(field_list(&[], ",\n"), "-");
        assert_eq!(field_list(&["a".into(), "b".into()], ",\n"), "a,\nb");
    }

    #[test]
    fn test_clip_long_values() {
        assert_eq!(clip("short"), "short");
        let long = "ä".repeat(2000);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), DISCORD_FIELD_LIMIT);
        assert!(clipped.ends_with("..."));
    }

    #[test]
    fn test_clip_field_names() {
        assert_eq!(clip_name("Joke"), "Joke");
        let clipped = clip_name(&"a".repeat(300));
        assert_eq!(clipped.chars().count(), FIELD_NAME_LIMIT);
        assert!(clipped.ends_with("..."));
    }
}
