use crate::apis::duncte::{is_animal_type, Joke, ANIMAL_TYPES};
use crate::embeds;
use crate::{Context, Error};
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;
use tracing::{info, warn};

const DEFAULT_SIDES: u32 = 6;

/// Non-empty lines of the topic list. A missing file yields no topics.
pub fn load_topics(path: impl AsRef<Path>) -> Vec<String> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let topics = parse_topics(&content);
            info!("Loaded {} topics from {}", topics.len(), path.display());
            topics
        }
        Err(e) => {
            warn!("Could not read topic list {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn parse_topics(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// (name, value) of the joke field, each within its embed limit.
fn joke_field(joke: &Joke) -> (String, String) {
    (
        embeds::clip_name(&format!("------\n{}", joke.title)),
        embeds::clip(&format!("------\n{}", joke.body)),
    )
}

/// Suggest a random conversation topic
#[poise::command(prefix_command, slash_command)]
pub async fn topic(ctx: Context<'_>) -> Result<(), Error> {
    let picked = ctx.data().topics.choose(&mut rand::thread_rng()).cloned();
    match picked {
        Some(topic) => ctx.say(topic).await?,
        None => ctx.say("I don't know any topics right now.").await?,
    };
    Ok(())
}

/// Roll a die
#[poise::command(prefix_command, slash_command)]
pub async fn roll(
    ctx: Context<'_>,
    #[description = "Number of sides (default 6)"]
    #[min = 1]
    sides: Option<u32>,
) -> Result<(), Error> {
    let sides = sides.unwrap_or(DEFAULT_SIDES).max(1);
    let number = rand::thread_rng().gen_range(1..=sides);

    let embed = embeds::reply(ctx, "Rolled")
        .description(format!("You rolled a {}-sided die.", sides))
        .field("Number", format!("||`-{}-`||", number), false);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Flip a coin
#[poise::command(prefix_command, slash_command, aliases("flip"))]
pub async fn coinflip(ctx: Context<'_>) -> Result<(), Error> {
    let side = if rand::thread_rng().gen_bool(0.5) { "Heads" } else { "Tails" };

    let embed = embeds::reply(ctx, "Flipped")
        .description("The coin landed on...")
        .field("Side", format!("||`{}`||", side), false);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show a random animal picture
#[poise::command(prefix_command, slash_command)]
pub async fn animal(
    ctx: Context<'_>,
    #[description = "Animal type, e.g. cat or fox"] kind: String,
) -> Result<(), Error> {
    let kind = kind.to_lowercase();
    if !is_animal_type(&kind) {
        ctx.say(format!(
            "`{}` is not a valid animal type. Valid types are: {}",
            kind,
            ANIMAL_TYPES
                .iter()
                .map(|t| format!("`{}`", t))
                .collect::<Vec<_>>()
                .join(", ")
        ))
        .await?;
        return Ok(());
    }
    ctx.defer().await?;

    match ctx.data().apis.duncte.animal(&kind).await {
        Ok(image) => {
            let embed = embeds::reply(ctx, capitalize(&kind)).image(image);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => {
            warn!("Animal lookup for {} failed: {}", kind, e);
            ctx.say("An API-Error occurred, please try again later.").await?;
        }
    }
    Ok(())
}

/// Tell a random joke
#[poise::command(prefix_command, slash_command)]
pub async fn joke(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    match ctx.data().apis.duncte.joke().await {
        Ok(joke) => {
            let (name, value) = joke_field(&joke);
            let embed = embeds::reply(ctx, "Joke").url(&joke.url).field(name, value, false);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => {
            warn!("Joke lookup failed: {}", e);
            ctx.say("An API-Error occurred, please try again later.").await?;
        }
    }
    Ok(())
}

/// Show a random meme
#[poise::command(prefix_command, slash_command)]
pub async fn meme(ctx: Context<'_>) -> Result<(), Error> {
    ctx.defer().await?;
    match ctx.data().apis.duncte.meme().await {
        Ok(meme) => {
            let mut embed = embeds::reply(ctx, meme.title).url(&meme.url).image(&meme.image);
            if !meme.body.is_empty() {
                embed = embed.description(meme.body);
            }
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => {
            warn!("Meme lookup failed: {}", e);
            ctx.say("An API-Error occurred, please try again later.").await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topics_skips_blank_lines() {
        let topics = parse_topics("What is your favourite food?\n\n  Best holiday ever?  \n");
        assert_eq!(topics, vec!["What is your favourite food?", "Best holiday ever?"]);
    }

    #[test]
    fn test_missing_topic_file() {
        assert!(load_topics("/nonexistent/list-topic.txt").is_empty());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("fox"), "Fox");
        assert_eq!(capitalize("discord-monster"), "Discord-monster");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_joke_field_limits() {
        let joke = Joke {
            title: "t".repeat(400),
            body: "b".repeat(3000),
            url: "https://example.com/joke".to_string(),
        };
        let (name, value) = joke_field(&joke);
        assert_eq!(name.chars().count(), embeds::FIELD_NAME_LIMIT);
        assert_eq!(value.chars().count(), crate::config::DISCORD_FIELD_LIMIT);
        assert!(name.starts_with("------\n"));
    }
}
