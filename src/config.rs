use dotenvy::dotenv;
use std::env;
use std::net::SocketAddr;

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub owner_id: Option<u64>,
    pub dev_guild_id: Option<u64>,
    pub default_prefixes: Vec<String>,
    pub embed_color: u32,
    pub status_message: String,
    pub stream_url: String,
    pub database_url: String,
    pub hypixel_api_key: Option<String>,
    pub hypixel_api_key_hycheck: Option<String>,
    pub topic_list_path: String,

    // Relay settings
    pub subbot_ids: Vec<u64>,
    pub relay_bind_addr: SocketAddr,
    pub relay_timeout_secs: u64,

    // Background loop settings
    pub hycheck_interval_secs: u64,
    pub voice_alone_timeout_secs: u64,
}

const DEFAULT_EMBED_COLOR: u32 = 0x1ABC9C;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        let hypixel_api_key = env::var("HYPIXEL_API_KEY").ok();

        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            owner_id: env::var("OWNER_ID").ok().and_then(|id| id.parse().ok()),
            dev_guild_id: env::var("DEV_GUILD_ID").ok().and_then(|id| id.parse().ok()),
            default_prefixes: match env::var("DEFAULT_PREFIXES") {
                Ok(raw) => parse_string_list(&raw)
                    .filter(|list| !list.is_empty())
                    .ok_or_else(|| anyhow::anyhow!("DEFAULT_PREFIXES must be a non-empty list"))?,
                Err(_) => vec![".".to_string()],
            },
            embed_color: match env::var("EMBED_COLOR") {
                Ok(raw) => parse_color(&raw)
                    .ok_or_else(|| anyhow::anyhow!("EMBED_COLOR must be a decimal or 0x-prefixed hex number"))?,
                Err(_) => DEFAULT_EMBED_COLOR,
            },
            status_message: env::var("STATUS_MESSAGE").unwrap_or_else(|_| ".help".to_string()),
            stream_url: env::var("STREAM_URL")
                .unwrap_or_else(|_| "https://twitch.tv/avoncess".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/databank.db".to_string()),
            hypixel_api_key_hycheck: env::var("HYPIXEL_API_KEY_HYCHECK")
                .ok()
                .or_else(|| hypixel_api_key.clone()),
            hypixel_api_key,
            topic_list_path: env::var("TOPIC_LIST_PATH")
                .unwrap_or_else(|_| "data/lists/list-topic.txt".to_string()),
            subbot_ids: match env::var("BOT_SUBBOT_IDS") {
                Ok(raw) => parse_id_list(&raw)
                    .ok_or_else(|| anyhow::anyhow!("BOT_SUBBOT_IDS must be a list of integers"))?,
                Err(_) => Vec::new(),
            },
            relay_bind_addr: env::var("RELAY_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:9999".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RELAY_BIND_ADDR must be a socket address"))?,
            relay_timeout_secs: env::var("RELAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            hycheck_interval_secs: env::var("HYCHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            voice_alone_timeout_secs: env::var("VOICE_ALONE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
        })
    }
}

/// Parses a serialized list of strings.
///
/// Accepts a JSON array (`["!", "?"]`), the same with single quotes
/// (`['!', '?']`), or a plain comma-separated list (`!,?`).
pub fn parse_string_list(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(list) = serde_json::from_str::<Vec<String>>(trimmed) {
            return Some(list);
        }
        return serde_json::from_str::<Vec<String>>(&trimmed.replace('\'', "\"")).ok();
    }

    Some(
        trimmed
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

pub fn parse_id_list(raw: &str) -> Option<Vec<u64>> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).ok();
    }
    trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().ok())
        .collect()
}

pub fn parse_color(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .or_else(|| trimmed.strip_prefix('#'))
    {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => trimmed.parse().ok(),
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("owner_id", &self.owner_id)
            .field("dev_guild_id", &self.dev_guild_id)
            .field("default_prefixes", &self.default_prefixes)
            .field("embed_color", &format_args!("{:#08X}", self.embed_color))
            .field("status_message", &self.status_message)
            .field("stream_url", &self.stream_url)
            .field("database_url", &self.database_url)
            .field(
                "hypixel_api_key",
                &self.hypixel_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "hypixel_api_key_hycheck",
                &self.hypixel_api_key_hycheck.as_ref().map(|_| "[REDACTED]"),
            )
            .field("topic_list_path", &self.topic_list_path)
            .field("subbot_ids", &self.subbot_ids)
            .field("relay_bind_addr", &self.relay_bind_addr)
            .field("relay_timeout_secs", &self.relay_timeout_secs)
            .field("hycheck_interval_secs", &self.hycheck_interval_secs)
            .field("voice_alone_timeout_secs", &self.voice_alone_timeout_secs)
            .finish()
    }
}

/// Embed field values are capped at 1024 characters
pub const DISCORD_FIELD_LIMIT: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_logic() {
        // 1. Test missing vars
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("DEFAULT_PREFIXES");
        env::remove_var("BOT_SUBBOT_IDS");
        let result = Config::build();
        assert!(result.is_err(), "Should fail when required vars are missing");

        // 2. Test defaults
        env::set_var("DISCORD_TOKEN", "test_token");
        let config = Config::build().unwrap();
        assert_eq!(config.discord_token, "test_token");
        assert_eq!(config.default_prefixes, vec![".".to_string()]);
        assert!(config.subbot_ids.is_empty());
        assert_eq!(config.relay_bind_addr.port(), 9999);

        // 3. Test lists
        env::set_var("DEFAULT_PREFIXES", "['!', 'berb ']");
        env::set_var("BOT_SUBBOT_IDS", "[11, 12]");
        let config = Config::build().unwrap();
        assert_eq!(config.default_prefixes, vec!["!".to_string(), "berb ".to_string()]);
        assert_eq!(config.subbot_ids, vec![11, 12]);

        // 4. Test debug redaction
        env::set_var("HYPIXEL_API_KEY", "secret_api_key");
        let config_redacted = Config::build().unwrap();
        assert_eq!(config_redacted.hypixel_api_key_hycheck.as_deref(), Some("secret_api_key"));
        let debug_output = format!("{:?}", config_redacted);
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("secret_api_key"));
        assert!(debug_output.contains("[REDACTED]"));

        // Cleanup
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("DEFAULT_PREFIXES");
        env::remove_var("BOT_SUBBOT_IDS");
        env::remove_var("HYPIXEL_API_KEY");
    }

    #[test]
    fn test_parse_string_list() {
        assert_eq!(
            parse_string_list(r#"["!", "?"]"#),
            Some(vec!["!".to_string(), "?".to_string()])
        );
        assert_eq!(
            parse_string_list("['.', 'berb.']"),
            Some(vec![".".to_string(), "berb.".to_string()])
        );
        assert_eq!(
            parse_string_list(" !, ?, "),
            Some(vec!["!".to_string(), "?".to_string()])
        );
        assert_eq!(parse_string_list("[1, 2"), None);
    }

    #[test]
    fn test_parse_id_list_and_color() {
        assert_eq!(parse_id_list("[1, 2, 3]"), Some(vec![1, 2, 3]));
        assert_eq!(parse_id_list("4,5"), Some(vec![4, 5]));
        assert_eq!(parse_id_list("4,x"), None);

        assert_eq!(parse_color("1752220"), Some(1752220));
        assert_eq!(parse_color("0x1ABC9C"), Some(0x1ABC9C));
        assert_eq!(parse_color("#ff0000"), Some(0xFF0000));
        assert_eq!(parse_color("teal"), None);
    }
}
