use crate::db::Database;
use crate::{Data, Error};
use poise::serenity_prelude as serenity;
use tracing::warn;

/// Resolves which command prefixes are valid for a message.
#[derive(Clone)]
pub struct PrefixService {
    db: Database,
    defaults: Vec<String>,
}

impl PrefixService {
    pub fn new(db: Database, defaults: Vec<String>) -> Self {
        Self { db, defaults }
    }

    pub fn defaults(&self) -> &[String] {
        &self.defaults
    }

    /// Custom prefixes replace the defaults outright; direct messages always
    /// use the defaults.
    pub async fn prefixes_for(&self, guild_id: Option<u64>) -> anyhow::Result<Vec<String>> {
        let Some(guild_id) = guild_id else {
            return Ok(self.defaults.clone());
        };

        let custom = self
            .db
            .run_blocking(move |db| db.get_guild_prefixes(guild_id))
            .await?;

        if custom.is_empty() {
            Ok(self.defaults.clone())
        } else {
            Ok(custom)
        }
    }

    pub async fn set_prefixes(&self, guild_id: u64, prefixes: Vec<String>) -> anyhow::Result<()> {
        self.db
            .run_blocking(move |db| db.set_guild_prefixes(guild_id, &prefixes))
            .await
    }

    pub async fn reset_prefixes(&self, guild_id: u64) -> anyhow::Result<usize> {
        self.db
            .run_blocking(move |db| db.reset_guild_prefixes(guild_id))
            .await
    }
}

/// Splits user input for `prefix set` into individual prefixes.
pub fn parse_prefix_input(input: &str) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::new();
    for prefix in input.split_whitespace() {
        if !prefixes.iter().any(|p| p == prefix) {
            prefixes.push(prefix.to_string());
        }
    }
    prefixes
}

/// Finds the first prefix (in list order) that starts `content`.
///
/// Returns the matched prefix and the remainder with leading whitespace
/// removed, both borrowed from `content`.
pub fn match_prefix<'a>(content: &'a str, prefixes: &[String]) -> Option<(&'a str, &'a str)> {
    prefixes.iter().find_map(|prefix| {
        if prefix.is_empty() {
            return None;
        }
        content
            .strip_prefix(prefix.as_str())
            .map(|rest| (&content[..prefix.len()], rest.trim_start()))
    })
}

/// Hook for `PrefixFrameworkOptions::stripped_dynamic_prefix`.
pub fn strip_guild_prefix<'a>(
    _ctx: &'a serenity::Context,
    msg: &'a serenity::Message,
    data: &'a Data,
) -> poise::BoxFuture<'a, Result<Option<(&'a str, &'a str)>, Error>> {
    Box::pin(async move {
        let prefixes = match data.prefixes.prefixes_for(msg.guild_id.map(|id| id.get())).await {
            Ok(prefixes) => prefixes,
            Err(e) => {
                warn!("Prefix lookup failed for guild {:?}: {}", msg.guild_id, e);
                data.prefixes.defaults().to_vec()
            }
        };
        Ok(match_prefix(&msg.content, &prefixes))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PrefixService {
        let db = Database::new(":memory:").unwrap();
        db.execute_init().unwrap();
        PrefixService::new(db, vec![".".to_string(), "b!".to_string()])
    }

    #[tokio::test]
    async fn test_defaults_without_custom_rows() {
        let service = service();
        assert_eq!(service.prefixes_for(Some(1)).await.unwrap(), vec![".", "b!"]);
    }

    #[tokio::test]
    async fn test_custom_prefixes_replace_defaults() {
        let service = service();
        service
            .set_prefixes(1, vec!["?".to_string(), "berb ".to_string()])
            .await
            .unwrap();

        let resolved = service.prefixes_for(Some(1)).await.unwrap();
        assert_eq!(resolved, vec!["?", "berb "]);
        assert!(!resolved.contains(&".".to_string()));

        // Another guild still sees the defaults
        assert_eq!(service.prefixes_for(Some(2)).await.unwrap(), vec![".", "b!"]);
    }

    #[tokio::test]
    async fn test_direct_messages_use_defaults() {
        let service = service();
        service.set_prefixes(1, vec!["?".to_string()]).await.unwrap();
        assert_eq!(service.prefixes_for(None).await.unwrap(), vec![".", "b!"]);
    }

    #[tokio::test]
    async fn test_reset_restores_defaults() {
        let service = service();
        service.set_prefixes(1, vec!["?".to_string()]).await.unwrap();
        assert_eq!(service.reset_prefixes(1).await.unwrap(), 1);
        assert_eq!(service.prefixes_for(Some(1)).await.unwrap(), vec![".", "b!"]);
    }

    #[test]
    fn test_match_prefix() {
        let prefixes = vec!["b!".to_string(), "b".to_string(), "".to_string()];

        assert_eq!(match_prefix("b!play song", &prefixes), Some(("b!", "play song")));
        assert_eq!(match_prefix("b   ping", &prefixes), Some(("b", "ping")));
        assert_eq!(match_prefix("hello", &prefixes), None);
        // An empty prefix never matches
        assert_eq!(match_prefix("", &prefixes), None);
    }

    #[test]
    fn test_parse_prefix_input() {
        assert_eq!(parse_prefix_input("  !  ?   !  $ "), vec!["!", "?", "$"]);
        assert!(parse_prefix_input("   ").is_empty());
    }
}
