use super::{decode, fetch_cached, fetch_json, ApiResult};
use crate::cache::ResponseCache;
use serde::Deserialize;

const PROFILE_URL: &str = "https://api.mojang.com/users/profiles/minecraft";
const CRAFATAR_URL: &str = "https://crafatar.com";

#[derive(Debug, Deserialize)]
struct Profile {
    id: String,
}

/// The part of a skin to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkinPart {
    Face,
    Head,
    Body,
}

/// Crafatar image URL for a player's skin.
pub fn skin_url(uuid: &str, part: SkinPart) -> String {
    match part {
        SkinPart::Face => format!("{}/avatars/{}?size=128&overlay", CRAFATAR_URL, uuid),
        SkinPart::Head => format!("{}/renders/head/{}?size=512&overlay", CRAFATAR_URL, uuid),
        SkinPart::Body => format!("{}/renders/body/{}?size=512&overlay", CRAFATAR_URL, uuid),
    }
}

pub fn avatar_url(uuid: &str) -> String {
    format!("{}/avatars/{}", CRAFATAR_URL, uuid)
}

/// Player names are 3-16 characters of letters, digits and underscores.
pub fn is_valid_player_name(name: &str) -> bool {
    (3..=16).contains(&name.len()) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Clone)]
pub struct MojangClient {
    http: reqwest::Client,
    cache: Option<ResponseCache<Option<serde_json::Value>>>,
}

impl MojangClient {
    pub fn new(http: reqwest::Client, cache: Option<ResponseCache<Option<serde_json::Value>>>) -> Self {
        Self { http, cache }
    }

    /// Resolves a player name to its undashed UUID, or `None` if nobody has it.
    pub async fn uuid(&self, player_name: &str) -> ApiResult<Option<String>> {
        let player_name = player_name.trim();
        if !is_valid_player_name(player_name) {
            return Ok(None);
        }

        let url = format!("{}/{}", PROFILE_URL, player_name);
        let request = self.http.get(&url);
        let value = match &self.cache {
            Some(cache) => fetch_cached(cache, &url.to_lowercase(), request).await?,
            None => fetch_json(request).await?,
        };

        match value {
            Some(value) => Ok(Some(decode::<Profile>(value)?.id)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skin_urls() {
        assert_eq!(
            skin_url("abc", SkinPart::Face),
            "https://crafatar.com/avatars/abc?size=128&overlay"
        );
        assert_eq!(
            skin_url("abc", SkinPart::Head),
            "https://crafatar.com/renders/head/abc?size=512&overlay"
        );
        assert_eq!(
            skin_url("abc", SkinPart::Body),
            "https://crafatar.com/renders/body/abc?size=512&overlay"
        );
    }

    #[test]
    fn test_player_name_validation() {
        assert!(is_valid_player_name("Notch"));
        assert!(is_valid_player_name("a_b_c"));
        assert!(!is_valid_player_name("ab"));
        assert!(!is_valid_player_name("name with space"));
        assert!(!is_valid_player_name("../../etc"));
        assert!(!is_valid_player_name("seventeen_chars__"));
    }

    #[tokio::test]
    async fn test_invalid_name_skips_request() {
        let client = MojangClient::new(reqwest::Client::new(), None);
        assert_eq!(client.uuid("no/slashes").await.unwrap(), None);
    }
}
