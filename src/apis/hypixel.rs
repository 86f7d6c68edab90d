use super::{decode, fetch_cached, fetch_json, ApiError, ApiResult};
use crate::cache::ResponseCache;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

const BASE_URL: &str = "https://api.hypixel.net/v2";

/// Hypixel network level from raw network experience.
pub fn network_level(network_exp: f64) -> f64 {
    ((2.0 * network_exp + 30625.0).sqrt() / 50.0) - 2.5
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub displayname: Option<String>,
    pub rank: Option<String>,
    pub new_package_rank: Option<String>,
    pub package_rank: Option<String>,
    #[serde(default)]
    pub network_exp: f64,
    #[serde(default)]
    pub karma: u64,
    pub social_media: Option<SocialMedia>,
    pub last_login: Option<i64>,
    pub last_logout: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SocialMedia {
    #[serde(default)]
    pub links: HashMap<String, String>,
}

impl PlayerRecord {
    /// Staff rank first, then the purchased rank, else "Non".
    pub fn rank(&self) -> &str {
        match self.rank.as_deref() {
            Some(rank) if rank != "NORMAL" => rank,
            _ => self
                .new_package_rank
                .as_deref()
                .or(self.package_rank.as_deref())
                .unwrap_or("Non"),
        }
    }

    pub fn level(&self) -> f64 {
        network_level(self.network_exp)
    }

    /// `None` when the player hides their session times.
    pub fn is_online(&self) -> Option<bool> {
        match (self.last_login, self.last_logout) {
            (Some(login), Some(logout)) => Some(login > logout),
            _ => None,
        }
    }

    pub fn social_link(&self, network: &str) -> Option<&str> {
        self.social_media
            .as_ref()
            .and_then(|social| social.links.get(network))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GuildRecord {
    pub name: String,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub members: Vec<GuildMember>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildMember {
    pub uuid: String,
    pub rank: Option<String>,
    #[serde(default)]
    pub quest_participation: u64,
    #[serde(default)]
    pub exp_history: BTreeMap<String, u64>,
}

impl GuildRecord {
    pub fn member(&self, uuid: &str) -> Option<&GuildMember> {
        self.members.iter().find(|m| m.uuid == uuid)
    }
}

impl GuildMember {
    pub fn weekly_exp(&self) -> u64 {
        self.exp_history.values().sum()
    }

    /// Daily guild experience, newest day first.
    pub fn exp_by_day(&self) -> impl Iterator<Item = (&str, u64)> {
        self.exp_history.iter().rev().map(|(day, exp)| (day.as_str(), *exp))
    }
}

#[derive(Debug, Deserialize)]
struct PlayerResponse {
    success: bool,
    cause: Option<String>,
    player: Option<PlayerRecord>,
}

#[derive(Debug, Deserialize)]
struct GuildResponse {
    success: bool,
    cause: Option<String>,
    guild: Option<GuildRecord>,
}

fn failure(cause: Option<String>) -> ApiError {
    ApiError::Unsuccessful(cause.unwrap_or_else(|| "unknown cause".to_string()))
}

/// `Ok(None)` means the player never joined the network.
pub fn parse_player(value: serde_json::Value) -> ApiResult<Option<PlayerRecord>> {
    let response: PlayerResponse = decode(value)?;
    if !response.success {
        return Err(failure(response.cause));
    }
    Ok(response.player)
}

pub fn parse_guild(value: serde_json::Value) -> ApiResult<Option<GuildRecord>> {
    let response: GuildResponse = decode(value)?;
    if !response.success {
        return Err(failure(response.cause));
    }
    Ok(response.guild)
}

/// Hypixel public API. The key travels in the `API-Key` header, never in the URL.
#[derive(Clone)]
pub struct HypixelClient {
    http: reqwest::Client,
    api_key: Option<String>,
    cache: Option<ResponseCache<Option<serde_json::Value>>>,
}

impl HypixelClient {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        cache: Option<ResponseCache<Option<serde_json::Value>>>,
    ) -> Self {
        Self { http, api_key, cache }
    }

    async fn get(&self, url: String) -> ApiResult<serde_json::Value> {
        let key = self.api_key.as_deref().ok_or(ApiError::MissingKey("Hypixel"))?;
        let request = self.http.get(&url).header("API-Key", key);
        let value = match &self.cache {
            Some(cache) => fetch_cached(cache, &url, request).await?,
            None => fetch_json(request).await?,
        };
        value.ok_or_else(|| ApiError::Unsuccessful(format!("{} not found", url)))
    }

    pub async fn player(&self, uuid: &str) -> ApiResult<Option<PlayerRecord>> {
        parse_player(self.get(format!("{}/player?uuid={}", BASE_URL, uuid)).await?)
    }

    pub async fn guild_of(&self, uuid: &str) -> ApiResult<Option<GuildRecord>> {
        parse_guild(self.get(format!("{}/guild?player={}", BASE_URL, uuid)).await?)
    }
}
