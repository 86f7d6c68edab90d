//! Clients for the third-party web APIs the fun and Minecraft commands use.

pub mod duncte;
pub mod hypixel;
pub mod mojang;

pub use duncte::DuncteClient;
pub use hypixel::HypixelClient;
pub use mojang::MojangClient;

use crate::cache::ResponseCache;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

pub const USER_AGENT: &str = concat!("BerbBot/", env!("CARGO_PKG_VERSION"));

/// Cache lifetime for Mojang and Hypixel lookups made by chat commands.
pub const CACHE_TTL: Duration = Duration::from_secs(10 * 60);
const CACHE_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("API returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("API reported failure: {0}")]
    Unsuccessful(String),
    #[error("no API key configured for {0}")]
    MissingKey(&'static str),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Sends `request` and returns the JSON body, or `None` for 404/204.
pub(crate) async fn fetch_json(request: RequestBuilder) -> ApiResult<Option<serde_json::Value>> {
    let response = request.header(reqwest::header::USER_AGENT, USER_AGENT).send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
        debug!(status = %status, "API lookup found nothing");
        return Ok(None);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(status = %status, body = %body, "API returned error");
        return Err(ApiError::Status {
            status: status.as_u16(),
            message: body,
        });
    }

    Ok(Some(response.json().await?))
}

/// Like [`fetch_json`], but answers repeated `key`s from `cache`.
pub(crate) async fn fetch_cached(
    cache: &ResponseCache<Option<serde_json::Value>>,
    key: &str,
    request: RequestBuilder,
) -> ApiResult<Option<serde_json::Value>> {
    if let Some(hit) = cache.get(key) {
        debug!(key, "API cache hit");
        return Ok(hit);
    }
    let value = fetch_json(request).await?;
    cache.insert(key, value.clone());
    Ok(value)
}

pub(crate) fn decode<T: DeserializeOwned>(value: serde_json::Value) -> ApiResult<T> {
    Ok(serde_json::from_value(value)?)
}

/// All API clients used by commands, sharing one HTTP client.
#[derive(Clone)]
pub struct Apis {
    pub duncte: DuncteClient,
    pub mojang: MojangClient,
    pub hypixel: HypixelClient,
}

impl Apis {
    pub fn new(http: reqwest::Client, hypixel_api_key: Option<String>) -> Self {
        let cache = ResponseCache::new(CACHE_CAPACITY, CACHE_TTL);
        Self {
            duncte: DuncteClient::new(http.clone()),
            mojang: MojangClient::new(http.clone(), Some(cache.clone())),
            hypixel: HypixelClient::new(http, hypixel_api_key, Some(cache)),
        }
    }
}
