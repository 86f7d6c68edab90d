use super::{decode, fetch_json, ApiError, ApiResult};
use serde::Deserialize;

const BASE_URL: &str = "https://apis.duncte123.me";

pub const ANIMAL_TYPES: &[&str] = &[
    "alpaca",
    "bird",
    "camel",
    "cat",
    "discord-monster",
    "dog",
    "duck",
    "fox",
    "lizard",
    "llama",
    "panda",
    "seal",
    "wolf",
];

pub fn is_animal_type(kind: &str) -> bool {
    ANIMAL_TYPES.contains(&kind)
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct AnimalData {
    file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Joke {
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Meme {
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub url: String,
    pub image: String,
}

fn unwrap_envelope<T>(envelope: Envelope<T>, what: &str) -> ApiResult<T> {
    match envelope {
        Envelope {
            success: true,
            data: Some(data),
        } => Ok(data),
        _ => Err(ApiError::Unsuccessful(format!("{} lookup failed", what))),
    }
}

#[derive(Clone)]
pub struct DuncteClient {
    http: reqwest::Client,
}

impl DuncteClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> ApiResult<Envelope<T>> {
        let url = format!("{}/{}", BASE_URL, path);
        let value = fetch_json(self.http.get(&url))
            .await?
            .ok_or_else(|| ApiError::Unsuccessful(format!("{} not found", path)))?;
        decode(value)
    }

    /// Image URL of a random animal picture. `kind` must be one of [`ANIMAL_TYPES`].
    pub async fn animal(&self, kind: &str) -> ApiResult<String> {
        let envelope: Envelope<AnimalData> = self.get(&format!("animal/{}", kind)).await?;
        unwrap_envelope(envelope, "animal").map(|data| data.file)
    }

    pub async fn joke(&self) -> ApiResult<Joke> {
        unwrap_envelope(self.get("joke").await?, "joke")
    }

    pub async fn meme(&self) -> ApiResult<Meme> {
        unwrap_envelope(self.get("meme").await?, "meme")
    }
}
