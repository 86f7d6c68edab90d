use songbird::input::{Compose, YoutubeDl};
use tracing::warn;

/// A playable source found for a user query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub source_url: String,
    pub title: String,
}

pub fn looks_like_url(query: &str) -> bool {
    let query = query.trim();
    query.starts_with("https://") || query.starts_with("http://")
}

/// Looks up the first YouTube result for `query`. URLs are resolved directly.
/// Lookup failures are logged and reported as "no match".
pub async fn resolve(http: reqwest::Client, query: &str) -> Option<ResolvedTrack> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }

    if looks_like_url(query) {
        let mut source = YoutubeDl::new(http, query.to_string());
        return match source.aux_metadata().await {
            Ok(meta) => Some(ResolvedTrack {
                source_url: meta.source_url.unwrap_or_else(|| query.to_string()),
                title: meta.title.unwrap_or_else(|| query.to_string()),
            }),
            Err(e) => {
                warn!("Failed to resolve {}: {}", query, e);
                None
            }
        };
    }

    let mut source = YoutubeDl::new_search(http, query.to_string());
    match source.search(Some(1)).await {
        Ok(results) => results.into_iter().next().and_then(|meta| {
            Some(ResolvedTrack {
                source_url: meta.source_url?,
                title: meta.title.unwrap_or_else(|| query.to_string()),
            })
        }),
        Err(e) => {
            warn!("YouTube search for '{}' failed: {}", query, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_url() {
        assert!(looks_like_url("https://youtu.be/abc"));
        assert!(looks_like_url("  http://example.com"));
        assert!(!looks_like_url("never gonna give you up"));
        assert!(!looks_like_url("youtube.com"));
    }

    #[tokio::test]
    async fn test_empty_query_resolves_to_nothing() {
        assert!(resolve(reqwest::Client::new(), "   ").await.is_none());
    }
}
