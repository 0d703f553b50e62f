//! MusicBrainz recording search client
//!
//! Free-text recording search keyed by title (plus an optional artist
//! clause), rate limited client-side with a token bucket as the MusicBrainz
//! usage policy requires.
//!
//! API Documentation: https://musicbrainz.org/doc/MusicBrainz_API/Search

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use thiserror::Error;

use crate::config::CatalogConfig;

/// Characters with meaning in Lucene query syntax
const LUCENE_SPECIAL: &[char] = &[
    '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

/// Catalog client errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP client could not be constructed
    #[error("Invalid catalog client configuration: {0}")]
    Client(String),

    /// Request failed in transit (connect, timeout, TLS)
    #[error("Catalog request failed: {0}")]
    Network(String),

    /// Service throttled the request
    #[error("Catalog rate limit exceeded")]
    RateLimited,

    /// Non-success HTTP status
    #[error("Catalog returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body was not the expected JSON
    #[error("Failed to parse catalog response: {0}")]
    Parse(String),
}

/// One recording returned by a catalog search
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogMatch {
    pub title: String,
    /// First credited artist, if any
    pub artist: Option<String>,
    pub release_date: Option<String>,
    pub genres: Vec<String>,
    /// Search relevance (0-100)
    pub score: u32,
}

/// Remote catalog able to search recordings
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Search recordings; results in the service's ranking order
    async fn search_recordings(
        &self,
        title: &str,
        artist: Option<&str>,
    ) -> Result<Vec<CatalogMatch>, CatalogError>;
}

/// Recording search response
#[derive(Debug, Deserialize)]
struct MBSearchResponse {
    #[serde(default)]
    recordings: Vec<MBRecording>,
}

#[derive(Debug, Deserialize)]
struct MBRecording {
    #[serde(default)]
    title: String,
    #[serde(default)]
    score: Option<u32>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MBArtistCredit>,
    #[serde(rename = "first-release-date", default)]
    first_release_date: Option<String>,
    #[serde(default)]
    tags: Vec<MBTag>,
}

#[derive(Debug, Deserialize)]
struct MBArtistCredit {
    #[serde(default)]
    name: Option<String>,
    artist: Option<MBArtist>,
}

#[derive(Debug, Deserialize)]
struct MBArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MBTag {
    name: String,
}

impl From<MBRecording> for CatalogMatch {
    fn from(recording: MBRecording) -> Self {
        let artist = recording.artist_credit.into_iter().next().and_then(|credit| {
            credit
                .artist
                .map(|a| a.name)
                .or(credit.name)
                .filter(|n| !n.is_empty())
        });

        Self {
            title: recording.title,
            artist,
            release_date: recording.first_release_date.filter(|d| !d.is_empty()),
            genres: recording.tags.into_iter().map(|t| t.name).collect(),
            score: recording.score.unwrap_or(0),
        }
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    /// HTTP client with configured timeout and User-Agent
    client: Client,
    base_url: String,
    result_limit: u32,
    /// Token bucket shared by all concurrent lookups
    rate_limiter: RateLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl MusicBrainzClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| CatalogError::Client(e.to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            CatalogError::Client("requests_per_second must be at least 1".to_string())
        })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            result_limit: config.result_limit,
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl CatalogLookup for MusicBrainzClient {
    async fn search_recordings(
        &self,
        title: &str,
        artist: Option<&str>,
    ) -> Result<Vec<CatalogMatch>, CatalogError> {
        self.rate_limiter.until_ready().await;

        let query = build_query(title, artist);
        let limit = self.result_limit.to_string();
        let url = format!("{}/recording/", self.base_url);
        tracing::debug!(query = %query, "Querying MusicBrainz");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query.as_str()),
                ("fmt", "json"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 503 || status.as_u16() == 429 {
            return Err(CatalogError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let parsed: MBSearchResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))?;

        Ok(parsed.recordings.into_iter().map(CatalogMatch::from).collect())
    }
}

/// Lucene query for a title, optionally narrowed by artist
pub fn build_query(title: &str, artist: Option<&str>) -> String {
    let mut query = escape_lucene(title.trim());
    if let Some(artist) = artist.map(str::trim).filter(|a| !a.is_empty()) {
        query.push_str(&format!(" AND artist:\"{}\"", escape_lucene(artist)));
    }
    query
}

fn escape_lucene(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if LUCENE_SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("Yesterday", None), "Yesterday");
        assert_eq!(
            build_query("AC/DC: Live!", Some("AC/DC")),
            "AC\\/DC\\: Live\\! AND artist:\"AC\\/DC\""
        );
        assert_eq!(build_query("Song", Some("  ")), "Song");
    }

    #[test]
    fn test_search_response_mapping() {
        let body = r#"{
            "created": "2024-01-01T00:00:00.000Z",
            "count": 2,
            "offset": 0,
            "recordings": [
                {
                    "id": "b1",
                    "score": 100,
                    "title": "Yesterday",
                    "artist-credit": [{"name": "The Beatles", "artist": {"id": "a1", "name": "The Beatles"}}],
                    "first-release-date": "1965-08-06",
                    "tags": [{"count": 3, "name": "rock"}, {"count": 1, "name": "pop"}]
                },
                {"id": "b2", "title": "Yesterday (cover)"}
            ]
        }"#;

        let parsed: MBSearchResponse = serde_json::from_str(body).unwrap();
        let matches: Vec<CatalogMatch> = parsed.recordings.into_iter().map(CatalogMatch::from).collect();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].artist.as_deref(), Some("The Beatles"));
        assert_eq!(matches[0].release_date.as_deref(), Some("1965-08-06"));
        assert_eq!(matches[0].genres, vec!["rock", "pop"]);
        assert_eq!(matches[0].score, 100);
        assert_eq!(matches[1].artist, None);
        assert!(matches[1].genres.is_empty());
        assert_eq!(matches[1].score, 0);
    }

    #[test]
    fn test_empty_search_response() {
        let parsed: MBSearchResponse = serde_json::from_str(r#"{"count": 0, "recordings": []}"#).unwrap();
        assert!(parsed.recordings.is_empty());
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let config = CatalogConfig {
            requests_per_second: 0,
            ..CatalogConfig::default()
        };
        assert!(matches!(
            MusicBrainzClient::new(&config),
            Err(CatalogError::Client(_))
        ));
    }
}
