//! Best-effort catalog enrichment
//!
//! One catalog query per reference. Any transport or parse error and any
//! empty result set fall back to a minimal record built from the locally
//! known title; the caller decides whether to log the fallback reason.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::services::musicbrainz_client::{CatalogLookup, CatalogMatch};
use crate::types::{CatalogRecord, UNKNOWN_ARTIST};

/// How one recording is chosen among the search results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Take the first result in service order, no ranking
    #[default]
    FirstMatch,
    /// Take the result with the highest search score; ties go to the earliest
    HighestScore,
}

impl MatchPolicy {
    pub fn select<'a>(&self, matches: &'a [CatalogMatch]) -> Option<&'a CatalogMatch> {
        match self {
            MatchPolicy::FirstMatch => matches.first(),
            MatchPolicy::HighestScore => {
                matches
                    .iter()
                    .fold(None::<&CatalogMatch>, |best, candidate| match best {
                        Some(current) if current.score >= candidate.score => Some(current),
                        _ => Some(candidate),
                    })
            }
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "first_match" => Ok(Self::FirstMatch),
            "highest_score" => Ok(Self::HighestScore),
            other => Err(format!(
                "unknown match policy '{}' (expected 'first_match' or 'highest_score')",
                other
            )),
        }
    }
}

/// Why enrichment fell back to the minimal record
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    NoResults,
    LookupFailed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NoResults => f.write_str("no results"),
            FallbackReason::LookupFailed(cause) => f.write_str(cause),
        }
    }
}

/// Enrichment result: always a record, plus the fallback cause if any
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub record: CatalogRecord,
    pub fallback: Option<FallbackReason>,
}

/// Catalog-backed enricher
#[derive(Clone)]
pub struct MetadataEnricher {
    catalog: Arc<dyn CatalogLookup>,
    policy: MatchPolicy,
}

impl MetadataEnricher {
    pub fn new(catalog: Arc<dyn CatalogLookup>, policy: MatchPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Look up `title` (narrowed by `artist_hint` if given); never fails
    pub async fn enrich(&self, title: &str, artist_hint: Option<&str>) -> Enrichment {
        match self.catalog.search_recordings(title, artist_hint).await {
            Ok(matches) => match self.policy.select(&matches) {
                Some(found) => Enrichment {
                    record: to_record(found, title),
                    fallback: None,
                },
                None => Enrichment {
                    record: CatalogRecord::fallback(title),
                    fallback: Some(FallbackReason::NoResults),
                },
            },
            Err(e) => Enrichment {
                record: CatalogRecord::fallback(title),
                fallback: Some(FallbackReason::LookupFailed(e.to_string())),
            },
        }
    }
}

fn to_record(found: &CatalogMatch, known_title: &str) -> CatalogRecord {
    CatalogRecord {
        title: if found.title.trim().is_empty() {
            known_title.to_string()
        } else {
            found.title.clone()
        },
        artist: found
            .artist
            .clone()
            .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
        release_date: found.release_date.clone(),
        genres: found.genres.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::musicbrainz_client::CatalogError;
    use async_trait::async_trait;

    fn found(title: &str, artist: &str, score: u32) -> CatalogMatch {
        CatalogMatch {
            title: title.to_string(),
            artist: Some(artist.to_string()),
            release_date: Some("1999".to_string()),
            genres: vec!["rock".to_string()],
            score,
        }
    }

    struct FixedCatalog(Result<Vec<CatalogMatch>, ()>);

    #[async_trait]
    impl CatalogLookup for FixedCatalog {
        async fn search_recordings(
            &self,
            _title: &str,
            _artist: Option<&str>,
        ) -> Result<Vec<CatalogMatch>, CatalogError> {
            self.0
                .clone()
                .map_err(|_| CatalogError::Network("connection refused".to_string()))
        }
    }

    #[test]
    fn test_first_match_ignores_score() {
        let matches = vec![found("A", "x", 50), found("B", "y", 100)];
        assert_eq!(MatchPolicy::FirstMatch.select(&matches).unwrap().title, "A");
    }

    #[test]
    fn test_highest_score_ties_go_to_earliest() {
        let matches = vec![found("A", "x", 80), found("B", "y", 100), found("C", "z", 100)];
        assert_eq!(MatchPolicy::HighestScore.select(&matches).unwrap().title, "B");
        assert!(MatchPolicy::HighestScore.select(&[]).is_none());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("first_match".parse::<MatchPolicy>(), Ok(MatchPolicy::FirstMatch));
        assert_eq!("HIGHEST_SCORE".parse::<MatchPolicy>(), Ok(MatchPolicy::HighestScore));
        assert!("best".parse::<MatchPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_match_maps_into_record() {
        let enricher = MetadataEnricher::new(
            Arc::new(FixedCatalog(Ok(vec![found("Yesterday", "The Beatles", 100)]))),
            MatchPolicy::FirstMatch,
        );
        let enrichment = enricher.enrich("yesterday", None).await;
        assert!(enrichment.fallback.is_none());
        assert_eq!(enrichment.record.artist, "The Beatles");
        assert_eq!(enrichment.record.title, "Yesterday");
        assert_eq!(enrichment.record.release_date.as_deref(), Some("1999"));
    }

    #[tokio::test]
    async fn test_empty_results_fall_back() {
        let enricher =
            MetadataEnricher::new(Arc::new(FixedCatalog(Ok(vec![]))), MatchPolicy::FirstMatch);
        let enrichment = enricher.enrich("Obscure Song", None).await;
        assert_eq!(enrichment.record, CatalogRecord::fallback("Obscure Song"));
        assert_eq!(enrichment.fallback, Some(FallbackReason::NoResults));
    }

    #[tokio::test]
    async fn test_lookup_error_falls_back() {
        let enricher =
            MetadataEnricher::new(Arc::new(FixedCatalog(Err(()))), MatchPolicy::HighestScore);
        let enrichment = enricher.enrich("Song", Some("Band")).await;
        assert_eq!(enrichment.record, CatalogRecord::fallback("Song"));
        match enrichment.fallback {
            Some(FallbackReason::LookupFailed(cause)) => assert!(cause.contains("connection refused")),
            other => panic!("unexpected fallback {:?}", other),
        }
    }
}
