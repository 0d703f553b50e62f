//! Core data model for the batch pipeline
//!
//! Values flowing between pipeline stages: references, probe results,
//! feature vectors, catalog records, and the flattened output row.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Title used when the probe backend cannot supply one
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Artist used when catalog enrichment finds nothing
pub const UNKNOWN_ARTIST: &str = "Unknown";

/// Cepstral coefficients kept per feature vector
pub const MFCC_COEFFICIENTS: usize = 13;

/// Pitch classes per chroma vector
pub const CHROMA_BINS: usize = 12;

// ============================================================================
// References & Probing
// ============================================================================

/// Opaque external locator for one media item (typically a URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaReference(String);

impl MediaReference {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaReference {
    fn from(locator: &str) -> Self {
        Self::new(locator)
    }
}

impl From<String> for MediaReference {
    fn from(locator: String) -> Self {
        Self(locator)
    }
}

/// Title and duration of a probed reference
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub title: String,
    pub duration_seconds: f64,
}

impl MediaInfo {
    /// Sentinel returned in place of a failed probe
    pub fn unknown() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            duration_seconds: 0.0,
        }
    }
}

/// Result of probing one reference
///
/// `Unknown` keeps "probe failed" distinct from "known to be short".
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Backend reported both title and duration
    Probed(MediaInfo),
    /// Backend failed, or did not report a duration
    Unknown {
        /// Title, if the backend got far enough to report one
        title: Option<String>,
        cause: String,
    },
}

impl ProbeOutcome {
    /// Best known title, falling back to [`UNKNOWN_TITLE`]
    pub fn title(&self) -> &str {
        match self {
            ProbeOutcome::Probed(info) => &info.title,
            ProbeOutcome::Unknown { title, .. } => title.as_deref().unwrap_or(UNKNOWN_TITLE),
        }
    }

    /// Duration in seconds, `None` when unknown
    pub fn duration_seconds(&self) -> Option<f64> {
        match self {
            ProbeOutcome::Probed(info) => Some(info.duration_seconds),
            ProbeOutcome::Unknown { .. } => None,
        }
    }

    /// Sentinel view: unknown duration reads as 0 seconds
    pub fn info(&self) -> MediaInfo {
        match self {
            ProbeOutcome::Probed(info) => info.clone(),
            ProbeOutcome::Unknown { title, .. } => MediaInfo {
                title: title.clone().unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
                duration_seconds: 0.0,
            },
        }
    }
}

// ============================================================================
// Features & Catalog
// ============================================================================

/// Time-averaged acoustic descriptors of one audio artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Single global tempo estimate (BPM)
    pub tempo_bpm: f64,
    /// `MFCC_COEFFICIENTS` cepstral coefficients
    pub mfcc: Vec<f64>,
    /// One contrast value per octave band
    pub spectral_contrast: Vec<f64>,
    /// `CHROMA_BINS` pitch-class energies
    pub chroma_stft: Vec<f64>,
}

/// Descriptive metadata for one reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub title: String,
    pub artist: String,
    pub release_date: Option<String>,
    pub genres: Vec<String>,
}

impl CatalogRecord {
    /// Minimal record built from the locally known title
    pub fn fallback(title: &str) -> Self {
        Self {
            title: title.to_string(),
            artist: UNKNOWN_ARTIST.to_string(),
            release_date: None,
            genres: Vec::new(),
        }
    }
}

// ============================================================================
// Output Rows
// ============================================================================

/// Storage class of one output column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    NullableText,
    TextList,
    Float,
}

/// One cell of an output row
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    NullableText(Option<String>),
    TextList(Vec<String>),
    Float(f64),
}

impl ColumnValue {
    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValue::Text(_) => ColumnKind::Text,
            ColumnValue::NullableText(_) => ColumnKind::NullableText,
            ColumnValue::TextList(_) => ColumnKind::TextList,
            ColumnValue::Float(_) => ColumnKind::Float,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ColumnValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ColumnValue::Text(s) => Some(s),
            ColumnValue::NullableText(s) => s.as_deref(),
            _ => None,
        }
    }
}

/// Flattened catalog record plus feature vector, keyed by column name
///
/// Column order is insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    columns: Vec<(String, ColumnValue)>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column; a repeated name replaces the earlier value in place
    pub fn push(&mut self, name: impl Into<String>, value: ColumnValue) {
        let name = name.into();
        match self.columns.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_probe_sentinel_view() {
        let outcome = ProbeOutcome::Unknown {
            title: None,
            cause: "network unreachable".to_string(),
        };
        assert_eq!(outcome.title(), UNKNOWN_TITLE);
        assert_eq!(outcome.duration_seconds(), None);
        assert_eq!(outcome.info(), MediaInfo::unknown());
    }

    #[test]
    fn test_partial_probe_keeps_title() {
        let outcome = ProbeOutcome::Unknown {
            title: Some("Live Stream".to_string()),
            cause: "no duration reported".to_string(),
        };
        assert_eq!(outcome.title(), "Live Stream");
        assert_eq!(outcome.info().duration_seconds, 0.0);
    }

    #[test]
    fn test_fallback_record() {
        let record = CatalogRecord::fallback("Some Song");
        assert_eq!(record.title, "Some Song");
        assert_eq!(record.artist, UNKNOWN_ARTIST);
        assert!(record.release_date.is_none());
        assert!(record.genres.is_empty());
    }

    #[test]
    fn test_row_push_replaces_duplicate_in_place() {
        let mut row = FeatureRow::new();
        row.push("title", ColumnValue::Text("a".to_string()));
        row.push("tempo", ColumnValue::Float(120.0));
        row.push("title", ColumnValue::Text("b".to_string()));

        let names: Vec<&str> = row.columns().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["title", "tempo"]);
        assert_eq!(row.get("title").and_then(|v| v.as_text()), Some("b"));
    }

    #[test]
    fn test_reference_serde_is_transparent() {
        let reference: MediaReference = serde_json::from_str("\"https://example.com/v\"").unwrap();
        assert_eq!(reference.as_str(), "https://example.com/v");
    }
}
