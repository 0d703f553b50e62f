//! Download-free metadata probe
//!
//! [`probe_info`] never fails: any backend error becomes
//! [`ProbeOutcome::Unknown`] carrying the cause, and the caller decides how
//! to treat an unknown duration.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{MediaInfo, MediaReference, ProbeOutcome};

/// Probe backend errors
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Backend process could not be started
    #[error("Failed to start probe backend: {0}")]
    Spawn(#[source] std::io::Error),

    /// Backend exited unsuccessfully
    #[error("Probe backend exited with {status}: {stderr}")]
    BackendFailed { status: String, stderr: String },

    /// Backend output was not understood
    #[error("Unparsable probe output: {0}")]
    Parse(String),
}

/// Raw fields reported by a probe backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMediaInfo {
    pub title: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// Backend able to report title and duration without downloading media
#[async_trait]
pub trait InfoProber: Send + Sync {
    async fn probe(&self, reference: &MediaReference) -> Result<RawMediaInfo, ProbeError>;
}

/// Probe one reference, folding every failure into `ProbeOutcome::Unknown`
pub async fn probe_info(prober: &dyn InfoProber, reference: &MediaReference) -> ProbeOutcome {
    match prober.probe(reference).await {
        Ok(raw) => classify(raw),
        Err(e) => {
            tracing::debug!(reference = %reference, error = %e, "Probe failed");
            ProbeOutcome::Unknown {
                title: None,
                cause: e.to_string(),
            }
        }
    }
}

fn classify(raw: RawMediaInfo) -> ProbeOutcome {
    let title = raw
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    match raw.duration_seconds {
        Some(duration) if duration.is_finite() && duration >= 0.0 => {
            ProbeOutcome::Probed(MediaInfo {
                title: title.unwrap_or_else(|| crate::types::UNKNOWN_TITLE.to_string()),
                duration_seconds: duration,
            })
        }
        _ => ProbeOutcome::Unknown {
            title,
            cause: "no duration reported".to_string(),
        },
    }
}
