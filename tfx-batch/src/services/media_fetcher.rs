//! Acquisition & transcode adapter contract
//!
//! An acquirer materializes one reference as an uncompressed WAV file at a
//! caller-chosen path. It never cleans up partial output; the orchestrator
//! owns the artifact's lifetime.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::types::MediaReference;

/// Longest sanitized title kept in artifact file names
const MAX_STEM_CHARS: usize = 96;

/// Acquisition errors
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Backend process could not be started
    #[error("Failed to start acquisition backend for {reference}: {source}")]
    Spawn {
        reference: MediaReference,
        #[source]
        source: std::io::Error,
    },

    /// Backend exited unsuccessfully
    #[error("Acquisition backend failed for {reference} ({status}): {stderr}")]
    BackendFailed {
        reference: MediaReference,
        status: String,
        stderr: String,
    },

    /// Backend reported success but left no file at the destination
    #[error("No audio produced for {reference} at {}", .path.display())]
    MissingOutput {
        reference: MediaReference,
        path: PathBuf,
    },
}

/// Backend able to fetch and transcode a reference to WAV
#[async_trait]
pub trait MediaAcquirer: Send + Sync {
    /// Write the reference's audio to `destination`
    async fn acquire(
        &self,
        reference: &MediaReference,
        destination: &Path,
    ) -> Result<(), AcquisitionError>;
}

/// Map a title onto a path-safe file stem
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`; leading dots are
/// replaced too so the stem never names a hidden file or `..`.
pub fn sanitize_title(title: &str) -> String {
    let mut stem: String = title
        .trim()
        .chars()
        .take(MAX_STEM_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if stem.starts_with('.') {
        stem = stem.replacen('.', "_", 1);
    }
    if stem.is_empty() {
        stem.push_str("untitled");
    }
    stem
}

/// Deterministic artifact path for one reference
///
/// `<temp_dir>/<sanitized title>-<8 hex>-<index>.wav`. The hex part is
/// derived from the reference so two references sharing a title never
/// collide; `index` is the reference's position in the batch so duplicate
/// references in one batch never share a file.
pub fn artifact_path(
    temp_dir: &Path,
    title: &str,
    reference: &MediaReference,
    index: usize,
) -> PathBuf {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, reference.as_str().as_bytes());
    let suffix = &id.simple().to_string()[..8];
    temp_dir.join(format!("{}-{}-{}.wav", sanitize_title(title), suffix, index))
}
