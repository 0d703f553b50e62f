//! Per-reference pipeline run
//!
//! `Probing → (Rejected | Admitted) → Acquiring → Extracting → Enriching → Assembled`
//!
//! A run never fails to its caller: every failure is recorded in the error
//! sink and folded into a [`ReferenceOutcome`]. The audio artifact is claimed
//! before acquisition starts and removed on every exit path.

use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{PipelineContext, ReferenceOutcome, Stage};
use crate::features::validate_feature_vector;
use crate::services::admission::{evaluate, AdmissionDecision};
use crate::services::info_prober::probe_info;
use crate::services::media_fetcher::artifact_path;
use crate::services::metadata_enricher::FallbackReason;
use crate::services::row_assembler::assemble_row;
use crate::types::{FeatureRow, MediaReference, ProbeOutcome, UNKNOWN_TITLE};

/// Process one reference; `None` unless every stage succeeded
///
/// `index` is the reference's position in its batch and keeps the audio
/// artifact of duplicate references apart.
pub async fn process_reference(
    index: usize,
    reference: &MediaReference,
    ctx: &PipelineContext,
) -> Option<FeatureRow> {
    run_reference(index, reference, ctx).await.into_row()
}

/// Process one reference and report how it ended
pub async fn run_reference(
    index: usize,
    reference: &MediaReference,
    ctx: &PipelineContext,
) -> ReferenceOutcome {
    let started = std::time::Instant::now();
    let deadline = ctx.config.item_timeout.map(|timeout| Instant::now() + timeout);
    let guard = Guard {
        cancel: &ctx.cancel,
        deadline,
    };

    if ctx.cancel.is_cancelled() {
        ctx.sink
            .record(format!("Cancelled {} before processing started", reference));
        return ReferenceOutcome::Cancelled;
    }

    // Probing
    let probe = match guard
        .run(probe_info(ctx.backends.prober.as_ref(), reference))
        .await
    {
        Ok(outcome) => outcome,
        Err(interrupt) => {
            return interrupted(ctx, reference, UNKNOWN_TITLE, Stage::Probing, interrupt)
        }
    };

    if let ProbeOutcome::Unknown { cause, .. } = &probe {
        ctx.sink
            .record(format!("Failed to retrieve info for URL {}: {}", reference, cause));
    }
    let title = probe.title().to_string();

    if let AdmissionDecision::Reject(reason) = evaluate(&probe, &ctx.config) {
        info!(reference = %reference, title = %title, reason = %reason, "Reference skipped");
        ctx.sink
            .record(format!("Skipped {} ({}): {}", reference, title, reason));
        return ReferenceOutcome::Rejected;
    }

    let artifact = AudioArtifact::claim(artifact_path(
        &ctx.config.temp_dir,
        &title,
        reference,
        index,
    ));
    let outcome = analyze_admitted(reference, &title, &artifact, &guard, ctx).await;
    artifact.release().await;

    if let ReferenceOutcome::Completed(_) = &outcome {
        info!(
            reference = %reference,
            title = %title,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reference processed"
        );
    }
    outcome
}

/// Acquiring → Extracting → Enriching for an admitted reference
async fn analyze_admitted(
    reference: &MediaReference,
    title: &str,
    artifact: &AudioArtifact,
    guard: &Guard<'_>,
    ctx: &PipelineContext,
) -> ReferenceOutcome {
    // Acquiring
    debug!(reference = %reference, path = %artifact.path().display(), "Acquiring audio");

    match guard
        .run(ctx.backends.acquirer.acquire(reference, artifact.path()))
        .await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            ctx.sink.record(format!(
                "Failed to download audio for {} ({}): {}",
                reference, title, e
            ));
            return ReferenceOutcome::Failed {
                stage: Stage::Acquiring,
            };
        }
        Err(interrupt) => return interrupted(ctx, reference, title, Stage::Acquiring, interrupt),
    }

    // Extracting
    let extractor = ctx.backends.extractor.as_ref();
    let extracted = match guard.run(extractor.extract(artifact.path())).await {
        Ok(result) => result.and_then(|features| {
            validate_feature_vector(&features, extractor.contrast_bands())?;
            Ok(features)
        }),
        Err(interrupt) => return interrupted(ctx, reference, title, Stage::Extracting, interrupt),
    };
    let features = match extracted {
        Ok(features) => features,
        Err(e) => {
            ctx.sink.record(format!(
                "Failed to extract features for {} ({}): {}",
                reference, title, e
            ));
            return ReferenceOutcome::Failed {
                stage: Stage::Extracting,
            };
        }
    };

    // Enriching
    let enrichment = match guard.run(ctx.enricher.enrich(title, None)).await {
        Ok(enrichment) => enrichment,
        Err(interrupt) => return interrupted(ctx, reference, title, Stage::Enriching, interrupt),
    };
    match &enrichment.fallback {
        Some(FallbackReason::NoResults) => {
            ctx.sink
                .record(format!("No results from MusicBrainz for {}", title));
        }
        Some(FallbackReason::LookupFailed(cause)) => {
            ctx.sink
                .record(format!("Failed to fetch metadata for {}: {}", title, cause));
        }
        None => {}
    }

    debug!(
        reference = %reference,
        artist = %enrichment.record.artist,
        tempo = format!("{:.1}", features.tempo_bpm),
        "Features assembled"
    );

    ReferenceOutcome::Completed(assemble_row(enrichment.record, &features))
}

/// Why a stage was abandoned before finishing
#[derive(Debug, Clone, Copy, PartialEq)]
enum Interrupt {
    Cancelled,
    TimedOut,
}

/// Races each stage against run-wide cancellation and the item deadline
struct Guard<'a> {
    cancel: &'a CancellationToken,
    deadline: Option<Instant>,
}

impl Guard<'_> {
    async fn run<F: Future>(&self, stage: F) -> Result<F::Output, Interrupt> {
        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = expiry => Err(Interrupt::TimedOut),
            output = stage => Ok(output),
        }
    }
}

fn interrupted(
    ctx: &PipelineContext,
    reference: &MediaReference,
    title: &str,
    stage: Stage,
    interrupt: Interrupt,
) -> ReferenceOutcome {
    match interrupt {
        Interrupt::Cancelled => {
            ctx.sink.record(format!(
                "Cancelled {} ({}) while {}",
                reference, title, stage
            ));
            ReferenceOutcome::Cancelled
        }
        Interrupt::TimedOut => {
            let limit = ctx
                .config
                .item_timeout
                .map(|t| t.as_secs())
                .unwrap_or_default();
            ctx.sink.record(format!(
                "Timed out processing {} ({}) after {}s while {}",
                reference, title, limit, stage
            ));
            ReferenceOutcome::Failed { stage }
        }
    }
}

/// Temporary WAV owned by one run
///
/// [`AudioArtifact::release`] removes the file and any `<stem>.*` leftovers
/// the backend wrote next to it on the blocking pool. Dropping an
/// unreleased artifact (the run's future was abandoned) removes them inline.
/// Missing files are not an error.
#[derive(Debug)]
pub struct AudioArtifact {
    path: PathBuf,
    released: bool,
}

impl AudioArtifact {
    pub fn claim(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the artifact without blocking the async worker
    pub async fn release(mut self) {
        self.released = true;
        let path = self.path.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || remove_artifact(&path)).await {
            warn!(path = %self.path.display(), error = %e, "Cleanup task failed; removing inline");
            remove_artifact(&self.path);
        }
    }
}

impl Drop for AudioArtifact {
    fn drop(&mut self) {
        if !self.released {
            remove_artifact(&self.path);
        }
    }
}

/// Delete an artifact and its sibling intermediates (idempotent)
pub fn remove_artifact(path: &Path) {
    remove_quietly(path);

    let (Some(dir), Some(stem)) = (path.parent(), path.file_stem().and_then(|s| s.to_str())) else {
        return;
    };
    let prefix = format!("{}.", stem);

    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let is_leftover = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(&prefix));
        if is_leftover {
            remove_quietly(&entry.path());
        }
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "Removed temporary audio"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temporary audio"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_artifact_drop_removes_file_and_leftovers() {
        let temp_dir = TempDir::new().unwrap();
        let wav = temp_dir.path().join("Song-0123abcd.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        std::fs::write(temp_dir.path().join("Song-0123abcd.webm.part"), b"x").unwrap();
        std::fs::write(temp_dir.path().join("Other-ffffffff.wav"), b"x").unwrap();

        drop(AudioArtifact::claim(wav.clone()));

        assert!(!wav.exists());
        let remaining: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining, vec!["Other-ffffffff.wav".to_string()]);
    }

    #[tokio::test]
    async fn test_release_removes_artifact_on_blocking_pool() {
        let temp_dir = TempDir::new().unwrap();
        let wav = temp_dir.path().join("Song-0123abcd-4.wav");
        std::fs::write(&wav, b"RIFF").unwrap();
        std::fs::write(temp_dir.path().join("Song-0123abcd-4.f251.webm"), b"x").unwrap();
        std::fs::write(temp_dir.path().join("Song-0123abcd-41.wav"), b"x").unwrap();

        AudioArtifact::claim(wav.clone()).release().await;

        assert!(!wav.exists());
        let remaining: Vec<String> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(remaining, vec!["Song-0123abcd-41.wav".to_string()]);
    }

    #[test]
    fn test_removing_missing_artifact_is_silent() {
        let temp_dir = TempDir::new().unwrap();
        let wav = temp_dir.path().join("never-created.wav");
        remove_artifact(&wav);
        remove_artifact(&wav);
        assert!(!wav.exists());
    }

    #[tokio::test]
    async fn test_guard_reports_cancellation_first() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let guard = Guard {
            cancel: &cancel,
            deadline: None,
        };
        assert_eq!(guard.run(async { 7 }).await, Err(Interrupt::Cancelled));
    }

    #[tokio::test]
    async fn test_guard_times_out_slow_stage() {
        let cancel = CancellationToken::new();
        let guard = Guard {
            cancel: &cancel,
            deadline: Some(Instant::now() + Duration::from_millis(20)),
        };
        let slow = tokio::time::sleep(Duration::from_secs(5));
        assert_eq!(guard.run(slow).await, Err(Interrupt::TimedOut));

        let unbounded = Guard {
            cancel: &cancel,
            deadline: None,
        };
        assert_eq!(unbounded.run(async { "done" }).await, Ok("done"));
    }
}
