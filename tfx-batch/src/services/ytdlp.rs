//! yt-dlp command-line backend
//!
//! Implements both [`InfoProber`] (`--dump-single-json --skip-download`) and
//! [`MediaAcquirer`] (`-x --audio-format wav`). Children are spawned with
//! `kill_on_drop`, so a cancelled or timed-out reference also stops its
//! backend process.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

use crate::config::RunConfig;
use crate::services::info_prober::{InfoProber, ProbeError, RawMediaInfo};
use crate::services::media_fetcher::{AcquisitionError, MediaAcquirer};
use crate::types::MediaReference;

/// Longest stderr excerpt carried in an error
const STDERR_TAIL_CHARS: usize = 400;

/// Subset of yt-dlp's info JSON
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
}

/// yt-dlp invocation settings
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    cookies_path: Option<PathBuf>,
    ffmpeg_location: Option<PathBuf>,
}

impl YtDlp {
    pub fn new(
        binary: impl Into<String>,
        cookies_path: Option<PathBuf>,
        ffmpeg_location: Option<PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            cookies_path,
            ffmpeg_location,
        }
    }

    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(
            config.ytdlp_path.clone(),
            config.cookies_path.clone(),
            config.ffmpeg_location.clone(),
        )
    }

    /// Arguments for a metadata-only probe
    fn probe_args(&self, reference: &MediaReference) -> Vec<String> {
        let mut args: Vec<String> = [
            "--dump-single-json",
            "--skip-download",
            "--no-playlist",
            "--no-warnings",
            "--quiet",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push("--".to_string());
        args.push(reference.as_str().to_string());
        args
    }

    /// Arguments for fetching and transcoding to `destination`
    fn acquire_args(&self, reference: &MediaReference, destination: &Path) -> Vec<String> {
        let mut args: Vec<String> = [
            "-f",
            "bestaudio/best",
            "-x",
            "--audio-format",
            "wav",
            "--no-playlist",
            "--no-progress",
            "--no-warnings",
            "--quiet",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        args.push("-o".to_string());
        args.push(output_template(destination));

        if let Some(cookies) = &self.cookies_path {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.display().to_string());
        }

        args.push("--".to_string());
        args.push(reference.as_str().to_string());
        args
    }

    async fn run(&self, args: &[String]) -> std::io::Result<Output> {
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
    }
}

#[async_trait]
impl InfoProber for YtDlp {
    async fn probe(&self, reference: &MediaReference) -> Result<RawMediaInfo, ProbeError> {
        tracing::debug!(reference = %reference, "Probing with yt-dlp");

        let output = self
            .run(&self.probe_args(reference))
            .await
            .map_err(ProbeError::Spawn)?;

        if !output.status.success() {
            return Err(ProbeError::BackendFailed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        let info: YtDlpInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProbeError::Parse(e.to_string()))?;

        Ok(RawMediaInfo {
            title: info.title,
            duration_seconds: info.duration,
        })
    }
}

#[async_trait]
impl MediaAcquirer for YtDlp {
    async fn acquire(
        &self,
        reference: &MediaReference,
        destination: &Path,
    ) -> Result<(), AcquisitionError> {
        tracing::debug!(
            reference = %reference,
            destination = %destination.display(),
            "Acquiring audio with yt-dlp"
        );

        let output = self
            .run(&self.acquire_args(reference, destination))
            .await
            .map_err(|source| AcquisitionError::Spawn {
                reference: reference.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(AcquisitionError::BackendFailed {
                reference: reference.clone(),
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        if !tokio::fs::try_exists(destination).await.unwrap_or(false) {
            return Err(AcquisitionError::MissingOutput {
                reference: reference.clone(),
                path: destination.to_path_buf(),
            });
        }

        Ok(())
    }
}

/// yt-dlp output template writing to `destination` after extraction
///
/// The extension is left to yt-dlp (`%(ext)s`), which resolves to `wav`
/// once audio extraction finishes. Literal `%` is escaped.
fn output_template(destination: &Path) -> String {
    let stem_path = destination.with_extension("");
    format!("{}.%(ext)s", stem_path.display().to_string().replace('%', "%%"))
}

/// Last line-trimmed part of a stderr capture
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(STDERR_TAIL_CHARS);
    text.chars()
        .skip(skip)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
