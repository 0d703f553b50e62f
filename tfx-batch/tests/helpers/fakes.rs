//! Fake backends
//!
//! In-memory stand-ins for yt-dlp and MusicBrainz so the whole pipeline can
//! run offline against synthetic audio.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use tfx_batch::config::RunConfig;
use tfx_batch::features::{ExtractionError, FeatureExtractor, SpectralFeatureExtractor};
use tfx_batch::services::info_prober::{InfoProber, ProbeError, RawMediaInfo};
use tfx_batch::services::media_fetcher::{AcquisitionError, MediaAcquirer};
use tfx_batch::services::musicbrainz_client::{CatalogError, CatalogLookup, CatalogMatch};
use tfx_batch::types::{FeatureVector, MediaReference};
use tfx_batch::workflow::Backends;

use super::audio_generator::{generate_test_wav, AudioConfig};

/// Prober answering from a fixed table; unlisted references fail
#[derive(Default)]
pub struct FakeProber {
    entries: HashMap<String, RawMediaInfo>,
}

impl FakeProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: &str, title: &str, duration_seconds: f64) -> Self {
        self.entries.insert(
            reference.to_string(),
            RawMediaInfo {
                title: Some(title.to_string()),
                duration_seconds: Some(duration_seconds),
            },
        );
        self
    }
}

#[async_trait]
impl InfoProber for FakeProber {
    async fn probe(&self, reference: &MediaReference) -> Result<RawMediaInfo, ProbeError> {
        self.entries
            .get(reference.as_str())
            .cloned()
            .ok_or_else(|| ProbeError::BackendFailed {
                status: "exit status: 1".to_string(),
                stderr: format!("ERROR: Unsupported URL: {}", reference),
            })
    }
}

/// What the fake acquirer does for one reference
#[derive(Debug, Clone)]
pub enum AcquireBehavior {
    /// Write a sine tone of this many seconds
    Tone { seconds: f64, delay_ms: u64 },
    /// Write a sine tone, then keep the run waiting before reporting success
    ToneThenLinger { seconds: f64, linger_ms: u64 },
    /// Write bytes that are not audio, then report success
    Garbage,
    /// Leave a partial file behind, then fail
    PartialThenFail,
    /// Never finish
    Hang,
}

/// One `acquire` call as seen by the fake
#[derive(Debug, Clone)]
pub struct AcquireCall {
    pub reference: String,
    pub destination: PathBuf,
    pub started: Instant,
}

/// Acquirer writing synthetic WAVs to the requested destination
///
/// Each reference has a sequence of behaviors; the n-th call for a reference
/// uses the n-th entry, and the last entry repeats.
pub struct FakeAcquirer {
    behaviors: HashMap<String, Vec<AcquireBehavior>>,
    default: AcquireBehavior,
    calls: Mutex<Vec<AcquireCall>>,
}

impl Default for FakeAcquirer {
    fn default() -> Self {
        Self {
            behaviors: HashMap::new(),
            default: AcquireBehavior::Tone {
                seconds: 2.0,
                delay_ms: 0,
            },
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: &str, behavior: AcquireBehavior) -> Self {
        self.behaviors.insert(reference.to_string(), vec![behavior]);
        self
    }

    /// Behaviors for successive calls with the same reference
    pub fn with_sequence(mut self, reference: &str, behaviors: Vec<AcquireBehavior>) -> Self {
        self.behaviors.insert(reference.to_string(), behaviors);
        self
    }

    /// Every call the pipeline made, in call order
    pub fn calls(&self) -> Vec<AcquireCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Every destination the pipeline asked for, in call order
    pub fn destinations(&self) -> Vec<PathBuf> {
        self.calls().into_iter().map(|c| c.destination).collect()
    }
}

#[async_trait]
impl MediaAcquirer for FakeAcquirer {
    async fn acquire(
        &self,
        reference: &MediaReference,
        destination: &Path,
    ) -> Result<(), AcquisitionError> {
        let behavior = {
            let mut calls = self.calls.lock().unwrap();
            let previous = calls
                .iter()
                .filter(|c| c.reference == reference.as_str())
                .count();
            calls.push(AcquireCall {
                reference: reference.to_string(),
                destination: destination.to_path_buf(),
                started: Instant::now(),
            });
            self.behaviors
                .get(reference.as_str())
                .and_then(|seq| seq.get(previous).or_else(|| seq.last()))
                .cloned()
                .unwrap_or_else(|| self.default.clone())
        };

        match behavior {
            AcquireBehavior::Tone { seconds, delay_ms } => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                let config = AudioConfig {
                    duration_seconds: seconds,
                    ..Default::default()
                };
                generate_test_wav(destination, &config).map_err(|e| AcquisitionError::BackendFailed {
                    reference: reference.clone(),
                    status: "fixture".to_string(),
                    stderr: e.to_string(),
                })?;
                Ok(())
            }
            AcquireBehavior::ToneThenLinger { seconds, linger_ms } => {
                let config = AudioConfig {
                    duration_seconds: seconds,
                    ..Default::default()
                };
                generate_test_wav(destination, &config).map_err(|e| AcquisitionError::BackendFailed {
                    reference: reference.clone(),
                    status: "fixture".to_string(),
                    stderr: e.to_string(),
                })?;
                tokio::time::sleep(Duration::from_millis(linger_ms)).await;
                Ok(())
            }
            AcquireBehavior::Garbage => {
                std::fs::write(destination, b"this is not a wav file").unwrap();
                Ok(())
            }
            AcquireBehavior::PartialThenFail => {
                std::fs::write(destination.with_extension("webm.part"), b"partial").unwrap();
                Err(AcquisitionError::BackendFailed {
                    reference: reference.clone(),
                    status: "exit status: 1".to_string(),
                    stderr: "ERROR: HTTP Error 403: Forbidden".to_string(),
                })
            }
            AcquireBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// Extractor returning a fixed, well-formed vector without decoding
pub struct StubExtractor {
    pub contrast_bands: usize,
    /// Contrast values actually produced (to exercise shape validation)
    pub produced_bands: usize,
}

impl Default for StubExtractor {
    fn default() -> Self {
        Self {
            contrast_bands: 7,
            produced_bands: 7,
        }
    }
}

#[async_trait]
impl FeatureExtractor for StubExtractor {
    fn contrast_bands(&self) -> usize {
        self.contrast_bands
    }

    async fn extract(&self, audio_path: &Path) -> Result<FeatureVector, ExtractionError> {
        if !audio_path.exists() {
            return Err(ExtractionError::Decode {
                path: audio_path.to_path_buf(),
                message: "missing".to_string(),
            });
        }
        Ok(FeatureVector {
            tempo_bpm: 120.0,
            mfcc: vec![1.0; 13],
            spectral_contrast: vec![2.0; self.produced_bands],
            chroma_stft: vec![0.5; 12],
        })
    }
}

/// Catalog answering from a fixed table; unlisted titles have no matches
#[derive(Default)]
pub struct FakeCatalog {
    matches: HashMap<String, Vec<CatalogMatch>>,
    unavailable: bool,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog failing every request with a network error
    pub fn unavailable() -> Self {
        Self {
            matches: HashMap::new(),
            unavailable: true,
        }
    }

    pub fn with(mut self, title: &str, artist: &str, release_date: &str, genres: &[&str]) -> Self {
        self.matches.entry(title.to_string()).or_default().push(CatalogMatch {
            title: title.to_string(),
            artist: Some(artist.to_string()),
            release_date: Some(release_date.to_string()),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            score: 100,
        });
        self
    }
}

#[async_trait]
impl CatalogLookup for FakeCatalog {
    async fn search_recordings(
        &self,
        title: &str,
        _artist: Option<&str>,
    ) -> Result<Vec<CatalogMatch>, CatalogError> {
        if self.unavailable {
            return Err(CatalogError::Network("connection refused".to_string()));
        }
        Ok(self.matches.get(title).cloned().unwrap_or_default())
    }
}

/// Backends built from fakes, with the native DSP extractor
pub fn test_backends(
    prober: FakeProber,
    acquirer: Arc<FakeAcquirer>,
    catalog: FakeCatalog,
) -> Backends {
    Backends {
        prober: Arc::new(prober),
        acquirer,
        extractor: Arc::new(SpectralFeatureExtractor::default()),
        catalog: Arc::new(catalog),
    }
}

/// Run configuration rooted in a scratch directory
pub fn test_config(root: &Path, output_file: &str) -> RunConfig {
    RunConfig {
        input_dir: root.join("data"),
        temp_dir: root.join("temp_audio"),
        output_path: root.join(output_file),
        error_log_path: root.join("error_log.txt"),
        max_workers: 4,
        ..RunConfig::default()
    }
}

/// Write a JSON reference file under `<root>/data`
pub fn write_reference_file(root: &Path, name: &str, json: &str) {
    let dir = root.join("data");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), json).unwrap();
}
