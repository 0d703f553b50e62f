//! Run configuration
//!
//! One [`RunConfig`] value is resolved at startup and threaded, read-only,
//! through every component. Resolution priority per field:
//! command line → environment (`TFX_*`, both handled by clap) → TOML file →
//! compiled default.

use std::path::PathBuf;
use std::time::Duration;
use tfx_common::config::TomlConfig;
use tfx_common::{Error, Result};

use crate::services::admission::UnknownDurationPolicy;
use crate::services::metadata_enricher::MatchPolicy;
use crate::services::table_writer::TableFormat;

/// Default ceiling on probed media duration (15 minutes)
pub const DEFAULT_DURATION_CEILING_SECS: u64 = 15 * 60;

/// Default number of concurrent pipeline runs
pub const DEFAULT_MAX_WORKERS: usize = 6;

/// Largest page size accepted by the catalog search API
const MAX_RESULT_LIMIT: u32 = 100;

/// Default catalog User-Agent; operators should add contact details
pub const DEFAULT_USER_AGENT: &str = concat!("tfx-batch/", env!("CARGO_PKG_VERSION"));

/// Remote catalog client settings
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub requests_per_second: u32,
    pub match_policy: MatchPolicy,
    pub result_limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://musicbrainz.org/ws/2".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(15),
            requests_per_second: 1,
            match_policy: MatchPolicy::FirstMatch,
            result_limit: 5,
        }
    }
}

/// Process-wide batch configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Directory of `*.json` reference files
    pub input_dir: PathBuf,
    pub max_workers: usize,
    pub duration_ceiling_secs: u64,
    pub allow_long_media: bool,
    pub unknown_duration_policy: UnknownDurationPolicy,
    /// Opaque credential artifact passed to the acquisition backend
    pub cookies_path: Option<PathBuf>,
    pub temp_dir: PathBuf,
    /// `.parquet`/`.pq` or `.csv`
    pub output_path: PathBuf,
    pub error_log_path: PathBuf,
    pub ytdlp_path: String,
    pub ffmpeg_location: Option<PathBuf>,
    /// Per-reference deadline, none by default
    pub item_timeout: Option<Duration>,
    pub catalog: CatalogConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            max_workers: DEFAULT_MAX_WORKERS,
            duration_ceiling_secs: DEFAULT_DURATION_CEILING_SECS,
            allow_long_media: false,
            unknown_duration_policy: UnknownDurationPolicy::Admit,
            cookies_path: None,
            temp_dir: PathBuf::from("temp_audio"),
            output_path: PathBuf::from("output.parquet"),
            error_log_path: PathBuf::from("error_log.txt"),
            ytdlp_path: "yt-dlp".to_string(),
            ffmpeg_location: None,
            item_timeout: None,
            catalog: CatalogConfig::default(),
        }
    }
}

/// Values supplied on the command line or through `TFX_*` variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub input_dir: Option<PathBuf>,
    pub max_workers: Option<usize>,
    pub duration_ceiling_secs: Option<u64>,
    pub allow_long_media: Option<bool>,
    pub unknown_duration_policy: Option<String>,
    pub cookies_path: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub error_log_path: Option<PathBuf>,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_location: Option<PathBuf>,
    pub item_timeout_secs: Option<u64>,
    pub musicbrainz_url: Option<String>,
    pub user_agent: Option<String>,
    pub match_policy: Option<String>,
}

impl RunConfig {
    /// Merge overrides over the TOML file over defaults, then validate
    pub fn resolve(overrides: &ConfigOverrides, toml: &TomlConfig) -> Result<Self> {
        let defaults = RunConfig::default();
        let pipeline = &toml.pipeline;
        let mb = &toml.musicbrainz;

        let unknown_duration_policy = match overrides
            .unknown_duration_policy
            .as_ref()
            .or(pipeline.unknown_duration_policy.as_ref())
        {
            Some(raw) => raw.parse().map_err(Error::Config)?,
            None => defaults.unknown_duration_policy,
        };

        let match_policy = match overrides.match_policy.as_ref().or(mb.match_policy.as_ref()) {
            Some(raw) => raw.parse().map_err(Error::Config)?,
            None => defaults.catalog.match_policy,
        };

        let catalog = CatalogConfig {
            base_url: pick(
                overrides.musicbrainz_url.clone(),
                mb.base_url.clone(),
                defaults.catalog.base_url,
            ),
            user_agent: pick(
                overrides.user_agent.clone(),
                mb.user_agent.clone(),
                defaults.catalog.user_agent,
            ),
            timeout: mb
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.catalog.timeout),
            requests_per_second: mb
                .requests_per_second
                .unwrap_or(defaults.catalog.requests_per_second),
            match_policy,
            result_limit: mb.result_limit.unwrap_or(defaults.catalog.result_limit),
        };

        let config = RunConfig {
            input_dir: pick(
                overrides.input_dir.clone(),
                pipeline.input_dir.clone(),
                defaults.input_dir,
            ),
            max_workers: pick(overrides.max_workers, pipeline.max_workers, defaults.max_workers),
            duration_ceiling_secs: pick(
                overrides.duration_ceiling_secs,
                pipeline.duration_ceiling_secs,
                defaults.duration_ceiling_secs,
            ),
            allow_long_media: pick(
                overrides.allow_long_media,
                pipeline.allow_long_media,
                defaults.allow_long_media,
            ),
            unknown_duration_policy,
            cookies_path: overrides
                .cookies_path
                .clone()
                .or_else(|| pipeline.cookies_path.clone()),
            temp_dir: pick(
                overrides.temp_dir.clone(),
                pipeline.temp_dir.clone(),
                defaults.temp_dir,
            ),
            output_path: pick(
                overrides.output_path.clone(),
                pipeline.output_path.clone(),
                defaults.output_path,
            ),
            error_log_path: pick(
                overrides.error_log_path.clone(),
                pipeline.error_log_path.clone(),
                defaults.error_log_path,
            ),
            ytdlp_path: pick(
                overrides.ytdlp_path.clone(),
                pipeline.ytdlp_path.clone(),
                defaults.ytdlp_path,
            ),
            ffmpeg_location: overrides
                .ffmpeg_location
                .clone()
                .or_else(|| pipeline.ffmpeg_location.clone()),
            item_timeout: overrides
                .item_timeout_secs
                .or(pipeline.item_timeout_secs)
                .map(Duration::from_secs),
            catalog,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values no run can work with
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(Error::Config("max_workers must be at least 1".to_string()));
        }
        if self.item_timeout == Some(Duration::ZERO) {
            return Err(Error::Config(
                "item_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.catalog.requests_per_second == 0 {
            return Err(Error::Config(
                "musicbrainz.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.catalog.result_limit == 0 || self.catalog.result_limit > MAX_RESULT_LIMIT {
            return Err(Error::Config(format!(
                "musicbrainz.result_limit must be between 1 and {}",
                MAX_RESULT_LIMIT
            )));
        }
        if self.catalog.timeout.is_zero() {
            return Err(Error::Config(
                "musicbrainz.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.catalog.user_agent.trim().is_empty() {
            return Err(Error::Config("musicbrainz.user_agent must not be empty".to_string()));
        }
        if self.ytdlp_path.trim().is_empty() {
            return Err(Error::Config("ytdlp_path must not be empty".to_string()));
        }
        TableFormat::from_path(&self.output_path).map_err(|e| Error::Config(e.to_string()))?;
        Ok(())
    }
}

/// First present value in priority order
fn pick<T>(cli_or_env: Option<T>, file: Option<T>, default: T) -> T {
    cli_or_env.or(file).unwrap_or(default)
}
