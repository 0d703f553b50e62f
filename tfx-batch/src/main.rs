//! tfx-batch - Batch audio feature extraction
//!
//! Reads media references from a directory of JSON files, extracts tempo,
//! MFCC, spectral contrast, and chroma features for every admitted
//! reference, enriches them from MusicBrainz, and writes one table plus a
//! timestamped error log.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tfx_batch::{BatchPipeline, ConfigOverrides, RunConfig};
use tfx_common::config::resolve_toml_config;
use tfx_common::logging::init_tracing;

/// Command-line arguments for tfx-batch
///
/// Every option falls back to the matching `TFX_*` variable, then the TOML
/// config file, then the built-in default.
#[derive(Parser, Debug)]
#[command(name = "tfx-batch")]
#[command(about = "Batch audio feature extraction for media references")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/tfx/config.toml)
    #[arg(short, long, env = "TFX_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of *.json reference files
    #[arg(short, long, env = "TFX_INPUT_DIR")]
    input_dir: Option<PathBuf>,

    /// Output table (.parquet or .csv)
    #[arg(short, long, env = "TFX_OUTPUT")]
    output: Option<PathBuf>,

    /// Append-only error log
    #[arg(long, env = "TFX_ERROR_LOG")]
    error_log: Option<PathBuf>,

    /// Scratch directory for downloaded audio
    #[arg(long, env = "TFX_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Concurrent reference runs
    #[arg(short = 'j', long, env = "TFX_MAX_WORKERS")]
    max_workers: Option<usize>,

    /// Longest admitted media duration in seconds
    #[arg(long, env = "TFX_DURATION_CEILING_SECS")]
    duration_ceiling_secs: Option<u64>,

    /// Admit media of any duration (`--allow-long-media false` turns it off)
    #[arg(
        long,
        env = "TFX_ALLOW_LONG_MEDIA",
        num_args = 0..=1,
        default_missing_value = "true"
    )]
    allow_long_media: Option<bool>,

    /// What to do when the duration cannot be probed: admit | reject
    #[arg(long, env = "TFX_UNKNOWN_DURATION_POLICY")]
    unknown_duration_policy: Option<String>,

    /// Cookies file passed to yt-dlp
    #[arg(long, env = "TFX_COOKIES")]
    cookies: Option<PathBuf>,

    /// yt-dlp executable
    #[arg(long, env = "TFX_YTDLP_PATH")]
    ytdlp_path: Option<String>,

    /// ffmpeg location passed to yt-dlp
    #[arg(long, env = "TFX_FFMPEG_LOCATION")]
    ffmpeg_location: Option<PathBuf>,

    /// Per-reference timeout in seconds
    #[arg(long, env = "TFX_ITEM_TIMEOUT_SECS")]
    item_timeout_secs: Option<u64>,

    /// MusicBrainz web service root
    #[arg(long, env = "TFX_MUSICBRAINZ_URL")]
    musicbrainz_url: Option<String>,

    /// User-Agent sent to MusicBrainz (include contact details)
    #[arg(long, env = "TFX_USER_AGENT")]
    user_agent: Option<String>,

    /// Catalog match selection: first_match | highest_score
    #[arg(long, env = "TFX_MATCH_POLICY")]
    match_policy: Option<String>,

    /// Log filter when RUST_LOG is unset (e.g. info, tfx_batch=debug)
    #[arg(long, env = "TFX_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            input_dir: self.input_dir.clone(),
            max_workers: self.max_workers,
            duration_ceiling_secs: self.duration_ceiling_secs,
            allow_long_media: self.allow_long_media,
            unknown_duration_policy: self.unknown_duration_policy.clone(),
            cookies_path: self.cookies.clone(),
            temp_dir: self.temp_dir.clone(),
            output_path: self.output.clone(),
            error_log_path: self.error_log.clone(),
            ytdlp_path: self.ytdlp_path.clone(),
            ffmpeg_location: self.ffmpeg_location.clone(),
            item_timeout_secs: self.item_timeout_secs,
            musicbrainz_url: self.musicbrainz_url.clone(),
            user_agent: self.user_agent.clone(),
            match_policy: self.match_policy.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut toml_config =
        resolve_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    if let Some(level) = &args.log_level {
        toml_config.logging.level = level.clone();
    }
    init_tracing(&toml_config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting tfx-batch v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = RunConfig::resolve(&args.overrides(), &toml_config)
        .context("Invalid configuration")?;
    info!(
        input_dir = %config.input_dir.display(),
        output = %config.output_path.display(),
        error_log = %config.error_log_path.display(),
        max_workers = config.max_workers,
        duration_ceiling_secs = config.duration_ceiling_secs,
        allow_long_media = config.allow_long_media,
        "Configuration resolved"
    );

    let pipeline = BatchPipeline::from_config(config).context("Failed to initialize backends")?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let summary = pipeline.run(cancel).await.context("Batch run failed")?;

    info!(
        total = summary.total,
        completed = summary.completed,
        rejected = summary.rejected,
        failed = summary.failed,
        cancelled = summary.cancelled,
        rows_written = summary.rows_written,
        output = %summary.output_path.display(),
        "Run summary"
    );

    Ok(())
}

/// Cancel the batch on the first Ctrl+C
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            warn!("Received Ctrl+C, cancelling in-flight references");
            cancel.cancel();
        }
        Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
    }
}
