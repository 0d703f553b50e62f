//! Configuration file model and discovery
//!
//! The TOML file is the third tier of configuration resolution
//! (command line → environment → TOML → compiled defaults). Every field is
//! optional so a partial file only overrides what it names.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "tfx";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Complete TOML configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Batch pipeline settings
    pub pipeline: PipelineSection,
    /// Remote catalog client settings
    pub musicbrainz: MusicBrainzSection,
    /// Operational logging settings
    pub logging: LoggingConfig,
}

/// `[pipeline]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub input_dir: Option<PathBuf>,
    pub max_workers: Option<usize>,
    pub duration_ceiling_secs: Option<u64>,
    pub allow_long_media: Option<bool>,
    /// `"admit"` or `"reject"`
    pub unknown_duration_policy: Option<String>,
    /// Opaque credential artifact handed to the acquisition backend
    pub cookies_path: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub output_path: Option<PathBuf>,
    pub error_log_path: Option<PathBuf>,
    pub ytdlp_path: Option<String>,
    pub ffmpeg_location: Option<PathBuf>,
    pub item_timeout_secs: Option<u64>,
}

/// `[musicbrainz]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicBrainzSection {
    pub base_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
    pub requests_per_second: Option<u32>,
    /// `"first_match"` or `"highest_score"`
    pub match_policy: Option<String>,
    pub result_limit: Option<u32>,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Optional log file (stderr when absent)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Platform default location of the config file
///
/// Linux: `~/.config/tfx/config.toml`, macOS: `~/Library/Application Support/tfx/config.toml`,
/// Windows: `%APPDATA%\tfx\config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Resolve and load the config file
///
/// An explicitly requested file must exist and parse. When no file is
/// requested the platform default is tried; a missing default file yields
/// the empty config (missing config SHALL NOT terminate startup).
pub fn resolve_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        info!("Loading config file {}", path.display());
        return load_toml_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            info!("Loading config file {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            info!("No config file at {}, using defaults", path.display());
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using defaults");
            Ok(TomlConfig::default())
        }
    }
}
