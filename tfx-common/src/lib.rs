//! # TFX Common Library
//!
//! Shared code for the tfx batch tools:
//! - Common error type
//! - TOML configuration file model and discovery
//! - Logging initialization
//! - Timestamp and human-readable duration formatting

pub mod config;
pub mod error;
pub mod human_time;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
