//! tfx-batch library interface
//!
//! Batch audio feature extraction: media references are probed, filtered by
//! duration, acquired as WAV, reduced to a fixed-shape feature vector,
//! enriched from the MusicBrainz catalog, and written as one table.

pub mod config;
pub mod error;
pub mod features;
pub mod services;
pub mod types;
pub mod utils;
pub mod workflow;

pub use crate::config::{CatalogConfig, ConfigOverrides, RunConfig};
pub use crate::error::{PipelineError, PipelineResult};
pub use crate::workflow::{BatchPipeline, ReferenceOutcome, RunSummary};
