//! Batch workflow
//!
//! - [`reference_processor`]: per-reference state machine
//!   (probe → admit → acquire → extract → enrich → assemble)
//! - [`worker_pool`]: bounded concurrent driver with ordered results
//! - [`pipeline`]: one complete run from input directory to output table

pub mod pipeline;
pub mod reference_processor;
pub mod worker_pool;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::RunConfig;
use crate::features::{FeatureExtractor, SpectralFeatureExtractor};
use crate::services::error_sink::ErrorSink;
use crate::services::info_prober::InfoProber;
use crate::services::media_fetcher::MediaAcquirer;
use crate::services::metadata_enricher::MetadataEnricher;
use crate::services::musicbrainz_client::{CatalogError, CatalogLookup, MusicBrainzClient};
use crate::services::ytdlp::YtDlp;
use crate::types::FeatureRow;

pub use pipeline::BatchPipeline;
pub use reference_processor::{process_reference, run_reference};
pub use worker_pool::run_pool;

/// Stage in which a reference run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Probing,
    Acquiring,
    Extracting,
    Enriching,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Probing => "probing",
            Stage::Acquiring => "acquiring",
            Stage::Extracting => "extracting",
            Stage::Enriching => "enriching",
        };
        f.write_str(name)
    }
}

/// Terminal state of one reference run
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceOutcome {
    Completed(FeatureRow),
    /// Filtered out by the admission gate
    Rejected,
    Failed { stage: Stage },
    Cancelled,
}

impl ReferenceOutcome {
    pub fn into_row(self) -> Option<FeatureRow> {
        match self {
            ReferenceOutcome::Completed(row) => Some(row),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ReferenceOutcome::Completed(_))
    }
}

/// External backends used by every reference run
#[derive(Clone)]
pub struct Backends {
    pub prober: Arc<dyn InfoProber>,
    pub acquirer: Arc<dyn MediaAcquirer>,
    pub extractor: Arc<dyn FeatureExtractor>,
    pub catalog: Arc<dyn CatalogLookup>,
}

impl Backends {
    /// yt-dlp for probing and acquisition, native DSP extraction, MusicBrainz catalog
    pub fn from_config(config: &RunConfig) -> Result<Self, CatalogError> {
        let ytdlp = Arc::new(YtDlp::from_config(config));
        let catalog = Arc::new(MusicBrainzClient::new(&config.catalog)?);

        Ok(Self {
            prober: ytdlp.clone(),
            acquirer: ytdlp,
            extractor: Arc::new(SpectralFeatureExtractor::default()),
            catalog,
        })
    }
}

/// Everything a reference run needs, shared read-only across runs
///
/// The error sink is the only member with side effects visible to other runs.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<RunConfig>,
    pub backends: Backends,
    pub enricher: MetadataEnricher,
    pub sink: ErrorSink,
    pub cancel: CancellationToken,
}

impl PipelineContext {
    pub fn new(
        config: Arc<RunConfig>,
        backends: Backends,
        sink: ErrorSink,
        cancel: CancellationToken,
    ) -> Self {
        let enricher = MetadataEnricher::new(backends.catalog.clone(), config.catalog.match_policy);
        Self {
            config,
            backends,
            enricher,
            sink,
            cancel,
        }
    }
}

/// Outcome counts of one batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub rejected: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub rows_written: usize,
    pub output_path: PathBuf,
}

impl RunSummary {
    /// Tally outcomes (rows and output path are filled in after writing)
    pub fn tally(outcomes: &[ReferenceOutcome]) -> Self {
        let mut summary = RunSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                ReferenceOutcome::Completed(_) => summary.completed += 1,
                ReferenceOutcome::Rejected => summary.rejected += 1,
                ReferenceOutcome::Failed { .. } => summary.failed += 1,
                ReferenceOutcome::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tally_counts_each_outcome() {
        let outcomes = vec![
            ReferenceOutcome::Completed(FeatureRow::new()),
            ReferenceOutcome::Rejected,
            ReferenceOutcome::Failed {
                stage: Stage::Acquiring,
            },
            ReferenceOutcome::Failed {
                stage: Stage::Extracting,
            },
            ReferenceOutcome::Cancelled,
        ];

        let summary = RunSummary::tally(&outcomes);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.rows_written, 0);
    }

    #[test]
    fn test_into_row_only_for_completed() {
        assert!(ReferenceOutcome::Completed(FeatureRow::new())
            .into_row()
            .is_some());
        assert!(ReferenceOutcome::Rejected.into_row().is_none());
        assert!(ReferenceOutcome::Cancelled.into_row().is_none());
        assert_eq!(Stage::Extracting.to_string(), "extracting");
    }
}
