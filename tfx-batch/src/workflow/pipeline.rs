//! One batch run: input directory → ordered outcomes → output table
//!
//! Per-reference failures stay inside the worker pool. The only errors that
//! end a run early are temp storage and output serialization failures; those
//! are also recorded in the error log as `Pipeline failed: <cause>`.

use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::worker_pool::run_pool;
use super::{Backends, PipelineContext, ReferenceOutcome, RunSummary};
use crate::config::RunConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::services::error_sink::ErrorSink;
use crate::services::reference_loader::load_references;
use crate::services::table_writer::write_table;
use crate::types::FeatureRow;

/// Batch pipeline bound to one configuration and backend set
pub struct BatchPipeline {
    config: Arc<RunConfig>,
    backends: Backends,
}

impl BatchPipeline {
    pub fn new(config: RunConfig, backends: Backends) -> Self {
        Self {
            config: Arc::new(config),
            backends,
        }
    }

    /// Production backends (yt-dlp, native DSP, MusicBrainz)
    pub fn from_config(config: RunConfig) -> PipelineResult<Self> {
        let backends = Backends::from_config(&config)
            .map_err(|e| tfx_common::Error::Config(e.to_string()))?;
        Ok(Self::new(config, backends))
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Execute the whole batch
    ///
    /// Cancelling `cancel` stops in-flight references; rows completed so far
    /// are still written.
    pub async fn run(&self, cancel: CancellationToken) -> PipelineResult<RunSummary> {
        let temp_dir = &self.config.temp_dir;
        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|source| PipelineError::TempDir {
                path: temp_dir.clone(),
                source,
            })?;

        let sink = ErrorSink::open(self.config.error_log_path.clone());
        let result = self.run_batch(&sink, cancel).await;

        if let Err(e) = &result {
            error!(error = %e, "Batch run failed");
            sink.record(format!("Pipeline failed: {}", e));
        }

        remove_dir_if_empty(temp_dir).await;
        sink.close().await;
        result
    }

    async fn run_batch(&self, sink: &ErrorSink, cancel: CancellationToken) -> PipelineResult<RunSummary> {
        let input_dir = self.config.input_dir.clone();
        let loader_sink = sink.clone();
        let references = tokio::task::spawn_blocking(move || load_references(&input_dir, &loader_sink))
            .await
            .map_err(|e| PipelineError::Join(e.to_string()))?;

        let ctx = PipelineContext::new(
            self.config.clone(),
            self.backends.clone(),
            sink.clone(),
            cancel,
        );
        let outcomes = run_pool(&references, &ctx).await;

        let mut summary = RunSummary::tally(&outcomes);
        let rows: Vec<FeatureRow> = outcomes
            .into_iter()
            .filter_map(ReferenceOutcome::into_row)
            .collect();

        let output_path = self.config.output_path.clone();
        let contrast_bands = self.backends.extractor.contrast_bands();
        summary.rows_written =
            tokio::task::spawn_blocking(move || write_table(&output_path, &rows, contrast_bands))
                .await
                .map_err(|e| PipelineError::Join(e.to_string()))??;
        summary.output_path = self.config.output_path.clone();

        info!(
            total = summary.total,
            completed = summary.completed,
            rejected = summary.rejected,
            failed = summary.failed,
            cancelled = summary.cancelled,
            errors_logged = sink.recorded_count(),
            "Batch complete"
        );

        Ok(summary)
    }
}

/// Best-effort removal of the temp directory once nothing is left in it
async fn remove_dir_if_empty(dir: &Path) {
    match tokio::fs::remove_dir(dir).await {
        Ok(()) => debug!(path = %dir.display(), "Removed temp directory"),
        Err(e) => debug!(path = %dir.display(), error = %e, "Temp directory kept"),
    }
}
