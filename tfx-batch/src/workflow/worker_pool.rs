//! Bounded concurrent driver for reference runs
//!
//! Up to `max_workers` runs are in flight at once and a free slot is refilled
//! as soon as any run finishes. Results come back in input order
//! (`result[i]` belongs to `references[i]`) regardless of the order in which
//! runs finish, and only after every run has finished.

use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

use super::reference_processor::run_reference;
use super::{PipelineContext, ReferenceOutcome};
use crate::types::{FeatureRow, MediaReference};

/// Completed runs between progress log events
const PROGRESS_INTERVAL: usize = 10;

/// Run every reference and collect outcomes in input order
pub async fn run_pool(references: &[MediaReference], ctx: &PipelineContext) -> Vec<ReferenceOutcome> {
    let total = references.len();
    let workers = ctx.config.max_workers.max(1);
    let finished = AtomicUsize::new(0);

    info!(total, workers, "Processing references");

    let mut indexed: Vec<(usize, ReferenceOutcome)> = stream::iter(references.iter().enumerate())
        .map(|(index, reference)| {
            let finished = &finished;
            async move {
                let outcome = run_reference(index, reference, ctx).await;
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                if done % PROGRESS_INTERVAL == 0 || done == total {
                    info!(done, total, "Progress");
                }
                (index, outcome)
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    indexed.sort_unstable_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, outcome)| outcome).collect()
}

/// Row-or-nothing view of [`run_pool`]
pub async fn process_references(
    references: &[MediaReference],
    ctx: &PipelineContext,
) -> Vec<Option<FeatureRow>> {
    run_pool(references, ctx)
        .await
        .into_iter()
        .map(ReferenceOutcome::into_row)
        .collect()
}
