//! Head tracking, hand-off and per-block enrichment.
//!
//! Two tasks connected by a bounded queue: the [`tracker::ChainHeadTracker`]
//! discovers heights, the [`enricher::BlockEnricher`] turns each one into a
//! [`crate::core::types::BlockRecord`] and emits it.

pub mod aggregator;
pub mod emitter;
pub mod enricher;
pub mod queue;
pub mod tracker;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::info;

use crate::core::source::{ChainSource, HeadSource, MetadataSource};
use emitter::RecordSink;
use enricher::{BlockEnricher, StopSignal};
use queue::block_queue;
use tracker::ChainHeadTracker;

/// Run tracker and enricher until shutdown.
///
/// On shutdown the tracker stops first; the enricher then finishes every
/// height already queued, without retrying blocks that are not indexed yet,
/// and the call returns.
pub async fn run_pipeline<H, C, M, S>(
    tracker: ChainHeadTracker<H>,
    enricher: BlockEnricher<C, M, S>,
    queue_capacity: usize,
    shutdown: broadcast::Receiver<()>,
) -> Result<()>
where
    H: HeadSource + 'static,
    C: ChainSource,
    M: MetadataSource,
    S: RecordSink,
{
    let (tx, rx) = block_queue(queue_capacity);
    let stop = StopSignal::new(shutdown.resubscribe());
    let tracker_task = tokio::spawn(tracker.run(tx, shutdown));

    enricher.run(rx, stop).await;

    let cursor = tracker_task.await?;
    info!(cursor = ?cursor, "✨ Pipeline stopped");
    Ok(())
}
