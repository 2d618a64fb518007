use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::{
    core::{source::HeadSource, types::BlockNumber},
    pipeline::queue::{BlockQueueSender, QueueClosed},
    utils::metrics::PipelineMetrics,
};

/// Heights discovered between the cursor and a new head: `(cursor, head]`.
///
/// Returns `None` when the head did not move past the cursor.
pub fn pending_range(cursor: BlockNumber, head: BlockNumber) -> Option<RangeInclusive<BlockNumber>> {
    (head > cursor).then(|| (cursor + 1)..=head)
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Cursor seed; `None` seeds from the first observed head instead.
    pub start_height: Option<BlockNumber>,
    pub poll_interval: Duration,
    pub error_delay: Duration,
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Handed this many new heights to the queue.
    Enqueued(u64),
    /// Head unchanged, stale, or used to seed the cursor.
    Idle,
    /// The head query failed; nothing changed.
    Failed,
}

/// Polls the node head and feeds every new height into the block queue.
///
/// The cursor is owned here and only moves forward, one height per
/// successful hand-off.
pub struct ChainHeadTracker<H: HeadSource> {
    source: Arc<H>,
    config: TrackerConfig,
    cursor: Option<BlockNumber>,
    metrics: Arc<dyn PipelineMetrics>,
}

impl<H: HeadSource> ChainHeadTracker<H> {
    pub fn new(source: Arc<H>, config: TrackerConfig, metrics: Arc<dyn PipelineMetrics>) -> Self {
        Self {
            source,
            cursor: config.start_height,
            config,
            metrics,
        }
    }

    /// Last height handed to the queue (or the seed).
    pub fn cursor(&self) -> Option<BlockNumber> {
        self.cursor
    }

    pub async fn poll_once(&mut self, queue: &BlockQueueSender) -> Result<PollOutcome, QueueClosed> {
        let head = match self.source.latest_block_number().await {
            Ok(head) => head,
            Err(e) => {
                error!(error = %e, kind = e.kind().as_str(), "❌ Failed to poll chain head");
                self.metrics.record_head_poll_failure(e.kind());
                return Ok(PollOutcome::Failed);
            }
        };
        self.metrics.record_head_height(head);

        let Some(cursor) = self.cursor else {
            info!(head, "📍 Cursor seeded from current chain head");
            self.cursor = Some(head);
            self.metrics.record_blocks_enqueued(0, head);
            return Ok(PollOutcome::Idle);
        };

        let Some(range) = pending_range(cursor, head) else {
            if head < cursor {
                debug!(head, cursor, "Reported head is behind cursor, ignoring");
            }
            return Ok(PollOutcome::Idle);
        };

        debug!("🆕 New head {} (cursor {}), enqueueing {:?}", head, cursor, range);
        let mut enqueued = 0;
        for block_number in range {
            queue.push(block_number).await?;
            self.cursor = Some(block_number);
            enqueued += 1;
        }
        self.metrics.record_blocks_enqueued(enqueued, head);

        Ok(PollOutcome::Enqueued(enqueued))
    }

    /// Poll until shutdown, then drop the queue sender so the enricher can drain.
    ///
    /// Returns the final cursor.
    pub async fn run(
        mut self,
        queue: BlockQueueSender,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Option<BlockNumber> {
        info!(cursor = ?self.cursor, "🔄 Chain head tracker started");

        loop {
            let delay = tokio::select! {
                _ = shutdown.recv() => {
                    info!("🛑 Shutdown signal received, stopping tracker...");
                    break;
                }
                outcome = self.poll_once(&queue) => match outcome {
                    Ok(PollOutcome::Failed) => self.config.error_delay,
                    Ok(_) => self.config.poll_interval,
                    Err(e) => {
                        warn!("⚠️ {}, stopping tracker", e);
                        break;
                    }
                },
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("🛑 Shutdown signal received, stopping tracker...");
                    break;
                }
                _ = sleep(delay) => {}
            }
        }

        drop(queue);
        info!(cursor = ?self.cursor, "👋 Tracker stopped");
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RpcError;
    use crate::pipeline::queue::block_queue;
    use crate::utils::metrics::NoopPipelineMetrics;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted head reports, repeating the last one when exhausted.
    struct ScriptedHead {
        script: Mutex<VecDeque<Result<u64, RpcError>>>,
        last: Mutex<u64>,
    }

    impl ScriptedHead {
        fn new(script: Vec<Result<u64, RpcError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl HeadSource for ScriptedHead {
        async fn latest_block_number(&self) -> Result<u64, RpcError> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Ok(head)) => {
                    *self.last.lock().unwrap() = head;
                    Ok(head)
                }
                Some(Err(e)) => Err(e),
                None => Ok(*self.last.lock().unwrap()),
            }
        }
    }

    fn tracker(script: Vec<Result<u64, RpcError>>, start: Option<u64>) -> ChainHeadTracker<ScriptedHead> {
        ChainHeadTracker::new(
            Arc::new(ScriptedHead::new(script)),
            TrackerConfig {
                start_height: start,
                poll_interval: Duration::from_secs(1),
                error_delay: Duration::from_secs(1),
            },
            Arc::new(NoopPipelineMetrics::new()),
        )
    }

    fn transport_error() -> RpcError {
        RpcError::Transport {
            method: "eth_blockNumber".to_string(),
            message: "connection refused".to_string(),
        }
    }

    async fn drain(rx: &mut crate::pipeline::queue::BlockQueueReceiver) -> Vec<u64> {
        let mut out = Vec::new();
        while !rx.is_empty() {
            out.extend(rx.pop().await);
        }
        out
    }

    #[test]
    fn pending_range_is_half_open() {
        assert_eq!(pending_range(10, 13), Some(11..=13));
        assert_eq!(pending_range(10, 11), Some(11..=11));
        assert_eq!(pending_range(10, 10), None);
        assert_eq!(pending_range(10, 4), None);
        assert_eq!(pending_range(u64::MAX, u64::MAX), None);
    }

    #[tokio::test]
    async fn enqueues_each_new_height_once_in_order() {
        let mut tracker = tracker(vec![Ok(103), Ok(103), Ok(105), Ok(109)], Some(100));
        let (tx, mut rx) = block_queue(64);

        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Enqueued(3)));
        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Idle));
        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Enqueued(2)));
        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Enqueued(4)));

        assert_eq!(drain(&mut rx).await, (101..=109).collect::<Vec<_>>());
        assert_eq!(tracker.cursor(), Some(109));
    }

    #[tokio::test]
    async fn stale_head_enqueues_nothing() {
        let mut tracker = tracker(vec![Ok(105), Ok(102), Ok(105), Ok(106)], Some(100));
        let (tx, mut rx) = block_queue(64);

        tracker.poll_once(&tx).await.unwrap();
        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Idle));
        assert_eq!(tracker.cursor(), Some(105));
        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Idle));
        tracker.poll_once(&tx).await.unwrap();

        assert_eq!(drain(&mut rx).await, vec![101, 102, 103, 104, 105, 106]);
    }

    #[tokio::test]
    async fn poll_failure_keeps_cursor() {
        let mut tracker = tracker(vec![Err(transport_error()), Ok(102)], Some(100));
        let (tx, mut rx) = block_queue(8);

        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Failed));
        assert_eq!(tracker.cursor(), Some(100));
        assert!(rx.is_empty());

        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Enqueued(2)));
        assert_eq!(drain(&mut rx).await, vec![101, 102]);
    }

    #[tokio::test]
    async fn unset_start_height_seeds_from_head() {
        let mut tracker = tracker(vec![Ok(500), Ok(502)], None);
        let (tx, mut rx) = block_queue(8);

        assert_eq!(tracker.cursor(), None);
        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Idle));
        assert_eq!(tracker.cursor(), Some(500));
        assert!(rx.is_empty());

        tracker.poll_once(&tx).await.unwrap();
        assert_eq!(drain(&mut rx).await, vec![501, 502]);
    }

    #[tokio::test]
    async fn zero_start_height_starts_after_genesis() {
        let mut tracker = tracker(vec![Ok(3)], Some(0));
        let (tx, mut rx) = block_queue(8);

        assert_eq!(tracker.cursor(), Some(0));
        assert_eq!(tracker.poll_once(&tx).await, Ok(PollOutcome::Enqueued(3)));
        assert_eq!(drain(&mut rx).await, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn closed_queue_stops_without_advancing() {
        let mut tracker = tracker(vec![Ok(103)], Some(100));
        let (tx, rx) = block_queue(8);
        drop(rx);

        assert_eq!(tracker.poll_once(&tx).await, Err(QueueClosed(101)));
        assert_eq!(tracker.cursor(), Some(100));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown_while_blocked_on_full_queue() {
        let tracker = tracker(vec![Ok(110)], Some(100));
        let (tx, mut rx) = block_queue(2);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(tracker.run(tx, shutdown_rx));
        sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();

        let cursor = handle.await.unwrap();
        // Only the two heights that fit in the queue were handed off
        assert_eq!(cursor, Some(102));
        assert_eq!(rx.pop().await, Some(101));
        assert_eq!(rx.pop().await, Some(102));
        assert_eq!(rx.pop().await, None);
    }
}
