use std::time::Duration;

use crate::core::{error::FetchErrorKind, types::SkipReason};

/// Abstraction over pipeline runtime metrics, allowing a no-op implementation when disabled.
pub trait PipelineMetrics: Send + Sync {
    fn record_head_height(&self, head: u64);
    fn record_head_poll_failure(&self, kind: FetchErrorKind);
    fn record_blocks_enqueued(&self, count: u64, cursor: u64);
    fn record_not_ready_retry(&self);
    fn record_block_emitted(&self, block_number: u64, elapsed: Duration);
    fn record_block_skipped(&self, reason: SkipReason);
}

#[derive(Default)]
pub struct NoopPipelineMetrics;

impl NoopPipelineMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineMetrics for NoopPipelineMetrics {
    fn record_head_height(&self, _head: u64) {}

    fn record_head_poll_failure(&self, _kind: FetchErrorKind) {}

    fn record_blocks_enqueued(&self, _count: u64, _cursor: u64) {}

    fn record_not_ready_retry(&self) {}

    fn record_block_emitted(&self, _block_number: u64, _elapsed: Duration) {}

    fn record_block_skipped(&self, _reason: SkipReason) {}
}

pub struct PrometheusPipelineMetrics {
    chain: String,
}

impl PrometheusPipelineMetrics {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
        }
    }
}

impl PipelineMetrics for PrometheusPipelineMetrics {
    fn record_head_height(&self, head: u64) {
        let chain = self.chain.clone();
        metrics::gauge!(
            "enricher_head_height",
            head as f64,
            "chain" => chain
        );
    }

    fn record_head_poll_failure(&self, kind: FetchErrorKind) {
        let chain = self.chain.clone();
        metrics::counter!(
            "enricher_head_poll_failure_total",
            1,
            "chain" => chain,
            "kind" => kind.as_str()
        );
    }

    fn record_blocks_enqueued(&self, count: u64, cursor: u64) {
        let chain = self.chain.clone();
        if count > 0 {
            metrics::counter!(
                "enricher_blocks_enqueued_total",
                count,
                "chain" => chain.clone()
            );
        }
        metrics::gauge!(
            "enricher_cursor",
            cursor as f64,
            "chain" => chain
        );
    }

    fn record_not_ready_retry(&self) {
        let chain = self.chain.clone();
        metrics::counter!(
            "enricher_not_ready_retries_total",
            1,
            "chain" => chain
        );
    }

    fn record_block_emitted(&self, block_number: u64, elapsed: Duration) {
        let chain = self.chain.clone();
        metrics::counter!(
            "enricher_blocks_emitted_total",
            1,
            "chain" => chain.clone()
        );
        metrics::gauge!(
            "enricher_last_emitted_block",
            block_number as f64,
            "chain" => chain.clone()
        );
        metrics::histogram!(
            "enricher_block_enrich_seconds",
            elapsed.as_secs_f64(),
            "chain" => chain
        );
    }

    fn record_block_skipped(&self, reason: SkipReason) {
        let chain = self.chain.clone();
        metrics::counter!(
            "enricher_blocks_skipped_total",
            1,
            "chain" => chain,
            "reason" => reason.as_str()
        );
    }
}
