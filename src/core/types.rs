use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::error::{EnrichError, FetchError, FetchErrorKind};
use crate::pipeline::aggregator::BlockMetrics;

/// Height of a block; the unit of work handed from tracker to enricher.
pub type BlockNumber = u64;

/// Result of one call to a source that may not have indexed a block yet.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T, E = FetchError> {
    Success(T),
    /// Upstream has not processed this block yet; ask again later.
    NotReady,
    Failure(E),
}

impl<T, E> FetchOutcome<T, E> {
    pub fn is_not_ready(&self) -> bool {
        matches!(self, FetchOutcome::NotReady)
    }
}

/// Per-block enrichment state machine.
///
/// `Fetching -> {Retrying, Classifying, Skipped}`, `Retrying -> Fetching`,
/// `Classifying -> Emitted`.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentState {
    Fetching,
    Retrying,
    Classifying,
    Emitted,
    Skipped,
}

impl EnrichmentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentState::Fetching => "fetching",
            EnrichmentState::Retrying => "retrying",
            EnrichmentState::Classifying => "classifying",
            EnrichmentState::Emitted => "emitted",
            EnrichmentState::Skipped => "skipped",
        }
    }
}

/// Why a block was dropped without a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    Rpc(FetchErrorKind),
    Metadata(FetchErrorKind),
    /// The not-ready retry ceiling was reached.
    RetriesExhausted,
    /// Shutdown was requested while the block was not indexed yet.
    Shutdown,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Rpc(FetchErrorKind::Transport) => "rpc_transport",
            SkipReason::Rpc(FetchErrorKind::Decode) => "rpc_decode",
            SkipReason::Rpc(FetchErrorKind::Status) => "rpc_status",
            SkipReason::Metadata(FetchErrorKind::Transport) => "metadata_transport",
            SkipReason::Metadata(FetchErrorKind::Decode) => "metadata_decode",
            SkipReason::Metadata(FetchErrorKind::Status) => "metadata_status",
            SkipReason::RetriesExhausted => "retries_exhausted",
            SkipReason::Shutdown => "shutdown",
        }
    }
}

impl From<&EnrichError> for SkipReason {
    fn from(err: &EnrichError) -> Self {
        match err {
            EnrichError::Rpc(e) => SkipReason::Rpc(e.kind()),
            EnrichError::Metadata(e) => SkipReason::Metadata(e.kind()),
        }
    }
}

/// A transaction reduced to what the aggregator folds.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Lowercased classification tag.
    pub class: String,
    /// Value in ETH; `None` when upstream sent something unparsable.
    pub value: Option<f64>,
    /// ETH; 0 when absent or unparsable.
    pub fee: f64,
    /// ETH; 0 when absent or unparsable.
    pub tip: f64,
}

/// The finished, immutable result for one block.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BlockRecord {
    pub block_number: BlockNumber,
    pub block_hash: String,
    pub tx_count: u64,
    pub builder: String,
    pub builder_pubkey: String,
    pub proposer_pubkey: String,
    pub relay: String,
    /// ETH paid by the builder to the proposer.
    pub payment: f64,
    /// ETH received by the proposer's fee recipient.
    pub payout: f64,
    /// Total block value in ETH.
    pub block_value: f64,
    pub extra_data: String,
    /// Gwei.
    pub base_fee: f64,
    /// Gwei.
    pub priority_fee: f64,
    pub gas_used: u64,
    pub timestamp: DateTime<Utc>,
    pub metrics: BlockMetrics,
}
