use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::{
    core::{
        error::EnrichError,
        source::{ChainSource, MetadataSource},
        table::{BlockInfo, NumericField, RpcBlock, RpcHeader},
        types::{BlockNumber, BlockRecord, EnrichmentState, FetchOutcome, SkipReason, Transaction},
    },
    pipeline::{
        aggregator::{aggregate, normalize_class},
        emitter::RecordSink,
        queue::BlockQueueReceiver,
    },
    utils::{
        metrics::PipelineMetrics,
        numeric::{parse_or_zero, wei_to_gwei},
        retry::RetryPolicy,
    },
};

/// Everything fetched for one block before classification.
#[derive(Debug, Clone)]
pub struct FetchedBlock {
    pub info: BlockInfo,
    pub header: RpcHeader,
    pub block: RpcBlock,
}

/// Final state of one block.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichOutcome {
    Emitted(BlockRecord),
    Skipped(SkipReason),
}

enum Step {
    Fetching,
    Retrying,
    Classifying(Box<FetchedBlock>),
    Skipped(SkipReason),
}

impl Step {
    fn state(&self) -> EnrichmentState {
        match self {
            Step::Fetching => EnrichmentState::Fetching,
            Step::Retrying => EnrichmentState::Retrying,
            Step::Classifying(_) => EnrichmentState::Classifying,
            Step::Skipped(_) => EnrichmentState::Skipped,
        }
    }
}

/// Shutdown as seen by the enricher.
///
/// Once it fires, a block that is not indexed yet is skipped instead of
/// retried, so the queue drains and the pipeline can exit.
pub struct StopSignal {
    rx: Option<broadcast::Receiver<()>>,
    stopped: bool,
}

impl StopSignal {
    pub fn new(rx: broadcast::Receiver<()>) -> Self {
        Self {
            rx: Some(rx),
            stopped: false,
        }
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self {
            rx: None,
            stopped: false,
        }
    }

    /// Non-blocking check; a closed channel counts as a stop.
    pub fn is_stopped(&mut self) -> bool {
        if !self.stopped {
            if let Some(rx) = self.rx.as_mut() {
                self.stopped = !matches!(rx.try_recv(), Err(TryRecvError::Empty));
            }
        }
        self.stopped
    }

    /// Resolves once shutdown is requested.
    pub async fn stopped(&mut self) {
        if self.is_stopped() {
            return;
        }
        match self.rx.as_mut() {
            Some(rx) => {
                let _ = rx.recv().await;
                self.stopped = true;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

/// Turns queued block numbers into emitted records, strictly one at a time.
pub struct BlockEnricher<C, M, S> {
    chain: Arc<C>,
    metadata: Arc<M>,
    sink: S,
    retry: RetryPolicy,
    metrics: Arc<dyn PipelineMetrics>,
}

impl<C, M, S> BlockEnricher<C, M, S>
where
    C: ChainSource,
    M: MetadataSource,
    S: RecordSink,
{
    pub fn new(
        chain: Arc<C>,
        metadata: Arc<M>,
        sink: S,
        retry: RetryPolicy,
        metrics: Arc<dyn PipelineMetrics>,
    ) -> Self {
        Self {
            chain,
            metadata,
            sink,
            retry,
            metrics,
        }
    }

    /// Process queued blocks until the queue is closed and drained.
    ///
    /// After `stop` fires, the remaining blocks are still fetched once but no
    /// longer retried.
    pub async fn run(&self, mut queue: BlockQueueReceiver, mut stop: StopSignal) {
        info!("🔄 Block enricher started");
        let mut emitted = 0u64;
        let mut skipped = 0u64;

        while let Some(block_number) = queue.pop().await {
            match self.process_block_until(block_number, &mut stop).await {
                EnrichOutcome::Emitted(_) => emitted += 1,
                EnrichOutcome::Skipped(_) => skipped += 1,
            }
        }

        info!(emitted, skipped, "👋 Block queue drained, enricher stopped");
    }

    /// Drive one block through the state machine until it is emitted or skipped.
    pub async fn process_block(&self, block_number: BlockNumber) -> EnrichOutcome {
        self.process_block_until(block_number, &mut StopSignal::never())
            .await
    }

    /// Like [`Self::process_block`], but gives up on a not-ready block once
    /// `stop` fires.
    pub async fn process_block_until(
        &self,
        block_number: BlockNumber,
        stop: &mut StopSignal,
    ) -> EnrichOutcome {
        let started = Instant::now();
        let mut retries = 0u32;
        let mut step = Step::Fetching;

        loop {
            debug!(block_number, state = step.state().as_str(), "Enrichment step");
            step = match step {
                Step::Fetching => match self.fetch(block_number).await {
                    FetchOutcome::Success(fetched) => Step::Classifying(Box::new(fetched)),
                    FetchOutcome::NotReady => Step::Retrying,
                    FetchOutcome::Failure(e) => {
                        error!(block_number, error = %e, "❌ Fetch failed, skipping block");
                        Step::Skipped(SkipReason::from(&e))
                    }
                },
                Step::Retrying => {
                    retries += 1;
                    if stop.is_stopped() {
                        warn!(block_number, "🛑 Shutdown requested, skipping block that is not indexed yet");
                        Step::Skipped(SkipReason::Shutdown)
                    } else if self.retry.allows(retries) {
                        info!(
                            block_number,
                            retry = retries,
                            "⏳ Block not indexed yet, retrying in {:?}",
                            self.retry.delay
                        );
                        self.metrics.record_not_ready_retry();
                        tokio::select! {
                            _ = stop.stopped() => {
                                warn!(block_number, "🛑 Shutdown requested while waiting to retry, skipping block");
                                Step::Skipped(SkipReason::Shutdown)
                            }
                            _ = sleep(self.retry.delay) => Step::Fetching,
                        }
                    } else {
                        warn!(
                            block_number,
                            retries = retries - 1,
                            "🚫 Block still not indexed after maximum retries, skipping"
                        );
                        Step::Skipped(SkipReason::RetriesExhausted)
                    }
                }
                Step::Classifying(fetched) => {
                    let record = build_record(block_number, *fetched);
                    self.sink.emit(&record);
                    self.metrics
                        .record_block_emitted(block_number, started.elapsed());
                    debug!(
                        block_number,
                        state = EnrichmentState::Emitted.as_str(),
                        retries,
                        "✅ Emitted after {:?} of retry delay",
                        self.retry.total_delay(retries)
                    );
                    return EnrichOutcome::Emitted(record);
                }
                Step::Skipped(reason) => {
                    self.metrics.record_block_skipped(reason);
                    return EnrichOutcome::Skipped(reason);
                }
            };
        }
    }

    /// Metadata first: a not-ready block costs no node calls.
    async fn fetch(&self, block_number: BlockNumber) -> FetchOutcome<FetchedBlock, EnrichError> {
        let info = match self.metadata.fetch_block_info(block_number).await {
            FetchOutcome::Success(info) => info,
            FetchOutcome::NotReady => return FetchOutcome::NotReady,
            FetchOutcome::Failure(e) => return FetchOutcome::Failure(e.into()),
        };

        let header = match self.chain.header_by_number(block_number).await {
            Ok(header) => header,
            Err(e) => return FetchOutcome::Failure(e.into()),
        };
        let block = match self.chain.block_by_number(block_number).await {
            Ok(block) => block,
            Err(e) => return FetchOutcome::Failure(e.into()),
        };

        FetchOutcome::Success(FetchedBlock {
            info,
            header,
            block,
        })
    }
}

fn numeric(block_number: BlockNumber, field: &str, value: Option<&NumericField>) -> Option<f64> {
    value.map(|v| parse_or_zero(block_number, field, v.parse()))
}

/// A metadata fee in gwei; `0x` quantities are wei and get converted.
fn gwei(block_number: BlockNumber, field: &str, value: Option<&NumericField>) -> Option<f64> {
    value.map(|v| {
        let parsed = parse_or_zero(block_number, field, v.parse());
        if v.is_hex() { wei_to_gwei(parsed) } else { parsed }
    })
}

/// Classification and aggregation; never fails, bad fields degrade to 0.
fn build_record(block_number: BlockNumber, fetched: FetchedBlock) -> BlockRecord {
    let FetchedBlock {
        info,
        header,
        block,
    } = fetched;

    let extra_data = match header.extra_data_text() {
        Ok(text) => text,
        Err(e) => {
            warn!(block_number, error = %e, "⚠️ extraData is not valid hex");
            info.extra_data.clone().unwrap_or_default()
        }
    };
    if block.header.extra_data.is_some() && block.header.extra_data != header.extra_data {
        warn!(block_number, "⚠️ extraData differs between header and block responses");
    }

    let header_base_fee_wei = header
        .base_fee_wei()
        .map(|r| parse_or_zero(block_number, "baseFeePerGas", r));
    let base_fee = gwei(block_number, "base_fee", info.base_fee.as_ref())
        .or_else(|| header_base_fee_wei.map(wei_to_gwei))
        .unwrap_or(0.0);

    let priority_fee = gwei(block_number, "priority_fee", info.priority_fee.as_ref())
        .unwrap_or_else(|| mean_tip_gwei(block_number, &block, header_base_fee_wei.unwrap_or(0.0)));

    let gas_used = match numeric(block_number, "gas_used", info.gas_used.as_ref()) {
        Some(gas) => gas as u64,
        None => header
            .gas_used()
            .and_then(|r| {
                r.map_err(|e| warn!(block_number, error = %e, "⚠️ gasUsed unparsable, using 0"))
                    .ok()
            })
            .unwrap_or(0),
    };

    let timestamp = header
        .timestamp_secs()
        .and_then(|r| {
            r.map_err(|e| warn!(block_number, error = %e, "⚠️ timestamp unparsable"))
                .ok()
        })
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs as i64, 0))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    if let Some(reported) = info.block_number.as_ref().and_then(|n| n.parse_count().ok()) {
        if reported != block_number {
            warn!(block_number, reported, "⚠️ Block info reports a different block number");
        }
    }

    let transactions: Vec<Transaction> = info
        .transactions
        .iter()
        .map(|tx| Transaction {
            class: normalize_class(tx.class.as_deref()),
            value: tx.value.as_ref().and_then(|v| {
                v.parse()
                    .map_err(|e| {
                        warn!(
                            block_number,
                            tx_hash = tx.hash.as_deref().unwrap_or_default(),
                            error = %e,
                            "⚠️ Transaction value unparsable"
                        )
                    })
                    .ok()
            }),
            fee: numeric(block_number, "tx_fee", tx.fee.as_ref()).unwrap_or(0.0),
            tip: numeric(block_number, "tx_tip", tx.tip.as_ref()).unwrap_or(0.0),
        })
        .collect();

    let tx_count = info
        .tx_count
        .as_ref()
        .and_then(|count| {
            count
                .parse_count()
                .map_err(|e| {
                    warn!(block_number, error = %e, "⚠️ tx_count unparsable, using node transaction count")
                })
                .ok()
        })
        .unwrap_or(block.transactions.len() as u64);
    let block_value = numeric(block_number, "block_value", info.block_value.as_ref()).unwrap_or(0.0);
    let metrics = aggregate(&transactions, tx_count, block_value);

    BlockRecord {
        block_number,
        block_hash: info.block_hash.or(header.hash).unwrap_or_default(),
        tx_count: metrics.tx_count,
        builder: info.builder.or(header.miner).unwrap_or_default(),
        builder_pubkey: info.builder_pubkey.unwrap_or_default(),
        proposer_pubkey: info.proposer_pubkey.unwrap_or_default(),
        relay: info.relay.unwrap_or_default(),
        payment: numeric(block_number, "payment", info.payment.as_ref()).unwrap_or(0.0),
        payout: numeric(block_number, "payout", info.payout.as_ref()).unwrap_or(0.0),
        block_value,
        extra_data,
        base_fee,
        priority_fee,
        gas_used,
        timestamp,
        metrics,
    }
}

/// Mean effective tip per gas across the block's transactions, in gwei.
fn mean_tip_gwei(block_number: BlockNumber, block: &RpcBlock, base_fee_wei: f64) -> f64 {
    if block.transactions.is_empty() {
        return 0.0;
    }
    let total: f64 = block
        .transactions
        .iter()
        .map(|tx| parse_or_zero(block_number, "effective_tip", tx.effective_tip_wei(base_fee_wei)))
        .sum();
    wei_to_gwei(total / block.transactions.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::{BlockInfoTransaction, RpcTransaction};

    fn fetched() -> FetchedBlock {
        let header = RpcHeader {
            hash: Some("0xhash".to_string()),
            miner: Some("0xminer".to_string()),
            extra_data: Some("0x6265617665726275696c642e6f7267".to_string()),
            gas_used: Some("0x1c9c380".to_string()),
            base_fee_per_gas: Some("0x2540be400".to_string()),
            timestamp: Some("0x64c25c4b".to_string()),
            ..Default::default()
        };
        FetchedBlock {
            info: BlockInfo::default(),
            block: RpcBlock {
                header: header.clone(),
                transactions: vec![
                    RpcTransaction {
                        gas_price: Some("0x2cb417800".to_string()),
                        ..Default::default()
                    },
                    RpcTransaction {
                        max_fee_per_gas: Some("0x4a817c800".to_string()),
                        max_priority_fee_per_gas: Some("0x3b9aca00".to_string()),
                        ..Default::default()
                    },
                ],
            },
            header,
        }
    }

    #[test]
    fn header_fills_gaps_in_block_info() {
        let record = build_record(17785601, fetched());

        assert_eq!(record.block_hash, "0xhash");
        assert_eq!(record.builder, "0xminer");
        assert_eq!(record.extra_data, "beaverbuild.org");
        assert_eq!(record.gas_used, 30_000_000);
        assert_eq!(record.base_fee, 10.0);
        // tips: 12 - 10 = 2 gwei and min(1, 20 - 10) = 1 gwei
        assert_eq!(record.priority_fee, 1.5);
        assert_eq!(record.tx_count, 2);
        assert_eq!(record.timestamp.timestamp(), 0x64c25c4b);
    }

    #[test]
    fn block_info_takes_precedence() {
        let mut fetched = fetched();
        fetched.info = BlockInfo {
            block_hash: Some("0xinfo".to_string()),
            builder: Some("Titan".to_string()),
            base_fee: Some(NumericField::Text("11.5".to_string())),
            priority_fee: Some(NumericField::Number(0.75)),
            gas_used: Some(NumericField::Number(12_000_000.0)),
            block_value: Some(NumericField::Text("3.0".to_string())),
            tx_count: Some(NumericField::Number(2.0)),
            transactions: vec![BlockInfoTransaction {
                class: Some("MEV".to_string()),
                value: Some(NumericField::Text("1.5".to_string())),
                ..Default::default()
            }],
            ..Default::default()
        };

        let record = build_record(17785601, fetched);
        assert_eq!(record.block_hash, "0xinfo");
        assert_eq!(record.builder, "Titan");
        assert_eq!(record.base_fee, 11.5);
        assert_eq!(record.priority_fee, 0.75);
        assert_eq!(record.gas_used, 12_000_000);
        assert_eq!(record.metrics.mev_tx_pct, 50.0);
        assert_eq!(record.metrics.mev_value_pct, 50.0);
    }

    #[test]
    fn bad_numbers_degrade_to_zero() {
        let mut fetched = fetched();
        fetched.header.extra_data = Some("0xnothex".to_string());
        fetched.info = BlockInfo {
            extra_data: Some("fallback".to_string()),
            payment: Some(NumericField::Text("lots".to_string())),
            block_value: Some(NumericField::Text("??".to_string())),
            transactions: vec![BlockInfoTransaction {
                class: Some("mev".to_string()),
                value: Some(NumericField::Text("oops".to_string())),
                ..Default::default()
            }],
            ..Default::default()
        };

        let record = build_record(1, fetched);
        assert_eq!(record.extra_data, "fallback");
        assert_eq!(record.payment, 0.0);
        assert_eq!(record.block_value, 0.0);
        assert_eq!(record.metrics.unparsed_values, 1);
        assert_eq!(record.metrics.mev_value_pct, 0.0);
    }

    #[test]
    fn quoted_tx_count_is_accepted_and_bad_one_falls_back() {
        let mut fetched = fetched();
        fetched.info = BlockInfo {
            tx_count: Some(NumericField::Text("4".to_string())),
            transactions: vec![BlockInfoTransaction {
                class: Some("mev".to_string()),
                value: Some(NumericField::Number(1.0)),
                ..Default::default()
            }],
            ..Default::default()
        };
        let record = build_record(1, fetched.clone());
        assert_eq!(record.tx_count, 4);
        assert_eq!(record.metrics.mev_tx_pct, 25.0);

        // the node block carries two transactions
        fetched.info.tx_count = Some(NumericField::Text("lots".to_string()));
        let record = build_record(1, fetched);
        assert_eq!(record.tx_count, 2);
        assert_eq!(record.metrics.mev_tx_pct, 50.0);
    }

    #[test]
    fn hex_fees_in_block_info_are_wei() {
        let mut fetched = fetched();
        fetched.info = BlockInfo {
            base_fee: Some(NumericField::Text("0x2540be400".to_string())),
            priority_fee: Some(NumericField::Text("0x3b9aca00".to_string())),
            ..Default::default()
        };
        let record = build_record(1, fetched);
        assert_eq!(record.base_fee, 10.0);
        assert_eq!(record.priority_fee, 1.0);
    }

    #[test]
    fn transaction_fees_and_tips_reach_the_record() {
        let mut fetched = fetched();
        fetched.info = BlockInfo {
            transactions: vec![
                BlockInfoTransaction {
                    class: Some("mev".to_string()),
                    fee: Some(NumericField::Text("0.25".to_string())),
                    tip: Some(NumericField::Number(0.125)),
                    ..Default::default()
                },
                BlockInfoTransaction {
                    fee: Some(NumericField::Text("garbage".to_string())),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let record = build_record(1, fetched);
        assert_eq!(record.metrics.total_fees, 0.25);
        assert_eq!(record.metrics.total_tips, 0.125);
    }
}
