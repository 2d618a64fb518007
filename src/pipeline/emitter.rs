use std::sync::{Arc, Mutex};

use tracing::info;

use crate::{
    core::types::BlockRecord,
    utils::format::{format_class_counts, format_percent, format_timestamp},
};

/// Version of the emitted record's field set; bump on any field change.
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Target of the record events, so sinks can route them separately.
pub const RECORD_TARGET: &str = "block_record";

/// Where finished block records go.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: &BlockRecord);
}

impl<T: RecordSink + ?Sized> RecordSink for Arc<T> {
    fn emit(&self, record: &BlockRecord) {
        (**self).emit(record)
    }
}

/// Writes each record as one structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn emit(&self, record: &BlockRecord) {
        let m = &record.metrics;
        info!(
            target: RECORD_TARGET,
            block_number = record.block_number,
            tx_count = record.tx_count,
            block_hash = %record.block_hash,
            builder = %record.builder,
            builder_pubkey = %record.builder_pubkey,
            proposer_pubkey = %record.proposer_pubkey,
            relay = %record.relay,
            payment = record.payment,
            payout = record.payout,
            block_value = record.block_value,
            extra_data = %record.extra_data,
            base_fee = record.base_fee,
            priority_fee = record.priority_fee,
            mev_tx_count = m.mev_tx_count,
            mev_value = m.mev_value,
            total_fees = m.total_fees,
            total_tips = m.total_tips,
            mev_tx_pct = %format_percent(m.mev_tx_pct),
            mev_value_pct = %format_percent(m.mev_value_pct),
            class_counts = %format_class_counts(&m.class_counts),
            unparsed_values = m.unparsed_values,
            gas_used = record.gas_used,
            timestamp = %format_timestamp(&record.timestamp),
            log_version = LOG_FORMAT_VERSION,
            "📦 Block enriched"
        );
    }
}

/// Keeps records in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<BlockRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<BlockRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn block_numbers(&self) -> Vec<u64> {
        self.records().iter().map(|r| r.block_number).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RecordSink for MemorySink {
    fn emit(&self, record: &BlockRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}
