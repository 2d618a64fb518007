//! Folds classified transactions into block-level MEV metrics.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::types::Transaction;

/// Class whose share of the block is reported as a percentage.
pub const MEV_CLASS: &str = "mev";

/// Tag used when upstream sent no (or an empty) classification.
pub const UNCLASSIFIED: &str = "unclassified";

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct BlockMetrics {
    /// Denominator of the count ratio.
    pub tx_count: u64,
    pub class_counts: BTreeMap<String, u64>,
    /// ETH per class.
    pub class_values: BTreeMap<String, f64>,
    pub mev_tx_count: u64,
    pub mev_value: f64,
    /// Sum of transaction fees in ETH.
    pub total_fees: f64,
    /// Sum of transaction tips in ETH.
    pub total_tips: f64,
    /// `mev_tx_count / tx_count * 100`, or 0 for an empty block.
    pub mev_tx_pct: f64,
    /// `mev_value / block_value * 100`, or 0 for a zero-value block.
    pub mev_value_pct: f64,
    /// Transactions whose value could not be parsed and counted as 0.
    pub unparsed_values: u64,
}

/// Normalise a raw classification tag.
pub fn normalize_class(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(tag) if !tag.is_empty() => tag.to_lowercase(),
        _ => UNCLASSIFIED.to_string(),
    }
}

/// `part / whole` as a percentage; a zero or non-finite denominator yields 0.
pub fn ratio_pct(part: f64, whole: f64) -> f64 {
    if whole == 0.0 || !whole.is_finite() {
        return 0.0;
    }
    let pct = part / whole * 100.0;
    if pct.is_finite() { pct } else { 0.0 }
}

/// Aggregate a block's transactions.
///
/// `reported_tx_count` is the block's own transaction count; the list length
/// is used when it is larger.
pub fn aggregate(transactions: &[Transaction], reported_tx_count: u64, block_value: f64) -> BlockMetrics {
    let mut metrics = BlockMetrics {
        tx_count: reported_tx_count.max(transactions.len() as u64),
        ..Default::default()
    };

    for tx in transactions {
        let value = match tx.value {
            Some(value) => value,
            None => {
                metrics.unparsed_values += 1;
                0.0
            }
        };
        *metrics.class_counts.entry(tx.class.clone()).or_default() += 1;
        *metrics.class_values.entry(tx.class.clone()).or_default() += value;
        metrics.total_fees += tx.fee;
        metrics.total_tips += tx.tip;
    }

    metrics.mev_tx_count = metrics.class_counts.get(MEV_CLASS).copied().unwrap_or(0);
    metrics.mev_value = metrics.class_values.get(MEV_CLASS).copied().unwrap_or(0.0);
    metrics.mev_tx_pct = ratio_pct(metrics.mev_tx_count as f64, metrics.tx_count as f64);
    metrics.mev_value_pct = ratio_pct(metrics.mev_value, block_value);
    metrics
}
