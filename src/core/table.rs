use serde::Deserialize;

use crate::core::error::NumericParseError;
use crate::utils::numeric::{decode_extra_data, parse_count, parse_hex_u64, parse_numeric};

/// Header fields returned by `eth_getHeaderByNumber` / `eth_getBlockByNumber`.
///
/// Quantities stay hex strings until the enricher needs them, so a single bad
/// field never fails the whole response.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RpcHeader {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default)]
    pub miner: Option<String>,
    #[serde(default)]
    pub extra_data: Option<String>,
    #[serde(default)]
    pub gas_used: Option<String>,
    #[serde(default)]
    pub gas_limit: Option<String>,
    #[serde(default)]
    pub base_fee_per_gas: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RpcHeader {
    /// `extraData` rendered as text (lossy UTF-8).
    pub fn extra_data_text(&self) -> Result<String, NumericParseError> {
        match &self.extra_data {
            Some(raw) => decode_extra_data(raw),
            None => Ok(String::new()),
        }
    }

    pub fn gas_used(&self) -> Option<Result<u64, NumericParseError>> {
        self.gas_used.as_deref().map(parse_hex_u64)
    }

    pub fn base_fee_wei(&self) -> Option<Result<f64, NumericParseError>> {
        self.base_fee_per_gas.as_deref().map(parse_numeric)
    }

    pub fn timestamp_secs(&self) -> Option<Result<u64, NumericParseError>> {
        self.timestamp.as_deref().map(parse_hex_u64)
    }
}

/// Block returned by `eth_getBlockByNumber(n, true)`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    #[serde(flatten)]
    pub header: RpcHeader,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

/// Full transaction object inside an [`RpcBlock`].
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub gas_price: Option<String>,
    #[serde(default)]
    pub max_fee_per_gas: Option<String>,
    #[serde(default)]
    pub max_priority_fee_per_gas: Option<String>,
}

impl RpcTransaction {
    /// Tip per gas actually paid to the block producer, in wei.
    ///
    /// EIP-1559 transactions pay `min(maxPriorityFee, maxFee - baseFee)`,
    /// legacy ones pay `gasPrice - baseFee`.
    pub fn effective_tip_wei(&self, base_fee_wei: f64) -> Result<f64, NumericParseError> {
        let tip = match (&self.max_priority_fee_per_gas, &self.max_fee_per_gas) {
            (Some(priority), Some(max_fee)) => {
                let priority = parse_numeric(priority)?;
                let max_fee = parse_numeric(max_fee)?;
                priority.min(max_fee - base_fee_wei)
            }
            _ => match &self.gas_price {
                Some(gas_price) => parse_numeric(gas_price)? - base_fee_wei,
                None => 0.0,
            },
        };
        Ok(tip.max(0.0))
    }
}

/// A number the metadata service may send either as a JSON number or as a
/// decimal / `0x` hex string.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum NumericField {
    Number(f64),
    Text(String),
}

impl NumericField {
    pub fn parse(&self) -> Result<f64, NumericParseError> {
        match self {
            NumericField::Number(value) if value.is_finite() => Ok(*value),
            NumericField::Number(value) => {
                Err(NumericParseError::new(&value.to_string(), "not a finite number"))
            }
            NumericField::Text(text) => parse_numeric(text),
        }
    }

    /// Parse as a non-negative integer such as a height or a transaction count.
    pub fn parse_count(&self) -> Result<u64, NumericParseError> {
        match self {
            NumericField::Number(value)
                if value.is_finite() && *value >= 0.0 && value.fract() == 0.0 && *value <= u64::MAX as f64 =>
            {
                Ok(*value as u64)
            }
            NumericField::Number(value) => {
                Err(NumericParseError::new(&value.to_string(), "not a non-negative integer"))
            }
            NumericField::Text(text) => parse_count(text),
        }
    }

    /// Whether the value was sent as a `0x` quantity, which is always in wei.
    pub fn is_hex(&self) -> bool {
        match self {
            NumericField::Number(_) => false,
            NumericField::Text(text) => {
                let text = text.trim();
                text.starts_with("0x") || text.starts_with("0X")
            }
        }
    }
}

/// Payload of the block metadata service for one block.
///
/// Monetary amounts are in ETH. Fees are in gwei when sent as decimal numbers
/// or strings; a `0x` quantity is a raw wei amount. Integers may arrive quoted.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BlockInfo {
    #[serde(default)]
    pub block_number: Option<NumericField>,
    #[serde(default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub builder: Option<String>,
    #[serde(default)]
    pub builder_pubkey: Option<String>,
    #[serde(default)]
    pub proposer_pubkey: Option<String>,
    #[serde(default)]
    pub relay: Option<String>,
    #[serde(default)]
    pub payment: Option<NumericField>,
    #[serde(default)]
    pub payout: Option<NumericField>,
    #[serde(default)]
    pub block_value: Option<NumericField>,
    #[serde(default)]
    pub base_fee: Option<NumericField>,
    #[serde(default)]
    pub priority_fee: Option<NumericField>,
    #[serde(default)]
    pub gas_used: Option<NumericField>,
    #[serde(default)]
    pub tx_count: Option<NumericField>,
    #[serde(default)]
    pub extra_data: Option<String>,
    #[serde(default, alias = "txs")]
    pub transactions: Vec<BlockInfoTransaction>,
}

/// One transaction as classified by the metadata service.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct BlockInfoTransaction {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default, alias = "type", alias = "classification")]
    pub class: Option<String>,
    #[serde(default)]
    pub value: Option<NumericField>,
    #[serde(default)]
    pub fee: Option<NumericField>,
    #[serde(default)]
    pub tip: Option<NumericField>,
}
