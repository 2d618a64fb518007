//! Hex and decimal field decoding.
//!
//! Sentinel policy: callers that cannot afford to drop a block on a bad
//! number use [`parse_or_zero`], which logs the failure and yields `0.0`.

use alloy::primitives::{U256, hex};
use tracing::warn;

use crate::core::error::NumericParseError;

fn strip_hex_prefix(input: &str) -> Option<&str> {
    input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
}

/// Parse a `0x`-prefixed quantity such as the `eth_blockNumber` result.
pub fn parse_hex_u64(input: &str) -> Result<u64, NumericParseError> {
    let trimmed = input.trim();
    let digits =
        strip_hex_prefix(trimmed).ok_or_else(|| NumericParseError::new(input, "missing 0x prefix"))?;
    if digits.is_empty() {
        return Err(NumericParseError::new(input, "no hex digits"));
    }
    u64::from_str_radix(digits, 16).map_err(|e| NumericParseError::new(input, e))
}

/// Parse a count or height sent as a `0x` quantity or a decimal integer string.
pub fn parse_count(input: &str) -> Result<u64, NumericParseError> {
    let trimmed = input.trim();
    if strip_hex_prefix(trimmed).is_some() {
        return parse_hex_u64(trimmed);
    }
    trimmed
        .parse::<u64>()
        .map_err(|e| NumericParseError::new(input, e))
}

/// Encode a block number as a JSON-RPC quantity.
///
/// ```
/// use rs_block_enricher::utils::numeric::{parse_hex_u64, to_hex_quantity};
///
/// assert_eq!(to_hex_quantity(17785601), "0x10f6301");
/// assert_eq!(parse_hex_u64(&to_hex_quantity(0)).unwrap(), 0);
/// ```
pub fn to_hex_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Parse a `0x` hex quantity (up to 256 bits) or a decimal string into `f64`.
pub fn parse_numeric(input: &str) -> Result<f64, NumericParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(NumericParseError::new(input, "empty string"));
    }

    if let Some(digits) = strip_hex_prefix(trimmed) {
        if digits.is_empty() {
            return Err(NumericParseError::new(input, "no hex digits"));
        }
        let value = U256::from_str_radix(digits, 16).map_err(|e| NumericParseError::new(input, e))?;
        return value
            .to_string()
            .parse::<f64>()
            .map_err(|e| NumericParseError::new(input, e));
    }

    let value = trimmed
        .parse::<f64>()
        .map_err(|e| NumericParseError::new(input, e))?;
    if !value.is_finite() {
        return Err(NumericParseError::new(input, "not a finite number"));
    }
    Ok(value)
}

/// Resolve a parse result to its value, or log and fall back to `0.0`.
pub fn parse_or_zero(
    block_number: u64,
    field: &str,
    parsed: Result<f64, NumericParseError>,
) -> f64 {
    parsed.unwrap_or_else(|e| {
        warn!(block_number, field, error = %e, "⚠️ Numeric field unparsable, using 0");
        0.0
    })
}

/// Hex-decode `extraData` and render it as (lossy) UTF-8 text.
pub fn decode_extra_data(input: &str) -> Result<String, NumericParseError> {
    let bytes = hex::decode(input.trim()).map_err(|e| NumericParseError::new(input, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

pub fn wei_to_gwei(wei: f64) -> f64 {
    wei / 1e9
}
