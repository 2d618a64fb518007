use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

use crate::{
    chains::evm::rpc::RpcClient,
    core::{
        error::RpcError,
        source::{ChainSource, HeadSource},
        table::{RpcBlock, RpcHeader},
        types::BlockNumber,
    },
    utils::numeric::{parse_hex_u64, to_hex_quantity},
};

pub const METHOD_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const METHOD_HEADER_BY_NUMBER: &str = "eth_getHeaderByNumber";
pub const METHOD_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";

/// Typed `eth_*` calls on top of [`RpcClient`].
pub struct EvmClient {
    rpc: RpcClient,
}

impl EvmClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            rpc: RpcClient::new(rpc_url, timeout)?,
        })
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub async fn get_latest_block_number(&self) -> Result<u64, RpcError> {
        let result = self.rpc.call(METHOD_BLOCK_NUMBER, Vec::new()).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| RpcError::decode(METHOD_BLOCK_NUMBER, "result is not a string"))?;
        parse_hex_u64(hex).map_err(|e| RpcError::decode(METHOD_BLOCK_NUMBER, e.to_string()))
    }

    pub async fn get_header_by_number(&self, block_number: u64) -> Result<RpcHeader, RpcError> {
        debug!("🧾 Fetching header for block {}", block_number);
        let result = self
            .rpc
            .call(METHOD_HEADER_BY_NUMBER, block_params(block_number))
            .await?;
        decode_block_result(METHOD_HEADER_BY_NUMBER, block_number, result)
    }

    pub async fn get_block_by_number(&self, block_number: u64) -> Result<RpcBlock, RpcError> {
        debug!("📥 Fetching block {} with transactions", block_number);
        let result = self
            .rpc
            .call(METHOD_BLOCK_BY_NUMBER, block_params(block_number))
            .await?;
        decode_block_result(METHOD_BLOCK_BY_NUMBER, block_number, result)
    }
}

/// `[<hex height>, true]`; the flag asks for full transaction objects.
fn block_params(block_number: u64) -> Vec<Value> {
    vec![json!(to_hex_quantity(block_number)), json!(true)]
}

fn decode_block_result<T: DeserializeOwned>(
    method: &str,
    block_number: u64,
    result: Value,
) -> Result<T, RpcError> {
    if result.is_null() {
        return Err(RpcError::decode(
            method,
            format!("block {block_number} not found"),
        ));
    }
    serde_json::from_value(result).map_err(|e| RpcError::decode(method, e.to_string()))
}

#[async_trait]
impl HeadSource for EvmClient {
    async fn latest_block_number(&self) -> Result<BlockNumber, RpcError> {
        self.get_latest_block_number().await
    }
}

#[async_trait]
impl ChainSource for EvmClient {
    async fn header_by_number(&self, block_number: BlockNumber) -> Result<RpcHeader, RpcError> {
        self.get_header_by_number(block_number).await
    }

    async fn block_by_number(&self, block_number: BlockNumber) -> Result<RpcBlock, RpcError> {
        self.get_block_by_number(block_number).await
    }
}
