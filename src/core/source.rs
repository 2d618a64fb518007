use async_trait::async_trait;

use crate::core::{
    error::RpcError,
    table::{BlockInfo, RpcBlock, RpcHeader},
    types::{BlockNumber, FetchOutcome},
};

/// Anything that can report the current chain head.
#[async_trait]
pub trait HeadSource: Send + Sync {
    async fn latest_block_number(&self) -> Result<BlockNumber, RpcError>;
}

/// Header and body lookups against the node.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn header_by_number(&self, block_number: BlockNumber) -> Result<RpcHeader, RpcError>;

    /// Block including full transaction objects.
    async fn block_by_number(&self, block_number: BlockNumber) -> Result<RpcBlock, RpcError>;
}

/// External block metadata (builder, payment, classified transactions).
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn fetch_block_info(&self, block_number: BlockNumber) -> FetchOutcome<BlockInfo>;
}
