use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::core::{
    error::FetchError,
    source::MetadataSource,
    table::BlockInfo,
    types::{BlockNumber, FetchOutcome},
};

/// Placeholder substituted with the decimal block number.
pub const BLOCK_PLACEHOLDER: &str = "{block}";

/// HTTP client for the external block-info service.
///
/// The service answers 400 for blocks it has not indexed yet; that is the
/// only status reported as [`FetchOutcome::NotReady`].
pub struct MetadataClient {
    http: Client,
    url_template: String,
}

impl MetadataClient {
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self> {
        // Reject templates that can never form a valid URL
        reqwest::Url::parse(&url_template.replace(BLOCK_PLACEHOLDER, "0"))?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url_template: url_template.to_string(),
        })
    }

    pub fn block_url(&self, block_number: BlockNumber) -> String {
        if self.url_template.contains(BLOCK_PLACEHOLDER) {
            self.url_template
                .replace(BLOCK_PLACEHOLDER, &block_number.to_string())
        } else {
            let separator = if self.url_template.contains('?') { '&' } else { '?' };
            format!("{}{separator}block={block_number}", self.url_template)
        }
    }

    pub async fn get_block_info(&self, block_number: BlockNumber) -> FetchOutcome<BlockInfo> {
        let url = self.block_url(block_number);
        debug!("🔎 Fetching block info for block {} from {}", block_number, url);

        let response = match self.http.get(&url).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::Failure(FetchError::Transport(e.to_string())),
        };

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            return FetchOutcome::NotReady;
        }
        if !status.is_success() {
            return FetchOutcome::Failure(FetchError::Status(status.as_u16()));
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::Failure(FetchError::Transport(e.to_string())),
        };

        match serde_json::from_slice::<BlockInfo>(&body) {
            Ok(info) => FetchOutcome::Success(info),
            Err(e) => FetchOutcome::Failure(FetchError::Decode(e.to_string())),
        }
    }
}

#[async_trait]
impl MetadataSource for MetadataClient {
    async fn fetch_block_info(&self, block_number: BlockNumber) -> FetchOutcome<BlockInfo> {
        self.get_block_info(block_number).await
    }
}
