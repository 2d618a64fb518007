//! Minimal JSON-RPC 2.0 transport over HTTP.
//!
//! No retries happen here; the tracker and enricher own retry policy.

use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Url, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::core::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Every request carries the same id; calls are never pipelined.
pub const REQUEST_ID: u64 = 0;

#[derive(Serialize, Debug)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [Value],
    id: u64,
}

#[derive(Deserialize, Debug)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

pub struct RpcClient {
    http: Client,
    url: Url,
}

impl RpcClient {
    pub fn new(rpc_url: &str, timeout: Duration) -> Result<Self> {
        let url = rpc_url.parse()?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Issue one call and return its `result`, which may be JSON `null`.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        debug_assert!(!method.is_empty(), "JSON-RPC method must not be empty");

        let request = RpcRequest {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: &params,
            id: REQUEST_ID,
        };
        trace!(method, "➡️ JSON-RPC request");

        let response = self
            .http
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport {
                method: method.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                method: method.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| RpcError::Transport {
            method: method.to_string(),
            message: e.to_string(),
        })?;

        let decoded: RpcResponse =
            serde_json::from_slice(&body).map_err(|e| RpcError::decode(method, e.to_string()))?;

        if let Some(err) = decoded.error {
            return Err(RpcError::decode(
                method,
                format!("node error {}: {}", err.code, err.message),
            ));
        }

        // serde maps both an absent and a `null` result to None
        Ok(decoded.result.unwrap_or(Value::Null))
    }
}
