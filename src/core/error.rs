//! Typed failures for the upstream data sources.
//!
//! Every network failure collapses into one of three kinds so that callers
//! can pick a policy (log and retry the poll, or log and skip the block)
//! without matching on transport specifics.

use thiserror::Error;

/// Failure kind shared by the RPC client and the metadata fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    /// Connection, DNS or timeout failure.
    Transport,
    /// Malformed or unexpectedly shaped body.
    Decode,
    /// Non-2xx HTTP status (other than the metadata service's 400).
    Status,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Transport => "transport",
            FetchErrorKind::Decode => "decode",
            FetchErrorKind::Status => "status",
        }
    }
}

/// Error returned by a single JSON-RPC call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RpcError {
    #[error("{method}: transport error: {message}")]
    Transport { method: String, message: String },

    #[error("{method}: failed to decode response: {message}")]
    Decode { method: String, message: String },

    #[error("{method}: node returned HTTP status {status}")]
    Status { method: String, status: u16 },
}

impl RpcError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            RpcError::Transport { .. } => FetchErrorKind::Transport,
            RpcError::Decode { .. } => FetchErrorKind::Decode,
            RpcError::Status { .. } => FetchErrorKind::Status,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            RpcError::Transport { method, .. }
            | RpcError::Decode { method, .. }
            | RpcError::Status { method, .. } => method,
        }
    }

    pub(crate) fn decode(method: &str, message: impl Into<String>) -> Self {
        RpcError::Decode {
            method: method.to_string(),
            message: message.into(),
        }
    }
}

/// Hard failure from the block metadata service.
///
/// The "not indexed yet" answer is deliberately absent here; it is
/// [`crate::core::types::FetchOutcome::NotReady`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error("metadata service transport error: {0}")]
    Transport(String),

    #[error("failed to decode metadata response: {0}")]
    Decode(String),

    #[error("metadata service returned HTTP status {0}")]
    Status(u16),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Transport(_) => FetchErrorKind::Transport,
            FetchError::Decode(_) => FetchErrorKind::Decode,
            FetchError::Status(_) => FetchErrorKind::Status,
        }
    }
}

/// Any failure that makes the enricher drop a block.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EnrichError {
    #[error(transparent)]
    Rpc(#[from] RpcError),

    #[error(transparent)]
    Metadata(#[from] FetchError),
}

/// A hex or decimal field that could not be turned into a number.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("cannot parse {input:?} as a number: {reason}")]
pub struct NumericParseError {
    pub input: String,
    pub reason: String,
}

impl NumericParseError {
    pub(crate) fn new(input: &str, reason: impl ToString) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.to_string(),
        }
    }
}
