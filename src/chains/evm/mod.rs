pub mod client;
pub mod metadata;
pub mod rpc;
