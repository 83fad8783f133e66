//! # scribe-rpc
//! [`LedgerClient`](scribe_core::traits::LedgerClient) over a
//! bitcoind-style JSON-RPC endpoint with HTTP basic authentication.

pub mod client;
pub mod config;
pub mod parse;

pub use client::JsonRpcLedger;
pub use config::RpcConfig;
