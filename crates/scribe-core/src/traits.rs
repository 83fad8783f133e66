//! Contract with the ledger node.
//!
//! The embedding engine only reads balances; signing and broadcast are
//! exposed here so callers can drive the whole round-trip through one
//! client. Implemented over JSON-RPC by `scribe-rpc`.

use async_trait::async_trait;
use bitcoin::Txid;

use crate::error::RpcError;
use crate::types::Balance;

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Total spendable value held by `address`, in minor units.
    async fn get_balance(&self, address: &str) -> Result<u64, RpcError>;

    /// Every unspent output currently paying to `address`.
    async fn list_unspent(&self, address: &str) -> Result<Vec<Balance>, RpcError>;

    /// Node-side decoding of a raw transaction, for diagnostics.
    async fn decode_raw_transaction(&self, tx_hex: &str) -> Result<serde_json::Value, RpcError>;

    /// Sign a raw transaction with the node's wallet, returning signed hex.
    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError>;

    /// Broadcast a signed transaction.
    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<Txid, RpcError>;
}
