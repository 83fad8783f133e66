//! Turning node JSON into Scribe types.
//!
//! Field names follow the bitcoind RPC family (`listunspent`,
//! `signrawtransaction`), which StrongHands and other descendants share.

use std::str::FromStr;

use bitcoin::{ScriptBuf, Txid};
use jsonrpsee::core::ClientError;
use serde_json::Value;

use scribe_core::error::RpcError;
use scribe_core::network::NetworkParams;
use scribe_core::types::Balance;

/// Sort a client error into retryable and fatal.
pub fn classify(err: ClientError) -> RpcError {
    match err {
        ClientError::Transport(e) => RpcError::Transient(e.to_string()),
        ClientError::RestartNeeded(e) => RpcError::Transient(e.to_string()),
        ClientError::RequestTimeout => RpcError::Transient("request timed out".to_string()),
        other => RpcError::Fatal(other.to_string()),
    }
}

fn field<'a>(entry: &'a Value, name: &str) -> Result<&'a Value, RpcError> {
    entry
        .get(name)
        .ok_or_else(|| RpcError::Fatal(format!("listunspent entry missing `{name}`")))
}

/// Parse one `listunspent` entry.
pub fn parse_unspent_entry(entry: &Value, network: &NetworkParams) -> Result<Balance, RpcError> {
    let txid = field(entry, "txid")?
        .as_str()
        .and_then(|s| Txid::from_str(s).ok())
        .ok_or_else(|| RpcError::Fatal("listunspent entry has malformed txid".into()))?;
    let vout = field(entry, "vout")?
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| RpcError::Fatal("listunspent entry has malformed vout".into()))?;
    let script_pubkey = field(entry, "scriptPubKey")?
        .as_str()
        .and_then(|s| ScriptBuf::from_hex(s).ok())
        .ok_or_else(|| RpcError::Fatal("listunspent entry has malformed scriptPubKey".into()))?;
    let amount = field(entry, "amount")?
        .as_f64()
        .ok_or_else(|| RpcError::Fatal("listunspent entry has malformed amount".into()))?;

    Ok(Balance {
        txid,
        vout,
        script_pubkey,
        value: network.coins_to_minor(amount),
    })
}

/// Parse a whole `listunspent` result.
pub fn parse_unspent(result: &Value, network: &NetworkParams) -> Result<Vec<Balance>, RpcError> {
    result
        .as_array()
        .ok_or_else(|| RpcError::Fatal("listunspent did not return an array".into()))?
        .iter()
        .map(|entry| parse_unspent_entry(entry, network))
        .collect()
}

/// Extract the signed hex from a `signrawtransaction` result, refusing
/// partially signed transactions.
pub fn parse_signed(result: &Value) -> Result<String, RpcError> {
    let hex = result
        .get("hex")
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::Fatal("signrawtransaction returned no hex".into()))?;
    if !result.get("complete").and_then(Value::as_bool).unwrap_or(false) {
        return Err(RpcError::Fatal("node could not sign every input".into()));
    }
    Ok(hex.to_string())
}

/// Parse the txid returned by `sendrawtransaction`.
pub fn parse_txid(result: &str) -> Result<Txid, RpcError> {
    Txid::from_str(result).map_err(|e| RpcError::Fatal(format!("malformed txid {result}: {e}")))
}
