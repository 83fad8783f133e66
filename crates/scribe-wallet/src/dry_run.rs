//! Local preview of a run that broadcasts nothing.
//!
//! [`DryRunLedger`] wraps a real [`LedgerClient`] and keeps an overlay of
//! the drafts "sent" through it: their inputs disappear from the wallet's
//! unspent set and their outputs paying the funding address appear in it.
//! Drafts built against it therefore chain, each spending change of the
//! ones before, exactly as the broadcast run would.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use bitcoin::hashes::{Hash, sha256d};
use bitcoin::{OutPoint, ScriptBuf, Txid};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use scribe_core::address::decode_address;
use scribe_core::error::RpcError;
use scribe_core::network::NetworkParams;
use scribe_core::traits::LedgerClient;
use scribe_core::types::Balance;

use crate::builder::deserialize_transaction;
use crate::error::WalletError;
use crate::planner::pay_to_pubkey_hash_script;

#[derive(Debug, Default)]
struct Overlay {
    spent: BTreeSet<OutPoint>,
    created: BTreeMap<OutPoint, Balance>,
    applied: usize,
}

/// Ledger view with unbroadcast drafts applied on top of the node's state.
pub struct DryRunLedger<'a> {
    inner: &'a dyn LedgerClient,
    address: String,
    owner: ScriptBuf,
    embed_timestamp: bool,
    overlay: Mutex<Overlay>,
}

impl<'a> DryRunLedger<'a> {
    /// Preview ledger for the wallet behind `address`.
    pub fn new(
        inner: &'a dyn LedgerClient,
        network: &NetworkParams,
        address: &str,
    ) -> Result<Self, WalletError> {
        let hash = decode_address(address, network)?;
        Ok(Self {
            inner,
            address: address.to_string(),
            owner: pay_to_pubkey_hash_script(&hash),
            embed_timestamp: network.embed_timestamp,
            overlay: Mutex::new(Overlay::default()),
        })
    }

    /// Number of drafts applied so far.
    pub fn applied(&self) -> usize {
        self.overlay.lock().applied
    }
}

#[async_trait]
impl LedgerClient for DryRunLedger<'_> {
    async fn get_balance(&self, address: &str) -> Result<u64, RpcError> {
        let balances = self.list_unspent(address).await?;
        Ok(balances.iter().map(|b| b.value).sum())
    }

    async fn list_unspent(&self, address: &str) -> Result<Vec<Balance>, RpcError> {
        let mut balances = self.inner.list_unspent(address).await?;
        if address != self.address {
            return Ok(balances);
        }
        let overlay = self.overlay.lock();
        balances.retain(|b| !overlay.spent.contains(&b.outpoint()));
        balances.extend(overlay.created.values().cloned());
        Ok(balances)
    }

    async fn decode_raw_transaction(&self, tx_hex: &str) -> Result<Value, RpcError> {
        self.inner.decode_raw_transaction(tx_hex).await
    }

    /// Drafts are previewed unsigned.
    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError> {
        Ok(tx_hex.to_string())
    }

    /// Apply the draft to the overlay. Nothing reaches the node.
    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<Txid, RpcError> {
        let bytes = hex::decode(tx_hex).map_err(|e| RpcError::Fatal(format!("TX decode failed: {e}")))?;
        let (tx, _) = deserialize_transaction(&bytes, self.embed_timestamp)
            .map_err(|e| RpcError::Fatal(e.to_string()))?;
        let txid = Txid::from_raw_hash(sha256d::Hash::hash(&bytes));

        let mut overlay = self.overlay.lock();
        for input in &tx.input {
            let outpoint = input.previous_output;
            if overlay.created.remove(&outpoint).is_none() && !overlay.spent.insert(outpoint) {
                return Err(RpcError::Fatal(format!("input {outpoint} already spent")));
            }
        }
        for (vout, output) in tx.output.iter().enumerate() {
            if output.script_pubkey != self.owner {
                continue;
            }
            let balance = Balance {
                txid,
                vout: vout as u32,
                script_pubkey: output.script_pubkey.clone(),
                value: output.value.to_sat(),
            };
            overlay.created.insert(balance.outpoint(), balance);
        }
        overlay.applied += 1;
        debug!(%txid, inputs = tx.input.len(), outputs = tx.output.len(), "draft applied");
        Ok(txid)
    }
}
