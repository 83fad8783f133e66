//! In-memory ledger implementing [`LedgerClient`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use bitcoin::hashes::{Hash, sha256d};
use bitcoin::{OutPoint, ScriptBuf, Transaction, Txid};
use parking_lot::Mutex;
use serde_json::{Value, json};

use scribe_core::error::RpcError;
use scribe_core::network::NetworkParams;
use scribe_core::traits::LedgerClient;
use scribe_core::types::Balance;
use scribe_wallet::deserialize_transaction;

#[derive(Debug, Default)]
struct State {
    utxos: BTreeMap<OutPoint, (ScriptBuf, u64)>,
    accepted: Vec<Transaction>,
    funded: u32,
    failing_sends: u32,
}

/// A single-wallet ledger with instant confirmation.
#[derive(Debug)]
pub struct MemoryLedger {
    network: NetworkParams,
    owner: ScriptBuf,
    address: String,
    state: Mutex<State>,
}

fn txid_of(bytes: &[u8]) -> Txid {
    Txid::from_raw_hash(sha256d::Hash::hash(bytes))
}

impl MemoryLedger {
    /// Empty ledger whose wallet owns `address` (locked by `owner`).
    pub fn new(network: NetworkParams, address: String, owner: ScriptBuf) -> Self {
        Self {
            network,
            owner,
            address,
            state: Mutex::new(State::default()),
        }
    }

    /// Credit the wallet with a fresh output of `value`.
    pub fn fund(&self, value: u64) -> OutPoint {
        let mut state = self.state.lock();
        state.funded += 1;
        let outpoint = OutPoint {
            txid: txid_of(&state.funded.to_le_bytes()),
            vout: 0,
        };
        state.utxos.insert(outpoint, (self.owner.clone(), value));
        outpoint
    }

    /// Make the next `n` broadcasts fail transiently.
    pub fn fail_next_sends(&self, n: u32) {
        self.state.lock().failing_sends = n;
    }

    /// Transactions accepted so far, in broadcast order.
    pub fn accepted(&self) -> Vec<Transaction> {
        self.state.lock().accepted.clone()
    }

    /// Wallet-owned outputs.
    pub fn wallet_utxo_count(&self) -> usize {
        self.balances().len()
    }

    /// Total value of wallet-owned outputs.
    pub fn wallet_value(&self) -> u64 {
        self.balances().iter().map(|b| b.value).sum()
    }

    fn balances(&self) -> Vec<Balance> {
        self.state
            .lock()
            .utxos
            .iter()
            .filter(|(_, (script, _))| *script == self.owner)
            .map(|(op, (script, value))| Balance {
                txid: op.txid,
                vout: op.vout,
                script_pubkey: script.clone(),
                value: *value,
            })
            .collect()
    }

    fn check_address(&self, address: &str) -> Result<(), RpcError> {
        if address != self.address {
            return Err(RpcError::Fatal(format!("address {address} not in wallet")));
        }
        Ok(())
    }

    fn decode(&self, tx_hex: &str) -> Result<(Vec<u8>, Transaction), RpcError> {
        let bytes = hex::decode(tx_hex).map_err(|e| RpcError::Fatal(format!("TX decode failed: {e}")))?;
        let (tx, _) = deserialize_transaction(&bytes, self.network.embed_timestamp)
            .map_err(|e| RpcError::Fatal(e.to_string()))?;
        Ok((bytes, tx))
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn get_balance(&self, address: &str) -> Result<u64, RpcError> {
        self.check_address(address)?;
        Ok(self.wallet_value())
    }

    async fn list_unspent(&self, address: &str) -> Result<Vec<Balance>, RpcError> {
        self.check_address(address)?;
        Ok(self.balances())
    }

    async fn decode_raw_transaction(&self, tx_hex: &str) -> Result<Value, RpcError> {
        let (bytes, tx) = self.decode(tx_hex)?;
        Ok(json!({
            "txid": txid_of(&bytes).to_string(),
            "vin": tx.input.len(),
            "vout": tx.output.len(),
        }))
    }

    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError> {
        let (_, tx) = self.decode(tx_hex)?;
        let state = self.state.lock();
        for input in &tx.input {
            match state.utxos.get(&input.previous_output) {
                Some((script, _)) if *script == self.owner => {}
                _ => {
                    return Err(RpcError::Fatal(format!(
                        "cannot sign input {}",
                        input.previous_output
                    )));
                }
            }
        }
        Ok(tx_hex.to_string())
    }

    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<Txid, RpcError> {
        let (bytes, tx) = self.decode(tx_hex)?;
        let mut state = self.state.lock();
        if state.failing_sends > 0 {
            state.failing_sends -= 1;
            return Err(RpcError::Transient("node busy".into()));
        }

        let mut input_total: u64 = 0;
        for input in &tx.input {
            let (_, value) = state
                .utxos
                .get(&input.previous_output)
                .ok_or_else(|| RpcError::Fatal(format!("missing inputs: {}", input.previous_output)))?;
            input_total += value;
        }
        let output_total: u64 = tx.output.iter().map(|o| o.value.to_sat()).sum();
        if output_total > input_total {
            return Err(RpcError::Fatal("bad-txns-in-belowout".into()));
        }

        let txid = txid_of(&bytes);
        for input in &tx.input {
            state.utxos.remove(&input.previous_output);
        }
        for (vout, output) in tx.output.iter().enumerate() {
            if output.script_pubkey.is_op_return() {
                continue;
            }
            state.utxos.insert(
                OutPoint {
                    txid,
                    vout: vout as u32,
                },
                (output.script_pubkey.clone(), output.value.to_sat()),
            );
        }
        state.accepted.push(tx);
        Ok(txid)
    }
}
