//! Shared helpers for the end-to-end suites.

use bitcoin::hashes::Hash;
use bitcoin::script::Instruction;
use bitcoin::{PubkeyHash, ScriptBuf, Transaction};

use scribe_core::address::encode_address;
use scribe_core::constants::PUBKEY_HASH_LEN;
use scribe_core::error::RpcError;
use scribe_core::network::NetworkParams;
use scribe_core::traits::LedgerClient;
use scribe_wallet::planner::pay_to_pubkey_hash_script;
use scribe_wallet::{EmbedConfig, EmbeddedTransaction, Embedder, WalletError};

use crate::ledger::MemoryLedger;

/// Hash behind the funding address of every test wallet.
pub const OWNER_HASH: [u8; 20] = [0x5c; 20];

pub fn owner_script() -> ScriptBuf {
    pay_to_pubkey_hash_script(&PubkeyHash::from_byte_array(OWNER_HASH))
}

pub fn owner_address(network: &NetworkParams) -> String {
    encode_address(&PubkeyHash::from_byte_array(OWNER_HASH), network)
}

/// Ledger for `network` funded with one output per entry of `values`.
pub fn funded_ledger(network: NetworkParams, values: &[u64]) -> MemoryLedger {
    let address = owner_address(&network);
    let ledger = MemoryLedger::new(network, address, owner_script());
    for v in values {
        ledger.fund(*v);
    }
    ledger
}

/// Default configuration on `network`.
pub fn config_for(network: NetworkParams) -> EmbedConfig {
    EmbedConfig {
        network,
        ..EmbedConfig::default()
    }
}

#[derive(Debug)]
pub enum RunError {
    Wallet(WalletError),
    Rpc(RpcError),
}

/// Drive `embedder` to completion, signing and broadcasting every
/// transaction through `ledger` before asking for the next.
pub async fn run_to_completion(
    embedder: &mut Embedder<'_>,
    ledger: &dyn LedgerClient,
) -> Result<Vec<EmbeddedTransaction>, RunError> {
    let mut emitted = Vec::new();
    while let Some(tx) = embedder.next_transaction().await.map_err(RunError::Wallet)? {
        let signed = ledger
            .sign_raw_transaction(&tx.tx_hex)
            .await
            .map_err(RunError::Rpc)?;
        ledger
            .send_raw_transaction(&signed)
            .await
            .map_err(RunError::Rpc)?;
        emitted.push(tx);
    }
    Ok(emitted)
}

/// Data pushed by the first `OP_RETURN` output, if any.
pub fn null_data_frame(tx: &Transaction) -> Option<Vec<u8>> {
    let output = tx.output.iter().find(|o| o.script_pubkey.is_op_return())?;
    match output.script_pubkey.instructions().nth(1) {
        Some(Ok(Instruction::PushBytes(data))) => Some(data.as_bytes().to_vec()),
        _ => None,
    }
}

/// Concatenated hashes of pay-to-pubkey-hash outputs that do not pay the
/// wallet, i.e. the address-encoded frame including its zero padding.
pub fn address_encoded_frame(tx: &Transaction) -> Vec<u8> {
    let owner = owner_script();
    let mut frame = Vec::new();
    for output in &tx.output {
        let script = &output.script_pubkey;
        if script.is_p2pkh() && *script != owner {
            // OP_DUP OP_HASH160 OP_PUSHBYTES_20 <hash> ...
            frame.extend_from_slice(&script.as_bytes()[3..3 + PUBKEY_HASH_LEN]);
        }
    }
    frame
}
