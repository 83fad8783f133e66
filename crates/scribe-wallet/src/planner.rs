//! Output planning: how a framed chunk becomes transaction outputs.
//!
//! Two strategies exist. [`NullDataStrategy`] puts the whole frame into one
//! provably unspendable `OP_RETURN` output. [`AddressEncodingStrategy`]
//! slices the frame into 20-byte groups and pays to each group as if it
//! were a pubkey hash, for ledgers that relay no null-data outputs. Those
//! outputs are unspendable in practice and the value attached to them is
//! burned.

use std::fmt;

use bitcoin::hashes::Hash;
use bitcoin::script::PushBytesBuf;
use bitcoin::{PubkeyHash, ScriptBuf};

use scribe_codec::Padding;
use scribe_core::constants::PUBKEY_HASH_LEN;
use scribe_core::types::{OutputKind, PlannedOutput};

use crate::error::WalletError;

/// Maps a framed chunk to its data-carrying outputs.
pub trait OutputStrategy: Send + Sync + fmt::Debug {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// How many outputs a frame of `frame_len` bytes needs.
    fn output_count(&self, frame_len: usize) -> usize;

    /// Build the outputs for `frame`, each worth `value_per_output`.
    fn plan(&self, frame: &[u8], value_per_output: u64) -> Result<Vec<PlannedOutput>, WalletError>;
}

/// One `OP_RETURN` output carrying the frame verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDataStrategy;

impl OutputStrategy for NullDataStrategy {
    fn name(&self) -> &'static str {
        "null-data"
    }

    fn output_count(&self, _frame_len: usize) -> usize {
        1
    }

    fn plan(&self, frame: &[u8], value_per_output: u64) -> Result<Vec<PlannedOutput>, WalletError> {
        Ok(vec![PlannedOutput::new(
            value_per_output,
            null_data_script(frame)?,
            OutputKind::NullData,
        )])
    }
}

/// One pay-to-pubkey-hash output per 20 bytes of frame; the last group is
/// zero-padded.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddressEncodingStrategy;

impl OutputStrategy for AddressEncodingStrategy {
    fn name(&self) -> &'static str {
        "address-encoding"
    }

    fn output_count(&self, frame_len: usize) -> usize {
        frame_len.div_ceil(PUBKEY_HASH_LEN)
    }

    fn plan(&self, frame: &[u8], value_per_output: u64) -> Result<Vec<PlannedOutput>, WalletError> {
        Ok(frame
            .chunks(PUBKEY_HASH_LEN)
            .map(|group| {
                let mut hash = [0u8; PUBKEY_HASH_LEN];
                hash[..group.len()].copy_from_slice(group);
                PlannedOutput::new(
                    value_per_output,
                    pay_to_pubkey_hash_script(&PubkeyHash::from_byte_array(hash)),
                    OutputKind::PseudoAddress,
                )
            })
            .collect())
    }
}

impl AddressEncodingStrategy {
    /// Padding a reader strips from frames of a run at `chunk_size`.
    pub fn padding(chunk_size: usize) -> Padding {
        Padding {
            frame_len: chunk_size,
            group: PUBKEY_HASH_LEN,
        }
    }
}

/// Strategy selected by the `use_address_encoding` flag.
pub fn strategy_for(use_address_encoding: bool) -> Box<dyn OutputStrategy> {
    if use_address_encoding {
        Box::new(AddressEncodingStrategy)
    } else {
        Box::new(NullDataStrategy)
    }
}

/// `OP_RETURN <data>`.
pub fn null_data_script(data: &[u8]) -> Result<ScriptBuf, WalletError> {
    let push = PushBytesBuf::try_from(data.to_vec())
        .map_err(|_| WalletError::Script(format!("{} bytes do not fit one push", data.len())))?;
    Ok(ScriptBuf::new_op_return(push))
}

/// Standard pay-to-pubkey-hash locking script.
pub fn pay_to_pubkey_hash_script(hash: &PubkeyHash) -> ScriptBuf {
    ScriptBuf::new_p2pkh(hash)
}
