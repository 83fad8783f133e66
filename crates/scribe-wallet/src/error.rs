//! Wallet error types.

use scribe_codec::CodecError;
use scribe_core::error::{AddressError, RpcError};
use thiserror::Error;

/// Errors that abort an embedding run.
///
/// None of these are retried inside the engine: chunk numbering and change
/// state are order-dependent, so any failure ends the whole run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Spendable balances cannot cover outputs plus fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Available value in minor units.
        have: u64,
        /// Required value in minor units.
        need: u64,
    },

    /// The funding address has no unspent outputs at all.
    #[error("no unspent outputs on address {0}")]
    NoUtxos(String),

    /// Inputs do not cover outputs and fee. Indicates an accounting defect.
    #[error("negative balance: inputs {inputs} < outputs {outputs} + fee {fee}")]
    NegativeBalance {
        /// Total input value.
        inputs: u64,
        /// Total output value.
        outputs: u64,
        /// Fee the draft was built for.
        fee: u64,
    },

    /// Value left to fees exceeds the configured cap.
    #[error("overpaying fees: {fee} exceeds cap {cap}")]
    OverpayingFees {
        /// Implied fee in minor units.
        fee: u64,
        /// Configured cap in minor units.
        cap: u64,
    },

    /// Sum of values does not fit in 64 bits.
    #[error("value overflow")]
    ValueOverflow,

    /// Funding address is malformed or for another network.
    #[error("invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    /// A script could not be built from chunk data.
    #[error("script error: {0}")]
    Script(String),

    /// Serialized transaction bytes could not be parsed.
    #[error("transaction decode error: {0}")]
    Decode(String),

    /// Chunking failed before any transaction was built.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Ledger node call failed.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// An earlier error already stopped this run.
    #[error("embedding run halted by an earlier error")]
    Halted,
}
