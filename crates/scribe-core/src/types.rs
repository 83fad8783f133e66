//! Ledger-facing value types.
//!
//! All values are in minor units of the configured network.

use std::fmt;

use bitcoin::{OutPoint, ScriptBuf, Txid};

/// A spendable output owned by the funding address.
///
/// The node is the source of truth; these are snapshots and are re-queried
/// before every selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Balance {
    /// Transaction that created the output.
    pub txid: Txid,
    /// Index of the output within that transaction.
    pub vout: u32,
    /// Locking script of the output.
    pub script_pubkey: ScriptBuf,
    /// Value in minor units.
    pub value: u64,
}

impl Balance {
    /// The outpoint referencing this balance.
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.txid,
            vout: self.vout,
        }
    }

    /// Zero-value outputs are never selected.
    pub fn is_spendable(&self) -> bool {
        self.value > 0
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.txid, self.vout, self.value)
    }
}

/// What a planned output is for. Only used for accounting and logs; the
/// serialized transaction does not distinguish them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// `OP_RETURN` output carrying a framed chunk.
    NullData,
    /// Pay-to-pubkey-hash output whose hash is 20 bytes of chunk data.
    PseudoAddress,
    /// Fixed-size split output paying back to the funding address.
    Change,
    /// Leftover after selection, paying back to the funding address.
    Rounding,
}

/// One output of a transaction under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    /// Value in minor units.
    pub value: u64,
    /// Locking script.
    pub script_pubkey: ScriptBuf,
    /// Role of the output.
    pub kind: OutputKind,
}

impl PlannedOutput {
    pub fn new(value: u64, script_pubkey: ScriptBuf, kind: OutputKind) -> Self {
        Self {
            value,
            script_pubkey,
            kind,
        }
    }
}

/// Sum output values, `None` on overflow.
pub fn sum_output_values(outputs: &[PlannedOutput]) -> Option<u64> {
    outputs
        .iter()
        .try_fold(0u64, |acc, o| acc.checked_add(o.value))
}

/// Sum balance values, `None` on overflow.
pub fn sum_balance_values(balances: &[Balance]) -> Option<u64> {
    balances
        .iter()
        .try_fold(0u64, |acc, b| acc.checked_add(b.value))
}
