//! Greedy input selection.
//!
//! Candidates are ordered (largest first for big spends, shuffled
//! otherwise) and taken one by one until their total covers outputs plus
//! fee. Zero-value balances are never selected.

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use scribe_core::types::Balance;

use crate::error::WalletError;

/// Order in which candidate balances are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOrdering {
    /// Descending by value; ties broken by outpoint for determinism.
    LargestFirst,
    /// Uniformly shuffled with the caller's RNG.
    Shuffled,
}

/// Result of coin selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Balances to spend, in input order.
    pub selected: Vec<Balance>,
    /// Total value of `selected`.
    pub total: u64,
    /// Amount the selection had to cover (outputs plus fee).
    pub target: u64,
}

impl CoinSelection {
    /// Value left over after covering the target.
    pub fn excess(&self) -> u64 {
        self.total - self.target
    }
}

pub struct CoinSelector;

impl CoinSelector {
    /// Select balances covering `required_outputs + fee`.
    ///
    /// # Arguments
    /// - `balances` — every balance of the funding address
    /// - `required_outputs` — total value of all planned outputs
    /// - `fee` — fee the transaction pays
    /// - `ordering` — candidate order
    /// - `rng` — used only for [`InputOrdering::Shuffled`]
    pub fn select<R: Rng + ?Sized>(
        balances: &[Balance],
        required_outputs: u64,
        fee: u64,
        ordering: InputOrdering,
        rng: &mut R,
    ) -> Result<CoinSelection, WalletError> {
        let target = required_outputs
            .checked_add(fee)
            .ok_or(WalletError::ValueOverflow)?;

        let mut candidates: Vec<&Balance> = balances.iter().filter(|b| b.is_spendable()).collect();
        match ordering {
            InputOrdering::LargestFirst => candidates.sort_by(|a, b| {
                b.value
                    .cmp(&a.value)
                    .then_with(|| a.txid.cmp(&b.txid))
                    .then_with(|| a.vout.cmp(&b.vout))
            }),
            InputOrdering::Shuffled => candidates.shuffle(rng),
        }

        let mut selected = Vec::new();
        let mut total: u64 = 0;
        // A transaction needs at least one input even for a zero target.
        for balance in candidates {
            if total >= target && !selected.is_empty() {
                break;
            }
            total = total
                .checked_add(balance.value)
                .ok_or(WalletError::ValueOverflow)?;
            selected.push(balance.clone());
        }

        if total < target || selected.is_empty() {
            return Err(WalletError::InsufficientFunds {
                have: total,
                need: target,
            });
        }

        debug!(
            inputs = selected.len(),
            total,
            target,
            ?ordering,
            "selected inputs"
        );
        Ok(CoinSelection {
            selected,
            total,
            target,
        })
    }
}
