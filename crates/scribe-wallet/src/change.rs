//! Change management.
//!
//! A wallet that embeds many chunks back to back spends its own change
//! every time. Two modes keep that healthy:
//!
//! - **Split**: few spendable outputs. Break the spare value into several
//!   fixed-size change outputs so later transactions have inputs to choose
//!   from without waiting for chained confirmations.
//! - **Consolidate**: many spendable outputs. Emit no split outputs. By
//!   default the rounding output returns whatever selection leaves over;
//!   with `merge_remainder` set, one change output takes the whole
//!   unclaimed balance, so every spendable output is swept into it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use scribe_core::constants::{
    DEFAULT_CHANGE_SIZE, DEFAULT_CONSOLIDATION_THRESHOLD, DEFAULT_LARGE_SPEND_THRESHOLD,
    DEFAULT_MAX_SPLIT_OUTPUTS,
};
use scribe_core::types::{Balance, sum_balance_values};

use crate::coin_selection::InputOrdering;
use crate::error::WalletError;

/// Which way the policy pushed the wallet for this transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeMode {
    Split,
    Consolidate,
}

/// Change outputs to append after the data outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePlan {
    pub mode: ChangeMode,
    /// Values of the change outputs, in emission order.
    pub values: Vec<u64>,
}

impl ChangePlan {
    /// Sum of all change values. Bounded by the wallet balance, which fits
    /// in `u64`.
    pub fn total(&self) -> u64 {
        self.values.iter().sum()
    }
}

/// Thresholds steering change shape and input ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangePolicy {
    /// At or above this many spendable outputs the wallet consolidates.
    pub consolidation_threshold: usize,
    /// Upper bound on fixed-size change outputs per transaction.
    pub max_split_outputs: usize,
    /// Value of each fixed-size change output.
    pub change_size: u64,
    /// Spends above this total use the largest inputs first.
    pub large_spend_threshold: u64,
    /// In consolidate mode, sweep the unclaimed balance into one output.
    pub merge_remainder: bool,
}

impl Default for ChangePolicy {
    fn default() -> Self {
        Self {
            consolidation_threshold: DEFAULT_CONSOLIDATION_THRESHOLD,
            max_split_outputs: DEFAULT_MAX_SPLIT_OUTPUTS,
            change_size: DEFAULT_CHANGE_SIZE,
            large_spend_threshold: DEFAULT_LARGE_SPEND_THRESHOLD,
            merge_remainder: false,
        }
    }
}

impl ChangePolicy {
    /// Decide the change outputs for a transaction whose data outputs and
    /// fee already claim `claimed` of the wallet's spendable balance.
    pub fn manage_change(
        &self,
        claimed: u64,
        balances: &[Balance],
    ) -> Result<ChangePlan, WalletError> {
        let spendable: Vec<&Balance> = balances.iter().filter(|b| b.is_spendable()).collect();
        let total = sum_balance_values(balances).ok_or(WalletError::ValueOverflow)?;
        if claimed > total {
            return Err(WalletError::InsufficientFunds {
                have: total,
                need: claimed,
            });
        }

        let mut remaining = total - claimed;
        if spendable.len() >= self.consolidation_threshold {
            let values = if self.merge_remainder && remaining > 0 {
                vec![remaining]
            } else {
                Vec::new()
            };
            debug!(
                spendable = spendable.len(),
                threshold = self.consolidation_threshold,
                merged = !values.is_empty(),
                "consolidating change"
            );
            return Ok(ChangePlan {
                mode: ChangeMode::Consolidate,
                values,
            });
        }

        let mut values = Vec::new();
        if self.change_size > 0 {
            while values.len() < self.max_split_outputs && remaining >= self.change_size {
                values.push(self.change_size);
                remaining -= self.change_size;
            }
        }
        if remaining > 0 {
            values.push(remaining);
        }

        debug!(
            spendable = spendable.len(),
            outputs = values.len(),
            "splitting change"
        );
        Ok(ChangePlan {
            mode: ChangeMode::Split,
            values,
        })
    }

    /// Input ordering for a spend of `required` minor units of outputs.
    pub fn ordering_for(&self, required: u64) -> InputOrdering {
        if required > self.large_spend_threshold {
            InputOrdering::LargestFirst
        } else {
            InputOrdering::Shuffled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::{ScriptBuf, Txid};
    use scribe_core::constants::COIN;

    fn balances(values: &[u64]) -> Vec<Balance> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Balance {
                txid: Txid::from_byte_array([i as u8 + 1; 32]),
                vout: 0,
                script_pubkey: ScriptBuf::new(),
                value: *v,
            })
            .collect()
    }

    fn policy() -> ChangePolicy {
        ChangePolicy {
            consolidation_threshold: 15,
            max_split_outputs: 20,
            change_size: 100,
            large_spend_threshold: 1_000,
            merge_remainder: false,
        }
    }

    #[test]
    fn defaults_match_constants() {
        let p = ChangePolicy::default();
        assert_eq!(p.consolidation_threshold, 15);
        assert_eq!(p.max_split_outputs, 20);
        assert_eq!(p.change_size, 100 * COIN);
    }

    #[test]
    fn few_balances_split() {
        // 3 balances, 550 spare after claiming 50
        let plan = policy().manage_change(50, &balances(&[200, 200, 200])).unwrap();
        assert_eq!(plan.mode, ChangeMode::Split);
        assert_eq!(plan.values, vec![100, 100, 100, 100, 100, 50]);
        assert_eq!(plan.total(), 550);
    }

    #[test]
    fn split_without_remainder() {
        let plan = policy().manage_change(100, &balances(&[300])).unwrap();
        assert_eq!(plan.values, vec![100, 100]);
    }

    #[test]
    fn split_is_capped() {
        let p = ChangePolicy {
            max_split_outputs: 2,
            ..policy()
        };
        let plan = p.manage_change(0, &balances(&[1_000])).unwrap();
        assert_eq!(plan.values, vec![100, 100, 800]);
    }

    #[test]
    fn ample_balance_fills_split_ceiling() {
        let plan = policy().manage_change(0, &balances(&[1_000, 1_000, 1_000])).unwrap();
        assert_eq!(plan.values.len(), 21);
        assert!(plan.values[..20].iter().all(|v| *v == 100));
        assert_eq!(plan.values[20], 1_000);
    }

    #[test]
    fn many_balances_consolidate() {
        let plan = policy().manage_change(10, &balances(&[10; 15])).unwrap();
        assert_eq!(plan.mode, ChangeMode::Consolidate);
        assert!(plan.values.is_empty());
    }

    #[test]
    fn consolidation_can_merge_remainder() {
        let p = ChangePolicy {
            merge_remainder: true,
            ..policy()
        };
        let plan = p.manage_change(10, &balances(&[10; 15])).unwrap();
        assert_eq!(plan.mode, ChangeMode::Consolidate);
        assert_eq!(plan.values, vec![140]);

        let plan = p.manage_change(150, &balances(&[10; 15])).unwrap();
        assert!(plan.values.is_empty());
    }

    #[test]
    fn zero_value_balances_do_not_count() {
        let mut bs = balances(&[0; 14]);
        bs.extend(balances(&[500]));
        let plan = policy().manage_change(0, &bs).unwrap();
        assert_eq!(plan.mode, ChangeMode::Split);
    }

    #[test]
    fn claim_exceeding_balance_fails() {
        let err = policy().manage_change(601, &balances(&[200, 200, 200])).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 600, need: 601 });
    }

    #[test]
    fn exact_claim_leaves_no_change() {
        let plan = policy().manage_change(600, &balances(&[200, 200, 200])).unwrap();
        assert!(plan.values.is_empty());
        assert_eq!(plan.mode, ChangeMode::Split);
    }

    #[test]
    fn zero_change_size_emits_remainder_only() {
        let p = ChangePolicy {
            change_size: 0,
            ..policy()
        };
        let plan = p.manage_change(0, &balances(&[250])).unwrap();
        assert_eq!(plan.values, vec![250]);
    }

    #[test]
    fn ordering_threshold_is_strict() {
        assert_eq!(policy().ordering_for(1_000), InputOrdering::Shuffled);
        assert_eq!(policy().ordering_for(1_001), InputOrdering::LargestFirst);
    }
}
