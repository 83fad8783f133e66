//! Transaction drafting and serialization.
//!
//! Provides a builder for the unsigned transaction carrying one chunk:
//! 1. Add the chunk's data outputs and the fee
//! 2. Build a draft (plans change, selects inputs, adds the rounding output)
//! 3. Serialize for the node to sign
//!
//! Signing belongs to the node's wallet; inputs are left with empty
//! unlocking scripts.

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode;
use bitcoin::transaction::Version;
use bitcoin::{Amount, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};
use rand::Rng;
use tracing::debug;

use scribe_core::constants::TX_VERSION;
use scribe_core::types::{Balance, OutputKind, PlannedOutput, sum_balance_values, sum_output_values};

use crate::change::{ChangeMode, ChangePolicy};
use crate::coin_selection::CoinSelector;
use crate::error::WalletError;
use crate::fee::FeeModel;

/// Offset of the optional timestamp: right after the 4-byte version.
const TIMESTAMP_OFFSET: usize = 4;

/// An unsigned transaction whose accounting has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    /// Balances consumed, in input order.
    pub inputs: Vec<Balance>,
    /// Data outputs, then change outputs, then the rounding output if any.
    pub outputs: Vec<PlannedOutput>,
    /// Fee the draft pays.
    pub fee: u64,
    pub lock_time: u32,
    /// Change mode the draft was built under.
    pub change_mode: ChangeMode,
}

impl TransactionDraft {
    pub fn input_total(&self) -> Result<u64, WalletError> {
        sum_balance_values(&self.inputs).ok_or(WalletError::ValueOverflow)
    }

    pub fn output_total(&self) -> Result<u64, WalletError> {
        sum_output_values(&self.outputs).ok_or(WalletError::ValueOverflow)
    }

    /// Check value conservation: inputs minus outputs must lie in
    /// `[0, cap]`.
    pub fn validate(&self, cap: u64) -> Result<(), WalletError> {
        if self.inputs.is_empty() {
            return Err(WalletError::InsufficientFunds {
                have: 0,
                need: self.fee,
            });
        }
        let inputs = self.input_total()?;
        let outputs = self.output_total()?;
        if inputs < outputs {
            return Err(WalletError::NegativeBalance {
                inputs,
                outputs,
                fee: self.fee,
            });
        }
        let implied = inputs - outputs;
        if implied > cap {
            return Err(WalletError::OverpayingFees { fee: implied, cap });
        }
        Ok(())
    }

    /// The unsigned transaction in `bitcoin` form.
    pub fn to_transaction(&self) -> Transaction {
        Transaction {
            version: Version(TX_VERSION),
            lock_time: LockTime::from_consensus(self.lock_time),
            input: self
                .inputs
                .iter()
                .map(|b| TxIn {
                    previous_output: b.outpoint(),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
                .collect(),
            output: self
                .outputs
                .iter()
                .map(|o| TxOut {
                    value: Amount::from_sat(o.value),
                    script_pubkey: o.script_pubkey.clone(),
                })
                .collect(),
        }
    }

    /// Serialized bytes, with `timestamp` inserted after the version when
    /// the ledger expects one.
    pub fn serialize(&self, timestamp: Option<u32>) -> Vec<u8> {
        serialize_transaction(&self.to_transaction(), timestamp)
    }

    /// Hex form of [`serialize`](Self::serialize), as the node expects it.
    pub fn to_hex(&self, timestamp: Option<u32>) -> String {
        hex::encode(self.serialize(timestamp))
    }
}

/// Consensus-serialize `tx`, optionally carrying a little-endian timestamp
/// right after the version field.
pub fn serialize_transaction(tx: &Transaction, timestamp: Option<u32>) -> Vec<u8> {
    let mut bytes = encode::serialize(tx);
    if let Some(ts) = timestamp {
        bytes.splice(TIMESTAMP_OFFSET..TIMESTAMP_OFFSET, ts.to_le_bytes());
    }
    bytes
}

/// Inverse of [`serialize_transaction`].
pub fn deserialize_transaction(
    bytes: &[u8],
    has_timestamp: bool,
) -> Result<(Transaction, Option<u32>), WalletError> {
    if !has_timestamp {
        let tx = encode::deserialize(bytes).map_err(|e| WalletError::Decode(e.to_string()))?;
        return Ok((tx, None));
    }
    if bytes.len() < TIMESTAMP_OFFSET + 4 {
        return Err(WalletError::Decode(format!(
            "{} bytes is too short for a timestamped transaction",
            bytes.len()
        )));
    }
    let mut ts = [0u8; 4];
    ts.copy_from_slice(&bytes[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 4]);
    let mut stripped = Vec::with_capacity(bytes.len() - 4);
    stripped.extend_from_slice(&bytes[..TIMESTAMP_OFFSET]);
    stripped.extend_from_slice(&bytes[TIMESTAMP_OFFSET + 4..]);
    let tx = encode::deserialize(&stripped).map_err(|e| WalletError::Decode(e.to_string()))?;
    Ok((tx, Some(u32::from_le_bytes(ts))))
}

/// Builder for one chunk's transaction.
///
/// # Example
/// ```ignore
/// let draft = TransactionBuilder::new(change_script)
///     .add_outputs(data_outputs)
///     .set_fee(fee)
///     .build(&balances, &mut rng)?;
/// let hex = draft.to_hex(None);
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    data_outputs: Vec<PlannedOutput>,
    fee: u64,
    fee_model: FeeModel,
    change_policy: ChangePolicy,
    change_script: ScriptBuf,
    lock_time: u32,
}

impl TransactionBuilder {
    /// Builder paying change and rounding to `change_script`.
    pub fn new(change_script: ScriptBuf) -> Self {
        Self {
            data_outputs: Vec::new(),
            fee: 0,
            fee_model: FeeModel::default(),
            change_policy: ChangePolicy::default(),
            change_script,
            lock_time: 0,
        }
    }

    /// Append data-carrying outputs.
    pub fn add_outputs(&mut self, outputs: impl IntoIterator<Item = PlannedOutput>) -> &mut Self {
        self.data_outputs.extend(outputs);
        self
    }

    pub fn set_fee(&mut self, fee: u64) -> &mut Self {
        self.fee = fee;
        self
    }

    /// Override the fee model; only its cap is used while building.
    pub fn set_fee_model(&mut self, fee_model: FeeModel) -> &mut Self {
        self.fee_model = fee_model;
        self
    }

    pub fn set_change_policy(&mut self, change_policy: ChangePolicy) -> &mut Self {
        self.change_policy = change_policy;
        self
    }

    pub fn set_lock_time(&mut self, lock_time: u32) -> &mut Self {
        self.lock_time = lock_time;
        self
    }

    /// Plan change, select inputs and balance the draft.
    ///
    /// # Arguments
    /// - `balances` — every balance of the funding address, freshly queried
    /// - `rng` — shuffles candidates for small spends
    pub fn build<R: Rng + ?Sized>(
        &self,
        balances: &[Balance],
        rng: &mut R,
    ) -> Result<TransactionDraft, WalletError> {
        self.fee_model.check_cap(self.fee)?;

        let data_total = sum_output_values(&self.data_outputs).ok_or(WalletError::ValueOverflow)?;
        let claimed = data_total
            .checked_add(self.fee)
            .ok_or(WalletError::ValueOverflow)?;

        let change = self.change_policy.manage_change(claimed, balances)?;

        let mut outputs = self.data_outputs.clone();
        outputs.extend(change.values.iter().map(|value| {
            PlannedOutput::new(*value, self.change_script.clone(), OutputKind::Change)
        }));

        let required = sum_output_values(&outputs).ok_or(WalletError::ValueOverflow)?;
        let ordering = self.change_policy.ordering_for(required);
        let selection = CoinSelector::select(balances, required, self.fee, ordering, rng)?;

        // Selection covers required + fee, so this only trips on an
        // accounting defect.
        let needed = required + self.fee;
        if selection.total < needed {
            return Err(WalletError::NegativeBalance {
                inputs: selection.total,
                outputs: required,
                fee: self.fee,
            });
        }
        let rounding = selection.total - needed;
        if rounding > 0 {
            outputs.push(PlannedOutput::new(
                rounding,
                self.change_script.clone(),
                OutputKind::Rounding,
            ));
        }

        let draft = TransactionDraft {
            inputs: selection.selected,
            outputs,
            fee: self.fee,
            lock_time: self.lock_time,
            change_mode: change.mode,
        };
        draft.validate(self.fee_model.highway_robbery_cap)?;

        debug!(
            inputs = draft.inputs.len(),
            outputs = draft.outputs.len(),
            fee = draft.fee,
            rounding,
            mode = ?draft.change_mode,
            "built draft"
        );
        Ok(draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::{PubkeyHash, Txid};
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::planner::{NullDataStrategy, OutputStrategy, pay_to_pubkey_hash_script};

    fn change_script() -> ScriptBuf {
        pay_to_pubkey_hash_script(&PubkeyHash::from_byte_array([9; 20]))
    }

    fn balances(values: &[u64]) -> Vec<Balance> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Balance {
                txid: Txid::from_byte_array([i as u8 + 1; 32]),
                vout: 0,
                script_pubkey: change_script(),
                value: *v,
            })
            .collect()
    }

    fn policy(threshold: usize) -> ChangePolicy {
        ChangePolicy {
            consolidation_threshold: threshold,
            max_split_outputs: 20,
            change_size: 100,
            large_spend_threshold: 10,
            merge_remainder: false,
        }
    }

    fn fee_model() -> FeeModel {
        FeeModel {
            base_rate_per_kb: 1,
            multiplier: 1,
            per_output_fee: 1,
            highway_robbery_cap: 5,
        }
    }

    fn data_outputs() -> Vec<PlannedOutput> {
        NullDataStrategy.plan(b"chunk", 45).unwrap()
    }

    fn build(bs: &[Balance], threshold: usize) -> Result<TransactionDraft, WalletError> {
        TransactionBuilder::new(change_script())
            .add_outputs(data_outputs())
            .set_fee(1)
            .set_fee_model(fee_model())
            .set_change_policy(policy(threshold))
            .build(bs, &mut StdRng::seed_from_u64(1))
    }

    #[test]
    fn consolidating_draft_rounds_leftover() {
        // 45 output + 1 fee from [30, 40, 50]; largest first takes 50.
        let draft = build(&balances(&[30, 40, 50]), 3).unwrap();
        assert_eq!(draft.change_mode, ChangeMode::Consolidate);
        assert_eq!(draft.inputs.len(), 1);
        assert_eq!(draft.input_total().unwrap(), 50);
        assert_eq!(draft.outputs.len(), 2);
        assert_eq!(draft.outputs[1].kind, OutputKind::Rounding);
        assert_eq!(draft.outputs[1].value, 4);
        assert_eq!(draft.input_total().unwrap() - draft.output_total().unwrap(), 1);
    }

    #[test]
    fn merging_draft_sweeps_every_input() {
        let bs = balances(&[30, 40, 50]);
        let draft = TransactionBuilder::new(change_script())
            .add_outputs(data_outputs())
            .set_fee(1)
            .set_fee_model(fee_model())
            .set_change_policy(ChangePolicy {
                merge_remainder: true,
                ..policy(3)
            })
            .build(&bs, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_eq!(draft.change_mode, ChangeMode::Consolidate);
        assert_eq!(draft.inputs.len(), 3);
        // 120 - 46 spare in a single change output, no rounding
        assert_eq!(draft.outputs.len(), 2);
        assert_eq!(draft.outputs[1].kind, OutputKind::Change);
        assert_eq!(draft.outputs[1].value, 74);
    }

    #[test]
    fn splitting_draft_spends_everything() {
        let draft = build(&balances(&[30, 40, 50]), 15).unwrap();
        assert_eq!(draft.change_mode, ChangeMode::Split);
        assert_eq!(draft.inputs.len(), 3);
        // 120 - 46 = 74 spare, below change_size, so one change output
        assert_eq!(draft.outputs[1].kind, OutputKind::Change);
        assert_eq!(draft.outputs[1].value, 74);
        assert_eq!(draft.outputs.len(), 2);
        assert_eq!(draft.input_total().unwrap() - draft.output_total().unwrap(), 1);
    }

    #[test]
    fn fee_above_cap_rejected() {
        let err = TransactionBuilder::new(change_script())
            .add_outputs(data_outputs())
            .set_fee(6)
            .set_fee_model(fee_model())
            .build(&balances(&[1_000]), &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert_eq!(err, WalletError::OverpayingFees { fee: 6, cap: 5 });
    }

    #[test]
    fn insufficient_balance() {
        let err = build(&balances(&[10, 20]), 3).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 30, need: 46 });
    }

    #[test]
    fn validate_detects_negative_balance() {
        let draft = TransactionDraft {
            inputs: balances(&[10]),
            outputs: data_outputs(),
            fee: 1,
            lock_time: 0,
            change_mode: ChangeMode::Consolidate,
        };
        assert_eq!(
            draft.validate(5),
            Err(WalletError::NegativeBalance {
                inputs: 10,
                outputs: 45,
                fee: 1
            })
        );
    }

    #[test]
    fn validate_detects_overpaying() {
        let draft = TransactionDraft {
            inputs: balances(&[100]),
            outputs: data_outputs(),
            fee: 1,
            lock_time: 0,
            change_mode: ChangeMode::Consolidate,
        };
        assert_eq!(
            draft.validate(5),
            Err(WalletError::OverpayingFees { fee: 55, cap: 5 })
        );
    }

    #[test]
    fn serialized_draft_round_trips_with_timestamp() {
        let draft = build(&balances(&[30, 40, 50]), 3).unwrap();
        let plain = draft.serialize(None);
        let stamped = draft.serialize(Some(0x0102_0304));
        assert_eq!(stamped.len(), plain.len() + 4);
        assert_eq!(&stamped[..4], &1i32.to_le_bytes());
        assert_eq!(&stamped[4..8], &[0x04, 0x03, 0x02, 0x01]);

        let (tx, ts) = deserialize_transaction(&stamped, true).unwrap();
        assert_eq!(ts, Some(0x0102_0304));
        assert_eq!(tx, draft.to_transaction());

        let (tx, ts) = deserialize_transaction(&plain, false).unwrap();
        assert_eq!(ts, None);
        assert_eq!(tx.input.len(), 1);
        assert!(tx.input[0].script_sig.is_empty());
        assert_eq!(tx.output[0].value, Amount::from_sat(45));
    }

    #[test]
    fn hex_matches_bytes() {
        let draft = build(&balances(&[50]), 3).unwrap();
        assert_eq!(draft.to_hex(None), hex::encode(draft.serialize(None)));
    }

    #[test]
    fn truncated_bytes_fail_to_decode() {
        assert!(matches!(
            deserialize_transaction(&[1, 0, 0], true),
            Err(WalletError::Decode(_))
        ));
        assert!(matches!(
            deserialize_transaction(&[1, 0, 0, 0, 5], false),
            Err(WalletError::Decode(_))
        ));
    }

    proptest! {
        #[test]
        fn drafts_conserve_value(
            values in proptest::collection::vec(1u64..10_000, 1..25),
            data in 0u64..5_000,
            fee in 0u64..=5,
            seed in any::<u64>(),
        ) {
            let outputs = vec![PlannedOutput::new(data, ScriptBuf::new(), OutputKind::NullData)];
            let result = TransactionBuilder::new(change_script())
                .add_outputs(outputs)
                .set_fee(fee)
                .set_fee_model(fee_model())
                .set_change_policy(policy(15))
                .build(&balances(&values), &mut StdRng::seed_from_u64(seed));
            match result {
                Ok(draft) => {
                    let inputs = draft.input_total().unwrap();
                    let outputs = draft.output_total().unwrap();
                    prop_assert!(inputs >= outputs);
                    prop_assert_eq!(inputs - outputs, fee);
                    prop_assert!(!draft.inputs.is_empty());
                }
                Err(WalletError::InsufficientFunds { .. }) => {
                    prop_assert!(values.iter().sum::<u64>() < data + fee);
                }
                Err(e) => prop_assert!(false, "unexpected error {e}"),
            }
        }
    }
}
