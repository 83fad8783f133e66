//! Linear fee model.
//!
//! The fee for a transaction depends only on the size of the chunk it
//! carries, never on the transaction's final serialized size:
//!
//! ```text
//! fee = base_rate_per_kb * (1 + payload_size / 1024) * multiplier
//! ```
//!
//! Every data output additionally carries `per_output_fee` as its value.

use serde::{Deserialize, Serialize};

use scribe_core::constants::{
    DEFAULT_BASE_RATE_PER_KB, DEFAULT_FEE_MULTIPLIER, DEFAULT_HIGHWAY_ROBBERY_CAP,
    DEFAULT_PER_OUTPUT_FEE,
};

use crate::error::WalletError;

/// Fee parameters, all in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeModel {
    /// Fee per started kilobyte of chunk data.
    pub base_rate_per_kb: u64,
    /// Integer multiplier applied to the whole fee.
    pub multiplier: u64,
    /// Value attached to every data-carrying output.
    pub per_output_fee: u64,
    /// Largest fee any single transaction may pay.
    pub highway_robbery_cap: u64,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            base_rate_per_kb: DEFAULT_BASE_RATE_PER_KB,
            multiplier: DEFAULT_FEE_MULTIPLIER,
            per_output_fee: DEFAULT_PER_OUTPUT_FEE,
            highway_robbery_cap: DEFAULT_HIGHWAY_ROBBERY_CAP,
        }
    }
}

impl FeeModel {
    /// Fee for a transaction carrying `payload_size` bytes of chunk data.
    ///
    /// Saturates instead of overflowing; an absurd fee is then rejected by
    /// [`check_cap`](Self::check_cap).
    pub fn fee(&self, payload_size: usize) -> u64 {
        let blocks = 1 + (payload_size / 1024) as u64;
        self.base_rate_per_kb
            .saturating_mul(blocks)
            .saturating_mul(self.multiplier)
    }

    /// Total value attached to `outputs` data outputs.
    pub fn output_value(&self, outputs: usize) -> u64 {
        self.per_output_fee.saturating_mul(outputs as u64)
    }

    /// Reject fees above the cap.
    pub fn check_cap(&self, fee: u64) -> Result<(), WalletError> {
        if fee > self.highway_robbery_cap {
            return Err(WalletError::OverpayingFees {
                fee,
                cap: self.highway_robbery_cap,
            });
        }
        Ok(())
    }
}
