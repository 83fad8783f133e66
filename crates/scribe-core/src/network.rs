//! Ledger network parameters.
//!
//! Built once at startup and passed by value to whatever needs it; nothing
//! here is registered globally.

use serde::{Deserialize, Serialize};

use crate::constants::COIN;

/// Static description of the ledger we are writing to.
///
/// # Examples
///
/// ```
/// use scribe_core::network::NetworkParams;
/// let net = NetworkParams::stronghands();
/// assert_eq!(net.pubkey_hash_version, 0x3f);
/// assert!(net.embed_timestamp);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    /// Human-readable network name.
    pub name: String,
    /// Base58check version byte of pay-to-pubkey-hash addresses.
    pub pubkey_hash_version: u8,
    /// Minor units per whole coin.
    pub coin: u64,
    /// Whether serialized transactions carry a timestamp after the version
    /// field (proof-of-stake ledgers derived from Peercoin).
    pub embed_timestamp: bool,
}

impl NetworkParams {
    /// StrongHands (SHND) mainnet.
    pub fn stronghands() -> Self {
        Self {
            name: "stronghands".to_string(),
            pubkey_hash_version: 0x3f,
            coin: COIN,
            embed_timestamp: true,
        }
    }

    /// Bitcoin mainnet.
    pub fn bitcoin() -> Self {
        Self {
            name: "bitcoin".to_string(),
            pubkey_hash_version: 0x00,
            coin: 100_000_000,
            embed_timestamp: false,
        }
    }

    /// Bitcoin testnet and regtest.
    pub fn bitcoin_testnet() -> Self {
        Self {
            name: "bitcoin-testnet".to_string(),
            pubkey_hash_version: 0x6f,
            coin: 100_000_000,
            embed_timestamp: false,
        }
    }

    /// Look up a preset by name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "stronghands" | "shnd" => Some(Self::stronghands()),
            "bitcoin" | "btc" => Some(Self::bitcoin()),
            "bitcoin-testnet" | "testnet" | "regtest" => Some(Self::bitcoin_testnet()),
            _ => None,
        }
    }

    /// Convert a node-reported coin amount into minor units.
    ///
    /// Nodes report amounts as decimal coins; rounding absorbs the binary
    /// floating point error.
    pub fn coins_to_minor(&self, coins: f64) -> u64 {
        if coins <= 0.0 {
            return 0;
        }
        (coins * self.coin as f64).round() as u64
    }

    /// Minor units as decimal coins (display helper only).
    pub fn minor_to_coins(&self, minor: u64) -> f64 {
        minor as f64 / self.coin as f64
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::stronghands()
    }
}
