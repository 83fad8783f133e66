//! Embedding configuration.

use serde::{Deserialize, Serialize};

use scribe_core::constants::DEFAULT_CHUNK_SIZE;
use scribe_core::network::NetworkParams;

use crate::change::ChangePolicy;
use crate::fee::FeeModel;

/// Everything the embedding engine needs besides the payload and the
/// ledger client. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    /// Bytes per chunk, header included.
    pub chunk_size: usize,
    /// Encode data as pseudo pay-to-pubkey-hash outputs instead of
    /// `OP_RETURN`.
    pub use_address_encoding: bool,
    pub fee: FeeModel,
    pub change: ChangePolicy,
    pub network: NetworkParams,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            use_address_encoding: false,
            fee: FeeModel::default(),
            change: ChangePolicy::default(),
            network: NetworkParams::default(),
        }
    }
}
