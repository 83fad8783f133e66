//! Base58check pay-to-pubkey-hash addresses.

use bitcoin::PubkeyHash;
use bitcoin::hashes::Hash;

use crate::constants::PUBKEY_HASH_LEN;
use crate::error::AddressError;
use crate::network::NetworkParams;

/// Decode an address into its 20-byte hash commitment, checking the
/// network's version byte.
pub fn decode_address(address: &str, network: &NetworkParams) -> Result<PubkeyHash, AddressError> {
    let decoded = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| AddressError::InvalidEncoding(e.to_string()))?;

    // version byte + hash
    if decoded.len() != PUBKEY_HASH_LEN + 1 {
        return Err(AddressError::InvalidLength(decoded.len()));
    }
    if decoded[0] != network.pubkey_hash_version {
        return Err(AddressError::WrongVersion {
            got: decoded[0],
            expected: network.pubkey_hash_version,
        });
    }

    let mut hash = [0u8; PUBKEY_HASH_LEN];
    hash.copy_from_slice(&decoded[1..]);
    Ok(PubkeyHash::from_byte_array(hash))
}

/// Encode a hash commitment as an address on `network`.
pub fn encode_address(hash: &PubkeyHash, network: &NetworkParams) -> String {
    bs58::encode(hash.to_byte_array())
        .with_check_version(network.pubkey_hash_version)
        .into_string()
}
