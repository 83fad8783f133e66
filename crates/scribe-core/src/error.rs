//! Error types shared across Scribe crates.
use thiserror::Error;

/// Failure talking to the ledger node.
///
/// The caller decides what to do with each class: transient failures are
/// worth retrying with backoff, fatal ones are not.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// Network-level failure (timeout, connection reset, node restarting).
    #[error("transient RPC failure: {0}")]
    Transient(String),
    /// The node understood the request and rejected it.
    #[error("RPC call rejected: {0}")]
    Fatal(String),
}

impl RpcError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A funding address that cannot be used on the configured network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// Not base58, or the 4-byte checksum does not match.
    #[error("invalid base58check encoding: {0}")]
    InvalidEncoding(String),
    /// Decoded payload is not a version byte plus a 20-byte hash.
    #[error("invalid length: {0}")]
    InvalidLength(usize),
    /// Version byte belongs to another network or address type.
    #[error("wrong version byte: got {got:#04x}, expected {expected:#04x}")]
    WrongVersion { got: u8, expected: u8 },
}
