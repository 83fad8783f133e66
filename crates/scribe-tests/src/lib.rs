//! End-to-end test support for Scribe.
//!
//! [`ledger::MemoryLedger`] stands in for the node: it keeps a UTXO set,
//! "signs" by checking inputs exist and applies broadcast transactions.
//! The suites under `tests/` drive whole embedding runs against it and read
//! the data back off the resulting transactions.

pub mod helpers;
pub mod ledger;
