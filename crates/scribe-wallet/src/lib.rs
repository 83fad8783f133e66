//! # scribe-wallet — funding data-carrying transactions.
//!
//! Turns chunks into outputs, decides how to shape the wallet's change,
//! selects inputs and enforces the value-conservation invariant before a
//! transaction is serialized.
//!
//! # Modules
//!
//! - [`error`] — `WalletError` enum
//! - [`fee`] — linear fee model and the per-transaction fee cap
//! - [`planner`] — null-data and address-encoding output strategies
//! - [`change`] — split/consolidate change policy
//! - [`coin_selection`] — greedy input selection
//! - [`builder`] — draft construction, validation and serialization
//! - [`config`] — `EmbedConfig`
//! - [`embedder`] — the per-chunk orchestration loop
//! - [`dry_run`] — overlay ledger for previewing a run

pub mod builder;
pub mod change;
pub mod coin_selection;
pub mod config;
pub mod dry_run;
pub mod embedder;
pub mod error;
pub mod fee;
pub mod planner;

// Re-exports for convenient access
pub use builder::{TransactionBuilder, TransactionDraft, deserialize_transaction, serialize_transaction};
pub use change::{ChangeMode, ChangePlan, ChangePolicy};
pub use coin_selection::{CoinSelection, CoinSelector, InputOrdering};
pub use config::EmbedConfig;
pub use dry_run::DryRunLedger;
pub use embedder::{EmbedRequest, EmbeddedTransaction, Embedder, embed};
pub use error::WalletError;
pub use fee::FeeModel;
pub use planner::{AddressEncodingStrategy, NullDataStrategy, OutputStrategy, strategy_for};
