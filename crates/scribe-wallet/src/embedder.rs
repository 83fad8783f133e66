//! The embedding loop: one transaction per chunk.
//!
//! ```text
//! Embedder::new ──► pre-flight (address, chunk limits, fee estimate vs balance)
//!       │
//!       ▼
//! next_transaction ──► chunk ──► data outputs ──► list_unspent ──► draft ──► hex
//!       │                                                          │
//!       └──────────── caller signs and broadcasts ◄────────────────┘
//! ```
//!
//! Each draft spends the change of the previous one, so the caller must get
//! a transaction accepted by the node before asking for the next. Any error
//! halts the run for good.

use std::collections::BTreeSet;

use bitcoin::ScriptBuf;
use bytes::Bytes;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info};

use scribe_codec::{Chunk, ChunkVariant, Chunker, Chunks, Unsuppressed};
use scribe_core::address::decode_address;
use scribe_core::traits::LedgerClient;

use crate::builder::TransactionBuilder;
use crate::change::ChangeMode;
use crate::config::EmbedConfig;
use crate::error::WalletError;
use crate::fee::FeeModel;
use crate::planner::{OutputStrategy, pay_to_pubkey_hash_script, strategy_for};

/// What to embed and where the funds come from.
#[derive(Debug, Clone)]
pub struct EmbedRequest {
    pub payload: Bytes,
    pub variant: ChunkVariant,
    /// Funding address; also receives all change.
    pub address: String,
    /// Nonces already on the ledger, skipped without renumbering.
    pub suppressed: BTreeSet<u32>,
}

impl EmbedRequest {
    pub fn new(payload: impl Into<Bytes>, variant: ChunkVariant, address: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            variant,
            address: address.into(),
            suppressed: BTreeSet::new(),
        }
    }

    /// Skip the given nonces.
    pub fn suppress(mut self, nonces: impl IntoIterator<Item = u32>) -> Self {
        self.suppressed.extend(nonces);
        self
    }
}

/// An unsigned transaction carrying one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedTransaction {
    pub nonce: u32,
    /// Serialized unsigned transaction, hex-encoded.
    pub tx_hex: String,
    pub fee: u64,
    pub input_count: usize,
    pub output_count: usize,
    pub change_mode: ChangeMode,
    /// Timestamp written after the version, on ledgers that carry one.
    pub timestamp: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Running,
    Finished,
    Halted,
}

fn unix_now() -> u32 {
    chrono::Utc::now().timestamp().clamp(0, u32::MAX as i64) as u32
}

/// Drives an embedding run chunk by chunk.
pub struct Embedder<'a> {
    config: EmbedConfig,
    ledger: &'a dyn LedgerClient,
    strategy: Box<dyn OutputStrategy>,
    address: String,
    change_script: ScriptBuf,
    chunks: Unsuppressed<Chunks>,
    total_chunks: u64,
    emitted: u64,
    rng: StdRng,
    clock: fn() -> u32,
    state: RunState,
}

impl<'a> Embedder<'a> {
    /// Validate the request and check the wallet can plausibly afford it.
    ///
    /// Nothing is built here; the first transaction comes from
    /// [`next_transaction`](Self::next_transaction).
    pub async fn new(
        config: EmbedConfig,
        ledger: &'a dyn LedgerClient,
        request: EmbedRequest,
    ) -> Result<Self, WalletError> {
        let hash = decode_address(&request.address, &config.network)?;
        let change_script = pay_to_pubkey_hash_script(&hash);

        let chunker = Chunker::new(request.payload, request.variant, config.chunk_size)?;
        let strategy = strategy_for(config.use_address_encoding);

        let estimate = estimate_cost(&chunker, &request.suppressed, &config.fee, strategy.as_ref())?;
        let balance = ledger.get_balance(&request.address).await?;
        if estimate > 0 && estimate >= balance {
            return Err(WalletError::InsufficientFunds {
                have: balance,
                need: estimate,
            });
        }

        info!(
            address = %request.address,
            chunks = chunker.chunk_count(),
            suppressed = request.suppressed.len(),
            strategy = strategy.name(),
            estimate,
            balance,
            "embedding run ready"
        );

        let total_chunks = chunker.chunk_count();
        Ok(Self {
            config,
            ledger,
            strategy,
            address: request.address,
            change_script,
            chunks: Unsuppressed::new(chunker.into_iter(), request.suppressed),
            total_chunks,
            emitted: 0,
            rng: StdRng::from_entropy(),
            clock: unix_now,
            state: RunState::Running,
        })
    }

    /// Replace the RNG that shuffles inputs.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Replace the source of embedded timestamps.
    pub fn with_clock(mut self, clock: fn() -> u32) -> Self {
        self.clock = clock;
        self
    }

    /// Chunks the payload was split into, suppressed ones included.
    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Transactions produced so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Suppressed chunks passed over so far.
    pub fn skipped(&self) -> usize {
        self.chunks.skipped()
    }

    pub fn is_finished(&self) -> bool {
        self.state == RunState::Finished
    }

    pub fn is_halted(&self) -> bool {
        self.state == RunState::Halted
    }

    /// Build the transaction for the next unsuppressed chunk.
    ///
    /// Returns `Ok(None)` once every chunk is done. After an error every
    /// call returns [`WalletError::Halted`].
    pub async fn next_transaction(&mut self) -> Result<Option<EmbeddedTransaction>, WalletError> {
        match self.state {
            RunState::Finished => return Ok(None),
            RunState::Halted => return Err(WalletError::Halted),
            RunState::Running => {}
        }

        let Some(chunk) = self.chunks.next() else {
            self.state = RunState::Finished;
            info!(
                emitted = self.emitted,
                skipped = self.chunks.skipped(),
                "embedding run finished"
            );
            return Ok(None);
        };

        let nonce = chunk.nonce;
        match self.emit(chunk).await {
            Ok(tx) => {
                self.emitted += 1;
                Ok(Some(tx))
            }
            Err(e) => {
                self.state = RunState::Halted;
                error!(nonce, error = %e, "embedding run halted");
                Err(e)
            }
        }
    }

    async fn emit(&mut self, chunk: Chunk) -> Result<EmbeddedTransaction, WalletError> {
        let frame = chunk.frame();
        let fee = self.config.fee.fee(frame.len());
        let data_outputs = self.strategy.plan(&frame, self.config.fee.per_output_fee)?;

        let balances = self.ledger.list_unspent(&self.address).await?;
        if balances.is_empty() {
            return Err(WalletError::NoUtxos(self.address.clone()));
        }
        debug!(nonce = chunk.nonce, balances = balances.len(), "queried balances");

        let draft = TransactionBuilder::new(self.change_script.clone())
            .add_outputs(data_outputs)
            .set_fee(fee)
            .set_fee_model(self.config.fee)
            .set_change_policy(self.config.change)
            .build(&balances, &mut self.rng)?;

        let timestamp = self.config.network.embed_timestamp.then(|| (self.clock)());
        let tx_hex = draft.to_hex(timestamp);

        info!(
            nonce = chunk.nonce,
            of = self.total_chunks,
            inputs = draft.inputs.len(),
            outputs = draft.outputs.len(),
            fee,
            "chunk transaction built"
        );

        Ok(EmbeddedTransaction {
            nonce: chunk.nonce,
            tx_hex,
            fee,
            input_count: draft.inputs.len(),
            output_count: draft.outputs.len(),
            change_mode: draft.change_mode,
            timestamp,
        })
    }
}

/// Start an embedding run. Shorthand for [`Embedder::new`].
pub async fn embed<'a>(
    config: EmbedConfig,
    ledger: &'a dyn LedgerClient,
    request: EmbedRequest,
) -> Result<Embedder<'a>, WalletError> {
    Embedder::new(config, ledger, request).await
}

/// Fees plus data-output values over every unsuppressed chunk.
fn estimate_cost(
    chunker: &Chunker,
    suppressed: &BTreeSet<u32>,
    fee: &FeeModel,
    strategy: &dyn OutputStrategy,
) -> Result<u64, WalletError> {
    let mut total: u64 = 0;
    for chunk in chunker.chunks().filter(|c| !suppressed.contains(&c.nonce)) {
        let len = chunk.frame_len();
        let cost = fee
            .fee(len)
            .checked_add(fee.output_value(strategy.output_count(len)))
            .ok_or(WalletError::ValueOverflow)?;
        total = total.checked_add(cost).ok_or(WalletError::ValueOverflow)?;
    }
    Ok(total)
}
