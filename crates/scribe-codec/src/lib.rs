//! # scribe-codec — payload chunking.
//!
//! Splits a payload into ordered, size-bounded, header-tagged chunks that
//! each fit one ledger transaction, and puts them back together.
//!
//! # Modules
//!
//! - [`error`] — `CodecError` enum
//! - [`variant`] — chunk variants and their header layouts
//! - [`checksum`] — CRC-64 over whole files
//! - [`chunker`] — lazy chunk iterator and suppression filter
//! - [`frame`] — frame decoding and reassembly

pub mod checksum;
pub mod chunker;
pub mod error;
pub mod frame;
pub mod variant;

pub use checksum::crc64;
pub use chunker::{Chunk, Chunker, Chunks, Unsuppressed, chunk_count, reassemble};
pub use error::CodecError;
pub use frame::{Frame, FrameHeader, Padding, Reassembled, Reassembler, decode_frame};
pub use variant::{ChunkVariant, MessageContext, VariantKind};
