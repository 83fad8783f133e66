//! Codec error types.

use thiserror::Error;

/// Errors raised while chunking or reassembling a payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The chunk size leaves no room for a body after the header.
    #[error("invalid chunk size {chunk_size}: must exceed header size {header_size}")]
    InvalidChunkSize {
        /// Requested framed chunk size.
        chunk_size: usize,
        /// Largest header the variant writes.
        header_size: usize,
    },

    /// Filename plus separator does not fit in the first chunk body.
    #[error("filename too large: {len} bytes, first chunk holds {capacity}")]
    FilenameTooLarge {
        /// Filename length including the separator.
        len: usize,
        /// Body capacity of the first chunk.
        capacity: usize,
    },

    /// Filename contains the separator byte.
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    /// More chunks than the nonce width can number.
    #[error("chunk count {count} exceeds nonce limit {max}")]
    ChunkLimitExceeded {
        /// Chunks the payload would need.
        count: u64,
        /// Ceiling for the variant.
        max: u64,
    },

    /// A frame is too short or otherwise unparseable.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Reassembled file does not match the checksum in its headers.
    #[error("checksum mismatch: header {expected:#018x}, computed {actual:#018x}")]
    ChecksumMismatch {
        /// Checksum carried by the frames.
        expected: u64,
        /// Checksum of the reassembled bytes.
        actual: u64,
    },

    /// A nonce below the highest seen nonce was never supplied.
    #[error("missing chunk {0}")]
    MissingChunk(u32),

    /// A frame belongs to a different message or file.
    #[error("frame {nonce} does not belong to this payload")]
    ContextMismatch {
        /// Nonce of the offending frame.
        nonce: u32,
    },
}
