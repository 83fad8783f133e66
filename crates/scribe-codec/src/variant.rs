//! Chunk variants and header layouts.
//!
//! All header integers are big-endian. Layouts:
//!
//! ```text
//! InlineMessage, nonce 0:  [nonce u8][message_id u64][scope_id u64][sub_scope_id u64][principal_id u64]
//! InlineMessage, nonce n:  [nonce u8][message_id u64]
//! FileBlob, any nonce:     [nonce u32][crc64 u64]
//! ```
//!
//! The first `FileBlob` body starts with the UTF-8 filename followed by
//! [`FILENAME_SEPARATOR`].

/// Header of every non-initial inline chunk: nonce + message id.
pub const INLINE_HEADER_SIZE: usize = 1 + 8;

/// Header of inline chunk 0: adds scope, sub-scope and principal ids.
pub const INLINE_INITIAL_HEADER_SIZE: usize = INLINE_HEADER_SIZE + 3 * 8;

/// Header of every file chunk: nonce + whole-file CRC-64.
pub const FILE_HEADER_SIZE: usize = 4 + 8;

/// Terminates the filename at the start of file chunk 0.
pub const FILENAME_SEPARATOR: u8 = b';';

/// Identifiers tying an inline message to its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MessageContext {
    /// Top-level scope (e.g. a server or guild).
    pub scope_id: u64,
    /// Scope within it (e.g. a channel).
    pub sub_scope_id: u64,
    /// Author of the message.
    pub principal_id: u64,
    /// Message identifier, repeated in every chunk.
    pub message_id: u64,
}

/// How a payload is framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkVariant {
    /// Short chat message: 1-byte nonce, at most 255 chunks.
    InlineMessage(MessageContext),
    /// Arbitrary file: 4-byte nonce and a CRC-64 of the whole file.
    FileBlob {
        /// Name stored in front of the first chunk body.
        filename: String,
    },
}

/// Variant discriminant without its payload metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    InlineMessage,
    FileBlob,
}

impl VariantKind {
    /// Header size of every chunk after the first.
    pub fn header_size(self) -> usize {
        match self {
            Self::InlineMessage => INLINE_HEADER_SIZE,
            Self::FileBlob => FILE_HEADER_SIZE,
        }
    }

    /// Header size of chunk 0.
    pub fn initial_header_size(self) -> usize {
        match self {
            Self::InlineMessage => INLINE_INITIAL_HEADER_SIZE,
            Self::FileBlob => FILE_HEADER_SIZE,
        }
    }

    /// Width of the nonce field in bytes.
    pub fn nonce_width(self) -> usize {
        match self {
            Self::InlineMessage => 1,
            Self::FileBlob => 4,
        }
    }

    /// Most chunks the nonce field can number.
    pub fn max_chunks(self) -> u64 {
        match self {
            Self::InlineMessage => u8::MAX as u64,
            Self::FileBlob => u32::MAX as u64,
        }
    }
}

impl ChunkVariant {
    pub fn kind(&self) -> VariantKind {
        match self {
            Self::InlineMessage(_) => VariantKind::InlineMessage,
            Self::FileBlob { .. } => VariantKind::FileBlob,
        }
    }

    /// Bytes at the start of chunk 0's body that are not payload.
    pub fn body_prefix(&self) -> Vec<u8> {
        match self {
            Self::InlineMessage(_) => Vec::new(),
            Self::FileBlob { filename } => {
                let mut prefix = Vec::with_capacity(filename.len() + 1);
                prefix.extend_from_slice(filename.as_bytes());
                prefix.push(FILENAME_SEPARATOR);
                prefix
            }
        }
    }

    /// Length of [`body_prefix`](Self::body_prefix) without allocating.
    pub fn body_prefix_len(&self) -> usize {
        match self {
            Self::InlineMessage(_) => 0,
            Self::FileBlob { filename } => filename.len() + 1,
        }
    }

    /// Encode the header for `nonce`. `checksum` is ignored for inline messages.
    pub(crate) fn encode_header(&self, nonce: u32, checksum: u64) -> Vec<u8> {
        match self {
            Self::InlineMessage(ctx) => {
                let first = nonce == 0;
                let mut header = Vec::with_capacity(if first {
                    INLINE_INITIAL_HEADER_SIZE
                } else {
                    INLINE_HEADER_SIZE
                });
                // Nonce fits: the chunker caps inline messages at 255 chunks.
                header.push(nonce as u8);
                header.extend_from_slice(&ctx.message_id.to_be_bytes());
                if first {
                    header.extend_from_slice(&ctx.scope_id.to_be_bytes());
                    header.extend_from_slice(&ctx.sub_scope_id.to_be_bytes());
                    header.extend_from_slice(&ctx.principal_id.to_be_bytes());
                }
                header
            }
            Self::FileBlob { .. } => {
                let mut header = Vec::with_capacity(FILE_HEADER_SIZE);
                header.extend_from_slice(&nonce.to_be_bytes());
                header.extend_from_slice(&checksum.to_be_bytes());
                header
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MessageContext {
        MessageContext {
            scope_id: 321_037_402_002_948_099,
            sub_scope_id: 321_037_402_002_948_099,
            principal_id: 66_153_853_824_802_816,
            message_id: 411_956_284_196_126_731,
        }
    }

    #[test]
    fn header_sizes() {
        assert_eq!(VariantKind::InlineMessage.header_size(), 9);
        assert_eq!(VariantKind::InlineMessage.initial_header_size(), 33);
        assert_eq!(VariantKind::FileBlob.header_size(), 12);
        assert_eq!(VariantKind::FileBlob.initial_header_size(), 12);
    }

    #[test]
    fn max_chunks_follow_nonce_width() {
        assert_eq!(VariantKind::InlineMessage.max_chunks(), 255);
        assert_eq!(VariantKind::FileBlob.max_chunks(), 4_294_967_295);
        assert_eq!(VariantKind::FileBlob.nonce_width(), 4);
    }

    #[test]
    fn inline_initial_header_layout() {
        let v = ChunkVariant::InlineMessage(ctx());
        let h = v.encode_header(0, 0);
        assert_eq!(h.len(), INLINE_INITIAL_HEADER_SIZE);
        assert_eq!(h[0], 0);
        assert_eq!(&h[1..9], &ctx().message_id.to_be_bytes());
        assert_eq!(&h[9..17], &ctx().scope_id.to_be_bytes());
        assert_eq!(&h[17..25], &ctx().sub_scope_id.to_be_bytes());
        assert_eq!(&h[25..33], &ctx().principal_id.to_be_bytes());
    }

    #[test]
    fn inline_subsequent_header_layout() {
        let v = ChunkVariant::InlineMessage(ctx());
        let h = v.encode_header(7, 0);
        assert_eq!(h.len(), INLINE_HEADER_SIZE);
        assert_eq!(h[0], 7);
        assert_eq!(&h[1..], &ctx().message_id.to_be_bytes());
    }

    #[test]
    fn file_header_layout() {
        let v = ChunkVariant::FileBlob {
            filename: "a.txt".into(),
        };
        let h = v.encode_header(0x0102_0304, 0xAABB_CCDD_EEFF_0011);
        assert_eq!(h, vec![1, 2, 3, 4, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x00, 0x11]);
    }

    #[test]
    fn file_prefix() {
        let v = ChunkVariant::FileBlob {
            filename: "a.txt".into(),
        };
        assert_eq!(v.body_prefix(), b"a.txt;".to_vec());
        assert_eq!(v.body_prefix_len(), 6);
        assert!(ChunkVariant::InlineMessage(ctx()).body_prefix().is_empty());
    }
}
