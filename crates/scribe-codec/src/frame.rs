//! Decoding frames read back from the ledger.
//!
//! Frames are self-describing once the variant kind is known: inline chunk
//! 0 is recognised by its zero nonce, and file chunk 0 by the filename that
//! precedes the separator.

use std::collections::BTreeMap;

use crate::checksum::crc64;
use crate::error::CodecError;
use crate::variant::{
    ChunkVariant, FILE_HEADER_SIZE, FILENAME_SEPARATOR, INLINE_HEADER_SIZE,
    INLINE_INITIAL_HEADER_SIZE, MessageContext, VariantKind,
};

/// Parsed header of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameHeader {
    /// Inline chunk 0.
    InlineInitial(MessageContext),
    /// Any later inline chunk.
    Inline {
        message_id: u64,
    },
    /// Any file chunk.
    File {
        checksum: u64,
    },
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub nonce: u32,
    pub header: FrameHeader,
    pub body: Vec<u8>,
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_be_bytes(buf)
}

/// Parse a framed chunk of the given variant kind.
pub fn decode_frame(frame: &[u8], kind: VariantKind) -> Result<Frame, CodecError> {
    match kind {
        VariantKind::InlineMessage => {
            if frame.len() < INLINE_HEADER_SIZE {
                return Err(CodecError::MalformedFrame(format!(
                    "inline frame of {} bytes",
                    frame.len()
                )));
            }
            let nonce = frame[0] as u32;
            let message_id = read_u64(frame, 1);
            if nonce != 0 {
                return Ok(Frame {
                    nonce,
                    header: FrameHeader::Inline { message_id },
                    body: frame[INLINE_HEADER_SIZE..].to_vec(),
                });
            }
            if frame.len() < INLINE_INITIAL_HEADER_SIZE {
                return Err(CodecError::MalformedFrame(format!(
                    "initial inline frame of {} bytes",
                    frame.len()
                )));
            }
            Ok(Frame {
                nonce,
                header: FrameHeader::InlineInitial(MessageContext {
                    message_id,
                    scope_id: read_u64(frame, 9),
                    sub_scope_id: read_u64(frame, 17),
                    principal_id: read_u64(frame, 25),
                }),
                body: frame[INLINE_INITIAL_HEADER_SIZE..].to_vec(),
            })
        }
        VariantKind::FileBlob => {
            if frame.len() < FILE_HEADER_SIZE {
                return Err(CodecError::MalformedFrame(format!(
                    "file frame of {} bytes",
                    frame.len()
                )));
            }
            let nonce = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
            Ok(Frame {
                nonce,
                header: FrameHeader::File {
                    checksum: read_u64(frame, 4),
                },
                body: frame[FILE_HEADER_SIZE..].to_vec(),
            })
        }
    }
}

/// A payload rebuilt from its frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    /// Variant recovered from chunk 0.
    pub variant: ChunkVariant,
    pub payload: Vec<u8>,
}

/// Zero padding added when frames were written in fixed-size groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Padding {
    /// Length of every frame but the last: the chunk size of the run.
    pub frame_len: usize,
    /// Each frame was zero-padded up to a multiple of this many bytes.
    pub group: usize,
}

/// Collects frames in any order and rebuilds the payload.
///
/// Frames carry no total count, so a missing tail cannot be detected for
/// inline messages; files are protected by their checksum.
#[derive(Debug)]
pub struct Reassembler {
    kind: VariantKind,
    padding: Option<Padding>,
    frames: BTreeMap<u32, Frame>,
}

impl Reassembler {
    pub fn new(kind: VariantKind) -> Self {
        Self {
            kind,
            padding: None,
            frames: BTreeMap::new(),
        }
    }

    /// Reassembler for frames read back zero-padded.
    ///
    /// Frames longer than `padding.frame_len` are cut back to it. The last
    /// frame's padding is then removed on [`finish`](Self::finish): files
    /// drop the trailing zeros the checksum says are not theirs, inline
    /// messages drop up to `group - 1` trailing zeros. An inline message
    /// whose own last bytes are zero cannot be told apart from padding and
    /// loses them.
    pub fn with_padding(kind: VariantKind, padding: Padding) -> Self {
        Self {
            padding: Some(padding),
            ..Self::new(kind)
        }
    }

    /// Number of distinct frames accepted so far.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Accept one framed chunk, returning its nonce.
    ///
    /// Re-pushing an identical frame is a no-op; a frame that disagrees with
    /// the ones already held is rejected.
    pub fn push(&mut self, frame: &[u8]) -> Result<u32, CodecError> {
        let frame = match self.padding {
            Some(p) if frame.len() > p.frame_len => &frame[..p.frame_len],
            _ => frame,
        };
        let decoded = decode_frame(frame, self.kind)?;
        let nonce = decoded.nonce;

        if let Some(existing) = self.frames.get(&nonce) {
            return if *existing == decoded {
                Ok(nonce)
            } else {
                Err(CodecError::ContextMismatch { nonce })
            };
        }
        if let Some(reference) = self.frames.values().next() {
            if identity(&reference.header) != identity(&decoded.header) {
                return Err(CodecError::ContextMismatch { nonce });
            }
        }

        self.frames.insert(nonce, decoded);
        Ok(nonce)
    }

    /// Rebuild the payload. Requires chunk 0 and no gaps below the highest nonce.
    pub fn finish(self) -> Result<Reassembled, CodecError> {
        for (expected, nonce) in self.frames.keys().enumerate() {
            let expected = expected as u32;
            if *nonce != expected {
                return Err(CodecError::MissingChunk(expected));
            }
        }
        let first = self.frames.get(&0).ok_or(CodecError::MissingChunk(0))?;

        let mut payload: Vec<u8> = Vec::new();
        match first.header {
            FrameHeader::InlineInitial(ctx) => {
                for frame in self.frames.values() {
                    payload.extend_from_slice(&frame.body);
                }
                if let Some(p) = self.padding {
                    let zeros = trailing_zeros(&payload, p.group.saturating_sub(1));
                    payload.truncate(payload.len() - zeros);
                }
                Ok(Reassembled {
                    variant: ChunkVariant::InlineMessage(ctx),
                    payload,
                })
            }
            FrameHeader::File { checksum } => {
                let split = first
                    .body
                    .iter()
                    .position(|b| *b == FILENAME_SEPARATOR)
                    .ok_or_else(|| CodecError::MalformedFrame("missing filename separator".into()))?;
                let filename = String::from_utf8(first.body[..split].to_vec())
                    .map_err(|_| CodecError::MalformedFrame("filename is not UTF-8".into()))?;

                payload.extend_from_slice(&first.body[split + 1..]);
                for frame in self.frames.values().skip(1) {
                    payload.extend_from_slice(&frame.body);
                }

                let actual = crc64(&payload);
                if actual != checksum {
                    let max = self.padding.map_or(0, |p| p.group.saturating_sub(1));
                    let zeros = trailing_zeros(&payload, max);
                    let unpadded = (1..=zeros)
                        .map(|k| payload.len() - k)
                        .find(|len| crc64(&payload[..*len]) == checksum)
                        .ok_or(CodecError::ChecksumMismatch {
                            expected: checksum,
                            actual,
                        })?;
                    payload.truncate(unpadded);
                }
                Ok(Reassembled {
                    variant: ChunkVariant::FileBlob { filename },
                    payload,
                })
            }
            FrameHeader::Inline { .. } => Err(CodecError::MalformedFrame(
                "inline chunk 0 without initial header".into(),
            )),
        }
    }
}

/// Count of zero bytes ending `bytes`, at most `max`.
fn trailing_zeros(bytes: &[u8], max: usize) -> usize {
    bytes.iter().rev().take(max).take_while(|b| **b == 0).count()
}

/// The value every frame of one payload shares.
fn identity(header: &FrameHeader) -> u64 {
    match header {
        FrameHeader::InlineInitial(ctx) => ctx.message_id,
        FrameHeader::Inline { message_id } => *message_id,
        FrameHeader::File { checksum } => *checksum,
    }
}
