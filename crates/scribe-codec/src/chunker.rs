//! Lazy payload chunking.
//!
//! A [`Chunker`] validates the payload against its variant once, up front:
//! bad chunk sizes, oversize filenames and nonce overflow are reported
//! before a single chunk exists. Iterating it yields chunks in strictly
//! ascending nonce order starting at 0.

use std::collections::BTreeSet;

use bytes::{Bytes, BytesMut};

use crate::checksum::crc64;
use crate::error::CodecError;
use crate::variant::{ChunkVariant, FILENAME_SEPARATOR};

/// One framed piece of a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Sequence number, starting at 0.
    pub nonce: u32,
    /// Encoded header for this nonce.
    pub header: Vec<u8>,
    /// Body bytes. For file chunk 0 this starts with `filename;`.
    pub body: Bytes,
}

impl Chunk {
    pub fn is_first(&self) -> bool {
        self.nonce == 0
    }

    /// Header followed by body, as written to the ledger.
    pub fn frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.frame_len());
        frame.extend_from_slice(&self.header);
        frame.extend_from_slice(&self.body);
        frame
    }

    pub fn frame_len(&self) -> usize {
        self.header.len() + self.body.len()
    }
}

/// Per-chunk payload capacities for a variant and chunk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    /// Payload bytes carried by chunk 0, after any body prefix.
    first_capacity: usize,
    /// Payload bytes carried by every later chunk.
    body: usize,
}

impl Layout {
    fn new(variant: &ChunkVariant, chunk_size: usize) -> Result<Self, CodecError> {
        let kind = variant.kind();
        let header_size = kind.initial_header_size().max(kind.header_size());
        if chunk_size <= header_size {
            return Err(CodecError::InvalidChunkSize {
                chunk_size,
                header_size,
            });
        }

        if let ChunkVariant::FileBlob { filename } = variant {
            if filename.as_bytes().contains(&FILENAME_SEPARATOR) {
                return Err(CodecError::InvalidFilename(filename.clone()));
            }
        }

        let body = chunk_size - kind.header_size();
        let first_body = chunk_size - kind.initial_header_size();
        let prefix = variant.body_prefix_len();
        if prefix > first_body {
            return Err(CodecError::FilenameTooLarge {
                len: prefix,
                capacity: first_body,
            });
        }

        Ok(Self {
            first_capacity: first_body - prefix,
            body,
        })
    }

    /// Chunks needed for `len` payload bytes. Always at least one: chunk 0
    /// carries the metadata even for an empty payload.
    fn count(&self, len: usize) -> u64 {
        if len <= self.first_capacity {
            1
        } else {
            1 + (len - self.first_capacity).div_ceil(self.body) as u64
        }
    }
}

/// Number of chunks a payload of `payload_len` bytes splits into.
///
/// Equal to `ceil((prefix + payload_len) / body)` for files and to
/// `1 + ceil((payload_len - first_body) / body)` for longer inline messages.
/// Does not check the nonce ceiling; [`Chunker::new`] does.
pub fn chunk_count(
    payload_len: usize,
    variant: &ChunkVariant,
    chunk_size: usize,
) -> Result<u64, CodecError> {
    Ok(Layout::new(variant, chunk_size)?.count(payload_len))
}

/// Validated payload, ready to be iterated as chunks.
///
/// Cheap to clone: the payload is reference-counted.
#[derive(Debug, Clone)]
pub struct Chunker {
    payload: Bytes,
    variant: ChunkVariant,
    chunk_size: usize,
    layout: Layout,
    checksum: u64,
    count: u64,
}

impl Chunker {
    /// Validate `payload` for `variant` framed into `chunk_size`-byte chunks.
    pub fn new(
        payload: impl Into<Bytes>,
        variant: ChunkVariant,
        chunk_size: usize,
    ) -> Result<Self, CodecError> {
        let payload = payload.into();
        let layout = Layout::new(&variant, chunk_size)?;

        let count = layout.count(payload.len());
        let max = variant.kind().max_chunks();
        if count > max {
            return Err(CodecError::ChunkLimitExceeded { count, max });
        }

        let checksum = match variant {
            ChunkVariant::FileBlob { .. } => crc64(&payload),
            ChunkVariant::InlineMessage(_) => 0,
        };

        Ok(Self {
            payload,
            variant,
            chunk_size,
            layout,
            checksum,
            count,
        })
    }

    pub fn chunk_count(&self) -> u64 {
        self.count
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn variant(&self) -> &ChunkVariant {
        &self.variant
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whole-file CRC-64, for `FileBlob` payloads.
    pub fn checksum(&self) -> Option<u64> {
        match self.variant {
            ChunkVariant::FileBlob { .. } => Some(self.checksum),
            ChunkVariant::InlineMessage(_) => None,
        }
    }

    /// Iterate chunks from nonce 0. Restarting means calling this again.
    pub fn chunks(&self) -> Chunks {
        Chunks {
            chunker: self.clone(),
            next: 0,
            offset: 0,
        }
    }
}

impl IntoIterator for Chunker {
    type Item = Chunk;
    type IntoIter = Chunks;

    fn into_iter(self) -> Chunks {
        Chunks {
            chunker: self,
            next: 0,
            offset: 0,
        }
    }
}

/// Iterator over the chunks of a [`Chunker`].
#[derive(Debug, Clone)]
pub struct Chunks {
    chunker: Chunker,
    next: u64,
    offset: usize,
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        let c = &self.chunker;
        if self.next >= c.count {
            return None;
        }
        // count <= max_chunks <= u32::MAX
        let nonce = self.next as u32;

        let capacity = if nonce == 0 {
            c.layout.first_capacity
        } else {
            c.layout.body
        };
        let end = self.offset.saturating_add(capacity).min(c.payload.len());
        let slice = c.payload.slice(self.offset..end);

        let body = if nonce == 0 && c.variant.body_prefix_len() > 0 {
            let prefix = c.variant.body_prefix();
            let mut buf = BytesMut::with_capacity(prefix.len() + slice.len());
            buf.extend_from_slice(&prefix);
            buf.extend_from_slice(&slice);
            buf.freeze()
        } else {
            slice
        };

        let chunk = Chunk {
            nonce,
            header: c.variant.encode_header(nonce, c.checksum),
            body,
        };

        self.offset = end;
        self.next += 1;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.chunker.count - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

/// Drops chunks whose nonce is in a suppression set, leaving numbering
/// untouched. Used to resume a partially embedded payload.
#[derive(Debug, Clone)]
pub struct Unsuppressed<I> {
    inner: I,
    suppressed: BTreeSet<u32>,
    skipped: usize,
}

impl<I> Unsuppressed<I> {
    pub fn new(inner: I, suppressed: BTreeSet<u32>) -> Self {
        Self {
            inner,
            suppressed,
            skipped: 0,
        }
    }

    /// Chunks skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<I: Iterator<Item = Chunk>> Iterator for Unsuppressed<I> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        loop {
            let chunk = self.inner.next()?;
            if self.suppressed.contains(&chunk.nonce) {
                self.skipped += 1;
                continue;
            }
            return Some(chunk);
        }
    }
}

/// Concatenate chunk bodies in nonce order, stripping the filename prefix
/// from file chunk 0.
pub fn reassemble<'a>(
    chunks: impl IntoIterator<Item = &'a Chunk>,
    variant: &ChunkVariant,
) -> Vec<u8> {
    let mut ordered: Vec<&Chunk> = chunks.into_iter().collect();
    ordered.sort_by_key(|c| c.nonce);

    let prefix = variant.body_prefix_len();
    let mut out = Vec::with_capacity(ordered.iter().map(|c| c.body.len()).sum());
    for chunk in ordered {
        if chunk.is_first() {
            out.extend_from_slice(&chunk.body[prefix.min(chunk.body.len())..]);
        } else {
            out.extend_from_slice(&chunk.body);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{MessageContext, VariantKind};
    use proptest::prelude::*;

    fn inline() -> ChunkVariant {
        ChunkVariant::InlineMessage(MessageContext {
            scope_id: 1,
            sub_scope_id: 2,
            principal_id: 3,
            message_id: 4,
        })
    }

    fn file(name: &str) -> ChunkVariant {
        ChunkVariant::FileBlob {
            filename: name.to_string(),
        }
    }

    #[test]
    fn inline_hundred_bytes_in_eighty_byte_chunks() {
        let payload = vec![b'x'; 100];
        let chunker = Chunker::new(payload.clone(), inline(), 80).unwrap();
        assert_eq!(chunker.chunk_count(), 2);

        let chunks: Vec<Chunk> = chunker.chunks().collect();
        assert_eq!(chunks.iter().map(|c| c.nonce).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(chunks[0].body.len(), 80 - 33);
        assert_eq!(chunks[1].body.len(), 100 - 47);
        assert!(chunks[1].body.len() <= 80 - 9);
        assert_eq!(chunks[0].frame_len(), 80);
        assert_eq!(reassemble(&chunks, &inline()), payload);
    }

    #[test]
    fn file_2050_bytes_in_kilobyte_chunks() {
        let payload: Vec<u8> = (0..2050u32).map(|i| (i % 251) as u8).collect();
        let variant = file("notes.txt");
        let chunker = Chunker::new(payload.clone(), variant.clone(), 1024).unwrap();

        // body = 1024 - 12 = 1012; chunk 0 spends 10 bytes on "notes.txt;"
        assert_eq!(chunker.chunk_count(), 3);
        let chunks: Vec<Chunk> = chunker.chunks().collect();
        assert_eq!(chunks[0].body.len(), 1012);
        assert!(chunks[0].body.starts_with(b"notes.txt;"));
        assert_eq!(&chunks[0].body[10..], &payload[..1002]);
        assert_eq!(chunks[1].body.len(), 1012);
        assert_eq!(chunks[2].body.len(), 2050 - 1002 - 1012);
        assert!(chunks.iter().all(|c| c.frame_len() <= 1024));
        assert_eq!(reassemble(&chunks, &variant), payload);
    }

    #[test]
    fn file_headers_carry_checksum() {
        let payload = b"hello world".to_vec();
        let chunker = Chunker::new(payload.clone(), file("h"), 16).unwrap();
        let sum = crc64(&payload);
        assert_eq!(chunker.checksum(), Some(sum));
        for chunk in chunker.chunks() {
            assert_eq!(&chunk.header[..4], &chunk.nonce.to_be_bytes());
            assert_eq!(&chunk.header[4..], &sum.to_be_bytes());
        }
    }

    #[test]
    fn chunk_size_equal_to_header_rejected() {
        let err = Chunker::new(vec![1u8; 10], inline(), 9).unwrap_err();
        assert_eq!(
            err,
            CodecError::InvalidChunkSize {
                chunk_size: 9,
                header_size: 33
            }
        );
        let err = Chunker::new(vec![1u8; 10], file("f"), 12).unwrap_err();
        assert!(matches!(err, CodecError::InvalidChunkSize { .. }));
    }

    #[test]
    fn inline_limit_enforced() {
        // chunk 0 carries 1 byte, later chunks 25 bytes each.
        let size = 34;
        let fits = 1 + 25 * 254;
        assert_eq!(chunk_count(fits, &inline(), size).unwrap(), 255);
        assert!(Chunker::new(vec![0u8; fits], inline(), size).is_ok());

        let err = Chunker::new(vec![0u8; fits + 1], inline(), size).unwrap_err();
        assert_eq!(err, CodecError::ChunkLimitExceeded { count: 256, max: 255 });
    }

    #[test]
    fn last_inline_nonce_is_254() {
        let chunker = Chunker::new(vec![0u8; 1 + 25 * 254], inline(), 34).unwrap();
        assert_eq!(chunker.chunks().last().unwrap().nonce, 254);
    }

    #[test]
    fn filename_must_fit_first_chunk() {
        let name = "x".repeat(20);
        let err = Chunker::new(vec![0u8; 5], file(&name), 32).unwrap_err();
        assert_eq!(err, CodecError::FilenameTooLarge { len: 21, capacity: 20 });

        // exactly filling chunk 0 is fine: the payload starts in chunk 1
        let chunker = Chunker::new(vec![7u8; 5], file(&"x".repeat(19)), 32).unwrap();
        let chunks: Vec<Chunk> = chunker.chunks().collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].body.len(), 20);
        assert_eq!(chunks[1].body.as_ref(), &[7u8; 5]);
    }

    #[test]
    fn filename_with_separator_rejected() {
        let err = Chunker::new(vec![0u8; 5], file("a;b"), 64).unwrap_err();
        assert_eq!(err, CodecError::InvalidFilename("a;b".into()));
    }

    #[test]
    fn empty_payload_yields_one_chunk() {
        let chunks: Vec<Chunk> = Chunker::new(Vec::new(), inline(), 80).unwrap().chunks().collect();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].body.is_empty());
        assert_eq!(chunks[0].header.len(), 33);

        let chunks: Vec<Chunk> = Chunker::new(Vec::new(), file("e"), 80).unwrap().chunks().collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].body.as_ref(), b"e;");
    }

    #[test]
    fn chunks_restart_from_zero() {
        let chunker = Chunker::new(vec![1u8; 200], inline(), 40).unwrap();
        let first: Vec<Chunk> = chunker.chunks().collect();
        let second: Vec<Chunk> = chunker.chunks().collect();
        assert_eq!(first, second);
        assert_eq!(chunker.chunks().size_hint(), (first.len(), Some(first.len())));
    }

    #[test]
    fn suppression_keeps_numbering() {
        let chunker = Chunker::new(vec![1u8; 200], inline(), 40).unwrap();
        let total = chunker.chunk_count() as usize;
        let suppressed: BTreeSet<u32> = [0, 2].into_iter().collect();
        let mut kept = Unsuppressed::new(chunker.chunks(), suppressed);
        let nonces: Vec<u32> = kept.by_ref().map(|c| c.nonce).collect();
        assert_eq!(nonces[0], 1);
        assert!(!nonces.contains(&2));
        assert_eq!(nonces.len(), total - 2);
        assert_eq!(kept.skipped(), 2);
    }

    #[test]
    fn reassemble_sorts_by_nonce() {
        let chunker = Chunker::new(b"abcdefghijklmnopqrstuvwxyz".to_vec(), file("z"), 16).unwrap();
        let mut chunks: Vec<Chunk> = chunker.chunks().collect();
        chunks.reverse();
        assert_eq!(
            reassemble(&chunks, chunker.variant()),
            b"abcdefghijklmnopqrstuvwxyz".to_vec()
        );
    }

    fn variant_strategy() -> impl Strategy<Value = ChunkVariant> {
        prop_oneof![
            any::<(u64, u64, u64, u64)>().prop_map(|(a, b, c, d)| ChunkVariant::InlineMessage(
                MessageContext {
                    scope_id: a,
                    sub_scope_id: b,
                    principal_id: c,
                    message_id: d,
                }
            )),
            "[a-z0-9._-]{0,12}".prop_map(|filename| ChunkVariant::FileBlob { filename }),
        ]
    }

    proptest! {
        #[test]
        fn roundtrip(
            payload in prop::collection::vec(any::<u8>(), 0..2048),
            variant in variant_strategy(),
            chunk_size in 48usize..256,
        ) {
            let chunker = Chunker::new(payload.clone(), variant.clone(), chunk_size).unwrap();
            let chunks: Vec<Chunk> = chunker.chunks().collect();
            prop_assert_eq!(chunks.len() as u64, chunker.chunk_count());
            for (i, chunk) in chunks.iter().enumerate() {
                prop_assert_eq!(chunk.nonce as usize, i);
                prop_assert!(chunk.frame_len() <= chunk_size);
            }
            prop_assert_eq!(reassemble(&chunks, &variant), payload);
        }

        #[test]
        fn count_monotonic_in_payload(
            a in 0usize..100_000,
            b in 0usize..100_000,
            variant in variant_strategy(),
            chunk_size in 48usize..2048,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let c_lo = chunk_count(lo, &variant, chunk_size).unwrap();
            let c_hi = chunk_count(hi, &variant, chunk_size).unwrap();
            prop_assert!(c_lo <= c_hi);
        }

        #[test]
        fn count_antitone_in_chunk_size(
            len in 0usize..100_000,
            a in 48usize..4096,
            b in 48usize..4096,
            variant in variant_strategy(),
        ) {
            let (small, large) = if a <= b { (a, b) } else { (b, a) };
            let c_small = chunk_count(len, &variant, small).unwrap();
            let c_large = chunk_count(len, &variant, large).unwrap();
            prop_assert!(c_large <= c_small);
        }

        #[test]
        fn oversized_payload_never_chunks(extra in 1usize..64) {
            let kind = VariantKind::InlineMessage;
            let size = 40;
            let first = size - kind.initial_header_size();
            let body = size - kind.header_size();
            let len = first + body * 254 + extra;
            let err = Chunker::new(vec![0u8; len], inline(), size).unwrap_err();
            let is_limit = matches!(err, CodecError::ChunkLimitExceeded { .. });
            prop_assert!(is_limit);
        }
    }
}
