//! Whole-file checksum carried in every `FileBlob` header.

use crc::{CRC_64_XZ, Crc};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// CRC-64 (ECMA-182 polynomial, XZ parameters) of `data`.
pub fn crc64(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}
