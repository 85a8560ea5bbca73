//! Table-driven MPEG CRC-32 (poly `0x04C11DB7`, init `0xFFFFFFFF`, MSB-first, no reflection, no
//! final XOR) — exactly [`crc::CRC_32_MPEG_2`], which this family of crates already depends on.

use crc::{Crc, CRC_32_MPEG_2};

pub(crate) const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Computes the MPEG CRC-32 over `bytes`.
pub(crate) fn compute(bytes: &[u8]) -> u32 {
    CRC.checksum(bytes)
}
