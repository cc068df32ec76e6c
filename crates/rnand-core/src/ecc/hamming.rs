//! Software Hamming ECC over 256-byte chunks
//!
//! This is the SmartMedia-style code used by most software NAND stacks:
//! each 256-byte chunk yields 22 parity bits packed into 3 bytes.
//!
//! - 16 line parity bits: for every bit `k` of the byte index, the parity
//!   of all bytes whose index has bit `k` set (odd) or clear (even).
//! - 6 column parity bits over the bit positions of all bytes combined.
//!
//! The result is stored inverted so that an erased chunk (all 0xFF) has an
//! erased ECC (0xFF 0xFF 0xFF) and blank pages verify cleanly.

use super::EccCodec;

/// Bytes covered by one 3-byte ECC group
pub const CHUNK_SIZE: usize = 256;
/// ECC bytes per chunk
pub const ECC_BYTES_PER_CHUNK: usize = 3;

/// Hamming ECC, 3 bytes per 256 bytes
#[derive(Debug, Clone, Copy, Default)]
pub struct Hamming256;

impl Hamming256 {
    /// Compute the 3 ECC bytes of one 256-byte chunk
    pub fn chunk_ecc(chunk: &[u8]) -> [u8; ECC_BYTES_PER_CHUNK] {
        debug_assert_eq!(chunk.len(), CHUNK_SIZE);

        let mut columns = 0u8;
        let mut lines_odd = 0u8;
        let mut lines_even = 0u8;

        for (index, &byte) in chunk.iter().enumerate() {
            columns ^= byte;
            if byte.count_ones() & 1 == 1 {
                let index = index as u8;
                lines_odd ^= index;
                lines_even ^= !index;
            }
        }

        let cp = |mask: u8| ((columns & mask).count_ones() & 1) as u8;
        let column_parity = (cp(0xF0) << 7)
            | (cp(0x0F) << 6)
            | (cp(0xCC) << 5)
            | (cp(0x33) << 4)
            | (cp(0xAA) << 3)
            | (cp(0x55) << 2);

        [
            !interleave(lines_even & 0x0F, lines_odd & 0x0F),
            !interleave(lines_even >> 4, lines_odd >> 4),
            !column_parity | 0x03,
        ]
    }
}

/// Pack 4 even/odd line parity pairs as LPeven0, LPodd0, LPeven1, ...
fn interleave(even: u8, odd: u8) -> u8 {
    let mut packed = 0u8;
    for k in 0..4 {
        packed |= ((even >> k) & 1) << (2 * k);
        packed |= ((odd >> k) & 1) << (2 * k + 1);
    }
    packed
}

impl EccCodec for Hamming256 {
    fn name(&self) -> &'static str {
        "hamming256"
    }

    fn ecc_len(&self, data_len: usize) -> Option<usize> {
        if data_len == 0 || data_len % CHUNK_SIZE != 0 {
            return None;
        }
        Some(data_len / CHUNK_SIZE * ECC_BYTES_PER_CHUNK)
    }

    fn compute(&self, data: &[u8], ecc: &mut [u8]) {
        for (chunk, out) in data
            .chunks_exact(CHUNK_SIZE)
            .zip(ecc.chunks_exact_mut(ECC_BYTES_PER_CHUNK))
        {
            out.copy_from_slice(&Self::chunk_ecc(chunk));
        }
    }

    fn verify(&self, data: &[u8], ecc: &[u8]) -> bool {
        if self.ecc_len(data.len()) != Some(ecc.len()) {
            return false;
        }
        data.chunks_exact(CHUNK_SIZE)
            .zip(ecc.chunks_exact(ECC_BYTES_PER_CHUNK))
            .all(|(chunk, stored)| Self::chunk_ecc(chunk) == stored)
    }
}
