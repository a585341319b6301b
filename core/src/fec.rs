//! Hamming(7,4) forward error correction over bit streams.
//!
//! Codeword layout follows the classic position numbering 1..=7:
//! `p1 p2 d1 p3 d2 d3 d4`. Parity bit `pN` sits at position `2^(N-1)` and
//! the syndrome of a received word, read as a binary number, is the
//! 1-indexed position of a single flipped bit.
//!
//! Two flipped bits inside one codeword are NOT detected: the syndrome points
//! at a third position and the decoder confidently returns the wrong nibble.

/// Data bits per block.
pub const DATA_BITS: usize = 4;

/// Bits per transmitted codeword.
pub const CODEWORD_BITS: usize = 7;

pub type Codeword = [bool; CODEWORD_BITS];

/// Generator matrix G (rows d1..d4, columns positions 1..7).
const GENERATOR: [[u8; CODEWORD_BITS]; DATA_BITS] = [
    [1, 1, 1, 0, 0, 0, 0],
    [1, 0, 0, 1, 1, 0, 0],
    [0, 1, 0, 1, 0, 1, 0],
    [1, 1, 0, 1, 0, 0, 1],
];

/// Parity-check matrix H. Row `i` contributes bit `i` of the syndrome.
const PARITY_CHECK: [[u8; CODEWORD_BITS]; 3] = [
    [1, 0, 1, 0, 1, 0, 1],
    [0, 1, 1, 0, 0, 1, 1],
    [0, 0, 0, 1, 1, 1, 1],
];

/// Zero-based indices of d1..d4 inside a codeword.
const DATA_POSITIONS: [usize; DATA_BITS] = [2, 4, 5, 6];

/// Block code applied between the text bits and the symbol grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FecScheme {
    None,
    Hamming74,
}

impl FecScheme {
    /// `(data bits, codeword bits)` per block, if a code is active.
    pub fn block_size(&self) -> Option<(usize, usize)> {
        match self {
            FecScheme::None => None,
            FecScheme::Hamming74 => Some((DATA_BITS, CODEWORD_BITS)),
        }
    }

    pub fn encode(&self, bits: &[bool]) -> Vec<bool> {
        match self {
            FecScheme::None => bits.to_vec(),
            FecScheme::Hamming74 => encode_bits(bits),
        }
    }

    pub fn decode(&self, bits: &[bool]) -> Vec<bool> {
        match self {
            FecScheme::None => bits.to_vec(),
            FecScheme::Hamming74 => decode_bits(bits),
        }
    }
}

/// Result of decoding one codeword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDecode {
    pub data: [bool; DATA_BITS],
    /// Zero-based codeword index that was flipped back, if any.
    pub corrected: Option<usize>,
}

/// Multiply a data block by G over GF(2).
pub fn encode_block(data: [bool; DATA_BITS]) -> Codeword {
    let mut codeword = [false; CODEWORD_BITS];
    for (col, bit) in codeword.iter_mut().enumerate() {
        let sum: u8 = GENERATOR
            .iter()
            .zip(data.iter())
            .map(|(row, &d)| row[col] & d as u8)
            .fold(0, |acc, v| acc ^ v);
        *bit = sum == 1;
    }
    codeword
}

/// H · r over GF(2), read as a binary number (0 = consistent codeword).
pub fn syndrome(codeword: &Codeword) -> usize {
    PARITY_CHECK
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let parity = row
                .iter()
                .zip(codeword.iter())
                .map(|(&h, &r)| h & r as u8)
                .fold(0, |acc, v| acc ^ v);
            (parity as usize) << i
        })
        .sum()
}

pub fn decode_block(mut codeword: Codeword) -> BlockDecode {
    let s = syndrome(&codeword);
    let corrected = if s == 0 {
        None
    } else {
        let idx = s - 1;
        codeword[idx] = !codeword[idx];
        Some(idx)
    };

    let mut data = [false; DATA_BITS];
    for (slot, &pos) in data.iter_mut().zip(DATA_POSITIONS.iter()) {
        *slot = codeword[pos];
    }

    BlockDecode { data, corrected }
}

/// Encode a bit stream block by block. A short final block is zero-padded.
pub fn encode_bits(bits: &[bool]) -> Vec<bool> {
    let mut encoded = Vec::with_capacity(bits.len().div_ceil(DATA_BITS) * CODEWORD_BITS);
    for chunk in bits.chunks(DATA_BITS) {
        let mut block = [false; DATA_BITS];
        block[..chunk.len()].copy_from_slice(chunk);
        encoded.extend_from_slice(&encode_block(block));
    }
    encoded
}

/// Decode a codeword stream. Trailing bits that do not fill a whole codeword
/// are discarded.
pub fn decode_bits(bits: &[bool]) -> Vec<bool> {
    let whole = bits.len() - bits.len() % CODEWORD_BITS;
    if whole < bits.len() {
        log::debug!("Dropping {} trailing bits short of a codeword", bits.len() - whole);
    }

    let mut decoded = Vec::with_capacity(whole / CODEWORD_BITS * DATA_BITS);
    let mut corrections = 0usize;
    for chunk in bits[..whole].chunks_exact(CODEWORD_BITS) {
        let mut codeword = [false; CODEWORD_BITS];
        codeword.copy_from_slice(chunk);
        let block = decode_block(codeword);
        if block.corrected.is_some() {
            corrections += 1;
        }
        decoded.extend_from_slice(&block.data);
    }

    if corrections > 0 {
        log::debug!("Hamming decoder corrected {} codewords", corrections);
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nibble(value: u8) -> [bool; DATA_BITS] {
        [
            value & 0b1000 != 0,
            value & 0b0100 != 0,
            value & 0b0010 != 0,
            value & 0b0001 != 0,
        ]
    }

    #[test]
    fn test_codewords_have_zero_syndrome() {
        for value in 0..16u8 {
            let codeword = encode_block(nibble(value));
            assert_eq!(syndrome(&codeword), 0, "nibble {:04b}", value);
        }
    }

    #[test]
    fn test_data_bits_sit_at_fixed_positions() {
        let codeword = encode_block(nibble(0b1011));
        assert_eq!(
            [codeword[2], codeword[4], codeword[5], codeword[6]],
            nibble(0b1011)
        );
    }

    #[test]
    fn test_single_bit_error_is_corrected() {
        for value in 0..16u8 {
            let data = nibble(value);
            let codeword = encode_block(data);
            for flip in 0..CODEWORD_BITS {
                let mut corrupted = codeword;
                corrupted[flip] = !corrupted[flip];
                let decoded = decode_block(corrupted);
                assert_eq!(decoded.data, data, "nibble {:04b} flip {}", value, flip);
                assert_eq!(decoded.corrected, Some(flip));
            }
        }
    }

    #[test]
    fn test_double_bit_error_can_decode_wrong() {
        // Minimum distance is 3, so two flips land nearer another codeword.
        let mut wrong = 0;
        for value in 0..16u8 {
            let data = nibble(value);
            let codeword = encode_block(data);
            for a in 0..CODEWORD_BITS {
                for b in (a + 1)..CODEWORD_BITS {
                    let mut corrupted = codeword;
                    corrupted[a] = !corrupted[a];
                    corrupted[b] = !corrupted[b];
                    if decode_block(corrupted).data != data {
                        wrong += 1;
                    }
                }
            }
        }
        assert!(wrong > 0, "two-bit corruption must be able to yield a wrong nibble");
    }

    #[test]
    fn test_clean_block_reports_no_correction() {
        let decoded = decode_block(encode_block(nibble(0b0110)));
        assert_eq!(decoded.corrected, None);
    }

    #[test]
    fn test_stream_roundtrip_and_trailing_drop() {
        let bits: Vec<bool> = (0..16).map(|i| i % 3 == 0).collect();
        let mut encoded = encode_bits(&bits);
        assert_eq!(encoded.len(), 28);

        // Partial trailing codeword is discarded.
        encoded.extend_from_slice(&[true, false, true]);
        assert_eq!(decode_bits(&encoded), bits);
    }

    #[test]
    fn test_scheme_none_is_passthrough() {
        let bits = vec![true, false, false, true, true];
        assert_eq!(FecScheme::None.encode(&bits), bits);
        assert_eq!(FecScheme::None.decode(&bits), bits);
        assert_eq!(FecScheme::None.block_size(), None);
        assert_eq!(FecScheme::Hamming74.block_size(), Some((4, 7)));
    }
}
