//! Huffman coding for Zstandard literals.
//!
//! Zstandard describes a literal Huffman code by per-symbol weights. The
//! weight of the last symbol is implied so that the code is complete, and
//! code lengths follow as `max_bits + 1 - weight`. Maximum code length is 11
//! bits.

use crate::fse::{Distribution, FseDecoder, FseTable};
use zstdec_core::bitstream::ReverseBitReader;
use zstdec_core::error::{DecodeError, Result, SymbolClass};

/// Maximum Huffman code length in Zstandard.
pub const MAX_CODE_LENGTH: u8 = 11;

/// Maximum number of symbols (byte values).
pub const MAX_SYMBOLS: usize = 256;

/// Huffman decoding table entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HuffmanEntry {
    /// Decoded symbol.
    pub symbol: u8,
    /// Number of bits for this code.
    pub num_bits: u8,
}

/// Huffman decoding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    /// Decoding entries indexed by the next `max_bits` of the stream.
    entries: Vec<HuffmanEntry>,
    /// Code length per symbol, zero for absent symbols.
    code_lengths: Vec<u8>,
    /// Maximum code length used.
    max_bits: u8,
}

impl HuffmanTable {
    /// Build a table from explicit weights, one per symbol starting at 0.
    ///
    /// The weight of the symbol following the last explicit one is derived
    /// so that the code is complete.
    pub fn from_weights(weights: &[u8]) -> Result<Self> {
        if weights.len() >= MAX_SYMBOLS {
            return Err(DecodeError::invalid_huffman(format!(
                "{} explicit weights, at most {} allowed",
                weights.len(),
                MAX_SYMBOLS - 1
            )));
        }

        let mut total_weight = 0u32;
        for &w in weights {
            if w > MAX_CODE_LENGTH {
                return Err(DecodeError::invalid_huffman(format!(
                    "weight {} exceeds {}",
                    w, MAX_CODE_LENGTH
                )));
            }
            if w > 0 {
                total_weight += 1u32 << (w - 1);
            }
        }

        if total_weight == 0 {
            return Err(DecodeError::invalid_huffman("all Huffman weights are zero"));
        }

        let max_bits = (32 - total_weight.leading_zeros()) as u8;
        if max_bits > MAX_CODE_LENGTH {
            return Err(DecodeError::invalid_huffman(format!(
                "maximum code length {} exceeds {}",
                max_bits, MAX_CODE_LENGTH
            )));
        }

        // The implied weight fills the gap up to the next power of two.
        let left = (1u32 << max_bits) - total_weight;
        if !left.is_power_of_two() {
            return Err(DecodeError::invalid_huffman(
                "weights cannot be completed to a full code",
            ));
        }
        let last_weight = (32 - left.leading_zeros()) as u8;

        let code_lengths: Vec<u8> = weights
            .iter()
            .chain(std::iter::once(&last_weight))
            .map(|&w| if w > 0 { max_bits + 1 - w } else { 0 })
            .collect();

        // Longest codes take the lowest table slots; within one length,
        // symbols are placed in ascending order.
        let mut rank_count = [0usize; MAX_CODE_LENGTH as usize + 1];
        for &len in &code_lengths {
            if len > 0 {
                rank_count[len as usize] += 1;
            }
        }

        let mut rank_start = [0usize; MAX_CODE_LENGTH as usize + 2];
        for len in (1..=max_bits as usize).rev() {
            rank_start[len - 1] = rank_start[len] + (rank_count[len] << (max_bits as usize - len));
        }

        let table_size = 1usize << max_bits;
        let mut entries = vec![HuffmanEntry::default(); table_size];

        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let span = 1usize << (max_bits - len);
            let start = rank_start[len as usize];
            entries[start..start + span].fill(HuffmanEntry {
                symbol: symbol as u8,
                num_bits: len,
            });
            rank_start[len as usize] += span;
        }

        Ok(Self {
            entries,
            code_lengths,
            max_bits,
        })
    }

    /// Parse a Huffman tree description.
    ///
    /// Returns the table and the number of bytes the description occupies.
    pub fn parse(data: &[u8]) -> Result<(Self, usize)> {
        let Some(&header) = data.first() else {
            return Err(DecodeError::invalid_huffman("empty tree description"));
        };

        if header < 128 {
            Self::parse_compressed(data, header as usize)
        } else {
            Self::parse_direct(data, header as usize - 127)
        }
    }

    /// Weights packed as 4-bit fields, high nibble first.
    fn parse_direct(data: &[u8], num_weights: usize) -> Result<(Self, usize)> {
        let num_bytes = num_weights.div_ceil(2);
        let Some(packed) = data.get(1..1 + num_bytes) else {
            return Err(DecodeError::unexpected_eof(1 + num_bytes - data.len()));
        };

        let weights: Vec<u8> = packed
            .iter()
            .flat_map(|&byte| [byte >> 4, byte & 0x0F])
            .take(num_weights)
            .collect();

        Ok((Self::from_weights(&weights)?, 1 + num_bytes))
    }

    /// Weights coded with FSE, decoded by two interleaved states.
    fn parse_compressed(data: &[u8], compressed_size: usize) -> Result<(Self, usize)> {
        if compressed_size == 0 {
            return Err(DecodeError::invalid_huffman("zero-length weight stream"));
        }
        let Some(body) = data.get(1..1 + compressed_size) else {
            return Err(DecodeError::unexpected_eof(1 + compressed_size - data.len()));
        };

        let (distribution, header_len) = Distribution::parse(body, SymbolClass::HuffmanWeight)?;
        let table = FseTable::build(&distribution)?;

        let mut reader = ReverseBitReader::new(&body[header_len..])?;
        let mut even = FseDecoder::new(&table, &mut reader)?;
        let mut odd = FseDecoder::new(&table, &mut reader)?;

        let mut weights = Vec::with_capacity(MAX_SYMBOLS);
        loop {
            push_weight(&mut weights, even.symbol())?;
            even.update_padded(&mut reader);
            if reader.has_overflowed() {
                push_weight(&mut weights, odd.symbol())?;
                break;
            }

            push_weight(&mut weights, odd.symbol())?;
            odd.update_padded(&mut reader);
            if reader.has_overflowed() {
                push_weight(&mut weights, even.symbol())?;
                break;
            }
        }

        Ok((Self::from_weights(&weights)?, 1 + compressed_size))
    }

    /// Look up the entry for the next `max_bits` of a stream.
    #[inline]
    pub fn decode(&self, bits: u64) -> &HuffmanEntry {
        &self.entries[bits as usize & (self.entries.len() - 1)]
    }

    /// Code length of `symbol`, or 0 if it has no code.
    pub fn code_length(&self, symbol: u8) -> u8 {
        self.code_lengths
            .get(symbol as usize)
            .copied()
            .unwrap_or(0)
    }

    /// Get max bits for this table.
    pub fn max_bits(&self) -> u8 {
        self.max_bits
    }

    /// Number of symbols covered by the description, including the implied
    /// last symbol.
    pub fn num_symbols(&self) -> usize {
        self.code_lengths.len()
    }

    /// Decode exactly `count` symbols from one reversed stream into `out`.
    ///
    /// The stream must be consumed exactly.
    pub fn decode_stream(&self, data: &[u8], count: usize, out: &mut Vec<u8>) -> Result<()> {
        let mut reader = ReverseBitReader::new(data)?;
        out.reserve(count);

        for _ in 0..count {
            let entry = self.decode(reader.peek_bits(self.max_bits));
            reader.consume(entry.num_bits)?;
            out.push(entry.symbol);
        }

        if !reader.is_empty() {
            return Err(DecodeError::corrupted(
                0,
                format!(
                    "{} bits left over in Huffman stream",
                    reader.bits_remaining()
                ),
            ));
        }

        Ok(())
    }
}

fn push_weight(weights: &mut Vec<u8>, weight: u8) -> Result<()> {
    if weights.len() >= MAX_SYMBOLS - 1 {
        return Err(DecodeError::invalid_huffman("too many Huffman weights"));
    }
    weights.push(weight);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zstdec_core::bitstream::BackwardBitWriter;

    /// Direct description: 'a'=2, 'b'=1, 'c'=1, 'd' implied as 3.
    fn abcd_description() -> Vec<u8> {
        let mut desc = vec![227];
        desc.extend_from_slice(&[0u8; 48]);
        desc.extend_from_slice(&[0x02, 0x11]);
        desc
    }

    #[test]
    fn test_direct_weights() {
        let (table, used) = HuffmanTable::parse(&abcd_description()).unwrap();

        assert_eq!(used, 51);
        assert_eq!(table.max_bits(), 3);
        assert_eq!(table.num_symbols(), 101);
        assert_eq!(table.code_length(b'a'), 2);
        assert_eq!(table.code_length(b'b'), 3);
        assert_eq!(table.code_length(b'c'), 3);
        assert_eq!(table.code_length(b'd'), 1);
        assert_eq!(table.code_length(b'e'), 0);
        assert_eq!(table.code_length(0), 0);
    }

    #[test]
    fn test_decode_stream() {
        let (table, _) = HuffmanTable::parse(&abcd_description()).unwrap();

        let mut out = Vec::new();
        table.decode_stream(&[0x1D, 0x6C], 8, &mut out).unwrap();
        assert_eq!(out, b"dadbcdda");
    }

    #[test]
    fn test_decode_stream_leftover_bits() {
        let (table, _) = HuffmanTable::parse(&abcd_description()).unwrap();

        let mut out = Vec::new();
        assert!(table.decode_stream(&[0x1D, 0x6C], 7, &mut out).is_err());
    }

    #[test]
    fn test_decode_stream_exhausted() {
        let (table, _) = HuffmanTable::parse(&abcd_description()).unwrap();

        let mut out = Vec::new();
        let err = table.decode_stream(&[0x1D, 0x6C], 20, &mut out).unwrap_err();
        assert!(matches!(err, DecodeError::BitstreamExhausted { .. }));
    }

    #[test]
    fn test_fse_compressed_weights() {
        let desc = [
            0x18, 0x90, 0x25, 0x6D, 0x03, 0x96, 0x2C, 0xBD, 0xB4, 0x86, 0x50, 0x32, 0xDB, 0x10,
            0x49, 0x64, 0x77, 0x7F, 0xBB, 0xBB, 0xBB, 0x10, 0x73, 0x3A, 0xE8, 0xFF, 0xFF,
        ];
        let (table, used) = HuffmanTable::parse(&desc).unwrap();

        assert_eq!(used, 25);
        assert_eq!(table.max_bits(), 8);
        assert_eq!(table.code_length(b'o'), 3);
        assert_eq!(table.code_length(b' '), 4);
        assert_eq!(table.code_length(b'\n'), 4);
        assert_eq!(table.code_length(b'c'), 7);
        assert_eq!(table.code_length(b'j'), 8);
        assert_eq!(table.code_length(b'z'), 5);
        assert_eq!(table.code_length(b'A'), 0);
    }

    #[test]
    fn test_zero_length_weight_stream() {
        assert!(matches!(
            HuffmanTable::parse(&[0x00, 0x12]),
            Err(DecodeError::InvalidHuffmanTable { .. })
        ));
    }

    #[test]
    fn test_truncated_description() {
        assert!(matches!(
            HuffmanTable::parse(&[0x90, 0x11]),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_incomplete_weights_rejected() {
        // Total 3 leaves a gap of 1 below 4, which is a power of two: valid.
        assert!(HuffmanTable::from_weights(&[2, 1]).is_ok());
        // Total 5 leaves a gap of 3 below 8: no single weight can fill it.
        assert!(HuffmanTable::from_weights(&[3, 1]).is_err());
        assert!(HuffmanTable::from_weights(&[0, 0, 0]).is_err());
        assert!(HuffmanTable::from_weights(&[12]).is_err());
    }

    /// Weights that always complete to a valid code.
    fn weights_strategy() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(0u8..=7, 1..24).prop_map(|mut weights| {
            if weights.iter().all(|&w| w == 0) {
                weights[0] = 1;
            }
            let total: u32 = weights
                .iter()
                .filter(|&&w| w > 0)
                .map(|&w| 1u32 << (w - 1))
                .sum();
            let max_bits = 32 - total.leading_zeros();
            let mut gap = (1u32 << max_bits) - total;
            // Close the gap down to its top bit so the implied weight exists.
            while !gap.is_power_of_two() {
                let low = gap.trailing_zeros() as u8;
                weights.push(low + 1);
                gap -= 1 << low;
            }
            weights
        })
    }

    fn direct_description(weights: &[u8]) -> Vec<u8> {
        let mut desc = vec![127 + weights.len() as u8];
        for pair in weights.chunks(2) {
            let low = pair.get(1).copied().unwrap_or(0);
            desc.push((pair[0] << 4) | low);
        }
        desc
    }

    proptest! {
        #[test]
        fn prop_code_is_complete_and_decodes(
            weights in weights_strategy(),
            picks in prop::collection::vec(any::<u16>(), 0..64),
        ) {
            let (table, used) = HuffmanTable::parse(&direct_description(&weights)).unwrap();
            prop_assert_eq!(used, 1 + weights.len().div_ceil(2));

            // Kraft equality: the code fills the table exactly.
            let filled: usize = (0..table.num_symbols())
                .map(|s| table.code_length(s as u8))
                .filter(|&len| len > 0)
                .map(|len| 1usize << (table.max_bits() - len))
                .sum();
            prop_assert_eq!(filled, 1usize << table.max_bits());

            // Encode a message with the table's own codes and decode it back.
            let present: Vec<u8> = (0..table.num_symbols())
                .map(|s| s as u8)
                .filter(|&s| table.code_length(s) > 0)
                .collect();
            let message: Vec<u8> = picks
                .iter()
                .map(|&p| present[p as usize % present.len()])
                .collect();

            let mut writer = BackwardBitWriter::new();
            for &symbol in message.iter().rev() {
                let len = table.code_length(symbol);
                let first_slot = table
                    .entries
                    .iter()
                    .position(|e| e.symbol == symbol)
                    .unwrap();
                let code = (first_slot >> (table.max_bits() - len)) as u64;
                writer.write_bits(code, len);
            }
            let stream = writer.finish();

            let mut out = Vec::new();
            table.decode_stream(&stream, message.len(), &mut out).unwrap();
            prop_assert_eq!(out, message);
        }
    }
}
