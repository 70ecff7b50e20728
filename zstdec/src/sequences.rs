//! Sequences section decoding for Zstandard.
//!
//! Sequences describe LZ77-style back-references using literal lengths,
//! match lengths, and offsets. Three FSE state machines share one reversed
//! bitstream and advance in lockstep.

use crate::fse::{Distribution, FseDecoder, FseTable};
use log::trace;
use zstdec_core::bitstream::ReverseBitReader;
use zstdec_core::error::{DecodeError, Result, SymbolClass};

/// Largest offset code; its value needs 31 extra bits.
pub const MAX_OFFSET_CODE: u8 = 31;

/// Literal length codes: (baseline, extra bits).
const LL_CODES: [(u32, u8); 36] = [
    (0, 0),
    (1, 0),
    (2, 0),
    (3, 0),
    (4, 0),
    (5, 0),
    (6, 0),
    (7, 0),
    (8, 0),
    (9, 0),
    (10, 0),
    (11, 0),
    (12, 0),
    (13, 0),
    (14, 0),
    (15, 0),
    (16, 1),
    (18, 1),
    (20, 1),
    (22, 1),
    (24, 2),
    (28, 2),
    (32, 3),
    (40, 3),
    (48, 4),
    (64, 6),
    (128, 7),
    (256, 8),
    (512, 9),
    (1024, 10),
    (2048, 11),
    (4096, 12),
    (8192, 13),
    (16384, 14),
    (32768, 15),
    (65536, 16),
];

/// Match length codes: (baseline, extra bits).
const ML_CODES: [(u32, u8); 53] = [
    (3, 0),
    (4, 0),
    (5, 0),
    (6, 0),
    (7, 0),
    (8, 0),
    (9, 0),
    (10, 0),
    (11, 0),
    (12, 0),
    (13, 0),
    (14, 0),
    (15, 0),
    (16, 0),
    (17, 0),
    (18, 0),
    (19, 0),
    (20, 0),
    (21, 0),
    (22, 0),
    (23, 0),
    (24, 0),
    (25, 0),
    (26, 0),
    (27, 0),
    (28, 0),
    (29, 0),
    (30, 0),
    (31, 0),
    (32, 0),
    (33, 0),
    (34, 0),
    (35, 1),
    (37, 1),
    (39, 1),
    (41, 1),
    (43, 2),
    (47, 2),
    (51, 3),
    (59, 3),
    (67, 4),
    (83, 4),
    (99, 5),
    (131, 7),
    (259, 8),
    (515, 9),
    (1027, 10),
    (2051, 11),
    (4099, 12),
    (8195, 13),
    (16387, 14),
    (32771, 15),
    (65539, 16),
];

/// A decoded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    /// Number of literal bytes to copy.
    pub literal_length: usize,
    /// Number of bytes to copy from back-reference.
    pub match_length: usize,
    /// Offset value: 1 to 3 select a repeat offset, larger values are the
    /// offset plus 3.
    pub offset_code: usize,
}

impl Sequence {
    /// Create a sequence from its three fields.
    pub fn new(literal_length: usize, match_length: usize, offset_code: usize) -> Self {
        Self {
            literal_length,
            match_length,
            offset_code,
        }
    }
}

/// Compression mode for sequence symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    /// Predefined FSE table.
    Predefined,
    /// RLE (single symbol).
    Rle,
    /// FSE table in compressed form.
    Fse,
    /// Repeat previous FSE table.
    Repeat,
}

impl CompressionMode {
    /// Create from 2-bit value.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => CompressionMode::Predefined,
            1 => CompressionMode::Rle,
            2 => CompressionMode::Fse,
            _ => CompressionMode::Repeat,
        }
    }
}

/// Sequences section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequencesHeader {
    /// Number of sequences.
    pub num_sequences: usize,
    /// Compression mode for literal lengths.
    pub ll_mode: CompressionMode,
    /// Compression mode for offsets.
    pub of_mode: CompressionMode,
    /// Compression mode for match lengths.
    pub ml_mode: CompressionMode,
    /// Header size in bytes.
    pub header_size: usize,
}

impl SequencesHeader {
    /// Parse the sequence count and, when non-zero, the modes byte.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let truncated = || DecodeError::corrupted(0, "truncated sequences header");

        let byte0 = *data.first().ok_or_else(truncated)?;
        let (num_sequences, count_size) = match byte0 {
            0..=127 => (byte0 as usize, 1),
            128..=254 => {
                let byte1 = *data.get(1).ok_or_else(truncated)?;
                (((byte0 as usize - 128) << 8) + byte1 as usize, 2)
            }
            255 => {
                let bytes = data.get(1..3).ok_or_else(truncated)?;
                (bytes[0] as usize + ((bytes[1] as usize) << 8) + 0x7F00, 3)
            }
        };

        if num_sequences == 0 {
            return Ok(Self {
                num_sequences: 0,
                ll_mode: CompressionMode::Predefined,
                of_mode: CompressionMode::Predefined,
                ml_mode: CompressionMode::Predefined,
                header_size: count_size,
            });
        }

        let modes = *data
            .get(count_size)
            .ok_or_else(|| DecodeError::corrupted(count_size as u64, "missing compression modes"))?;

        if modes & 0x03 != 0 {
            return Err(DecodeError::corrupted(
                count_size as u64,
                "reserved bits set in compression modes",
            ));
        }

        Ok(Self {
            num_sequences,
            ll_mode: CompressionMode::from_bits(modes >> 6),
            of_mode: CompressionMode::from_bits(modes >> 4),
            ml_mode: CompressionMode::from_bits(modes >> 2),
            header_size: count_size + 1,
        })
    }
}

/// The most recent FSE table of each sequence symbol class in a frame.
///
/// Repeat mode reuses these; they are reset at frame start.
#[derive(Debug, Clone, Default)]
pub struct SequenceTables {
    /// Literal length table.
    pub literal_lengths: Option<FseTable>,
    /// Offset table.
    pub offsets: Option<FseTable>,
    /// Match length table.
    pub match_lengths: Option<FseTable>,
}

impl SequenceTables {
    /// Create an empty set of tables.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, class: SymbolClass) -> &mut Option<FseTable> {
        match class {
            SymbolClass::LiteralLength => &mut self.literal_lengths,
            SymbolClass::MatchLength => &mut self.match_lengths,
            _ => &mut self.offsets,
        }
    }

    /// Install the table for `class` described by `mode`.
    ///
    /// Returns the number of description bytes consumed from `data`.
    fn update(&mut self, class: SymbolClass, mode: CompressionMode, data: &[u8]) -> Result<usize> {
        let (table, consumed) = match mode {
            CompressionMode::Predefined => {
                let distribution = Distribution::predefined(class).ok_or_else(|| {
                    DecodeError::invalid_distribution(class, "no predefined distribution")
                })?;
                (FseTable::build(&distribution)?, 0)
            }
            CompressionMode::Rle => {
                let &symbol = data.first().ok_or_else(|| {
                    DecodeError::corrupted(0, format!("missing RLE symbol for {} codes", class))
                })?;
                if symbol > class.max_symbol() {
                    return Err(DecodeError::invalid_distribution(
                        class,
                        format!("RLE symbol {} exceeds {}", symbol, class.max_symbol()),
                    ));
                }
                (FseTable::rle(symbol), 1)
            }
            CompressionMode::Fse => {
                let (distribution, consumed) = Distribution::parse(data, class)?;
                (FseTable::build(&distribution)?, consumed)
            }
            CompressionMode::Repeat => {
                if self.slot(class).is_none() {
                    return Err(DecodeError::no_prior_table(class));
                }
                return Ok(0);
            }
        };

        *self.slot(class) = Some(table);
        Ok(consumed)
    }
}

/// Decode a sequences section.
///
/// `data` must span exactly the rest of the block: the bitstream runs to the
/// block's end and has to be consumed completely.
pub fn decode_sequences_section(data: &[u8], tables: &mut SequenceTables) -> Result<Vec<Sequence>> {
    let header = SequencesHeader::parse(data)?;

    if header.num_sequences == 0 {
        if header.header_size != data.len() {
            return Err(DecodeError::corrupted(
                header.header_size as u64,
                "trailing bytes after empty sequences section",
            ));
        }
        return Ok(Vec::new());
    }

    trace!(
        "sequences: {} with modes ll={:?} of={:?} ml={:?}",
        header.num_sequences, header.ll_mode, header.of_mode, header.ml_mode
    );

    let mut pos = header.header_size;
    for (class, mode) in [
        (SymbolClass::LiteralLength, header.ll_mode),
        (SymbolClass::Offset, header.of_mode),
        (SymbolClass::MatchLength, header.ml_mode),
    ] {
        pos += tables.update(class, mode, &data[pos..])?;
    }

    let (Some(ll_table), Some(of_table), Some(ml_table)) = (
        tables.literal_lengths.as_ref(),
        tables.offsets.as_ref(),
        tables.match_lengths.as_ref(),
    ) else {
        return Err(DecodeError::corrupted(pos as u64, "sequence tables missing"));
    };

    decode_sequences(&data[pos..], header.num_sequences, ll_table, of_table, ml_table)
}

/// Run the three interleaved state machines over one bitstream.
fn decode_sequences(
    bitstream: &[u8],
    num_sequences: usize,
    ll_table: &FseTable,
    of_table: &FseTable,
    ml_table: &FseTable,
) -> Result<Vec<Sequence>> {
    let mut reader = ReverseBitReader::new(bitstream)?;

    let mut ll_state = FseDecoder::new(ll_table, &mut reader)?;
    let mut of_state = FseDecoder::new(of_table, &mut reader)?;
    let mut ml_state = FseDecoder::new(ml_table, &mut reader)?;

    let mut sequences = Vec::with_capacity(num_sequences);

    for i in 0..num_sequences {
        let of_code = of_state.symbol();
        let ml_code = ml_state.symbol() as usize;
        let ll_code = ll_state.symbol() as usize;

        if of_code > MAX_OFFSET_CODE {
            return Err(DecodeError::corrupted(
                0,
                format!("offset code {} exceeds {}", of_code, MAX_OFFSET_CODE),
            ));
        }
        let (Some(&(ml_base, ml_bits)), Some(&(ll_base, ll_bits))) =
            (ML_CODES.get(ml_code), LL_CODES.get(ll_code))
        else {
            return Err(DecodeError::corrupted(0, "length code out of range"));
        };

        let offset_code = (1u64 << of_code) + reader.read_bits(of_code)?;
        let match_length = ml_base as u64 + reader.read_bits(ml_bits)?;
        let literal_length = ll_base as u64 + reader.read_bits(ll_bits)?;

        sequences.push(Sequence::new(
            literal_length as usize,
            match_length as usize,
            offset_code as usize,
        ));

        if i + 1 < num_sequences {
            ll_state.update(&mut reader)?;
            ml_state.update(&mut reader)?;
            of_state.update(&mut reader)?;
        }
    }

    if !reader.is_empty() {
        return Err(DecodeError::corrupted(
            0,
            format!(
                "{} bits left over in sequences bitstream",
                reader.bits_remaining()
            ),
        ));
    }

    Ok(sequences)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zstdec_core::bitstream::BackwardBitWriter;

    #[test]
    fn test_compression_mode() {
        assert_eq!(CompressionMode::from_bits(0), CompressionMode::Predefined);
        assert_eq!(CompressionMode::from_bits(1), CompressionMode::Rle);
        assert_eq!(CompressionMode::from_bits(2), CompressionMode::Fse);
        assert_eq!(CompressionMode::from_bits(3), CompressionMode::Repeat);
    }

    #[test]
    fn test_sequence_count_encodings() {
        let header = SequencesHeader::parse(&[0x00]).unwrap();
        assert_eq!((header.num_sequences, header.header_size), (0, 1));

        let header = SequencesHeader::parse(&[0x7F, 0x00]).unwrap();
        assert_eq!((header.num_sequences, header.header_size), (127, 2));

        let header = SequencesHeader::parse(&[0x81, 0x02, 0x00]).unwrap();
        assert_eq!((header.num_sequences, header.header_size), (258, 3));

        let header = SequencesHeader::parse(&[0xFF, 0x01, 0x02, 0x00]).unwrap();
        assert_eq!((header.num_sequences, header.header_size), (0x0201 + 0x7F00, 4));
    }

    #[test]
    fn test_modes_byte() {
        let header = SequencesHeader::parse(&[0x01, 0b1001_1100]).unwrap();
        assert_eq!(header.ll_mode, CompressionMode::Fse);
        assert_eq!(header.of_mode, CompressionMode::Rle);
        assert_eq!(header.ml_mode, CompressionMode::Repeat);

        assert!(SequencesHeader::parse(&[0x01, 0x01]).is_err());
        assert!(SequencesHeader::parse(&[0x01]).is_err());
        assert!(SequencesHeader::parse(&[0xFF, 0x01]).is_err());
    }

    #[test]
    fn test_length_code_tables() {
        assert_eq!(LL_CODES[15], (15, 0));
        assert_eq!(LL_CODES[35], (65536, 16));
        assert_eq!(ML_CODES[0], (3, 0));
        assert_eq!(ML_CODES[31], (34, 0));
        assert_eq!(ML_CODES[52], (65539, 16));
        // Every code's range ends where the next one starts.
        for codes in [&LL_CODES[..], &ML_CODES[..]] {
            for pair in codes.windows(2) {
                assert_eq!(pair[0].0 + (1 << pair[0].1), pair[1].0);
            }
        }
    }

    #[test]
    fn test_predefined_single_sequence() {
        let section = [0x01, 0x00, 0x08, 0x6E, 0x08];
        let mut tables = SequenceTables::new();
        let sequences = decode_sequences_section(&section, &mut tables).unwrap();

        assert_eq!(sequences, vec![Sequence::new(3, 5, 4)]);
        assert!(tables.literal_lengths.is_some());
        assert!(tables.offsets.is_some());
        assert!(tables.match_lengths.is_some());
    }

    #[test]
    fn test_rle_modes() {
        // All three classes RLE: LL code 1, OF code 3, ML code 1.
        let section = [0x02, 0x54, 0x01, 0x03, 0x01, 0x55];
        let mut tables = SequenceTables::new();
        let sequences = decode_sequences_section(&section, &mut tables).unwrap();

        assert_eq!(
            sequences,
            vec![Sequence::new(1, 4, 10), Sequence::new(1, 4, 13)]
        );
    }

    #[test]
    fn test_repeat_mode_reuses_tables() {
        let mut tables = SequenceTables::new();
        decode_sequences_section(&[0x02, 0x54, 0x01, 0x03, 0x01, 0x55], &mut tables).unwrap();

        // Same bitstream, every class in repeat mode.
        let sequences = decode_sequences_section(&[0x02, 0xFC, 0x55], &mut tables).unwrap();
        assert_eq!(sequences[1], Sequence::new(1, 4, 13));
    }

    #[test]
    fn test_repeat_mode_without_table() {
        let mut tables = SequenceTables::new();
        let err = decode_sequences_section(&[0x01, 0xC0, 0x01], &mut tables).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::NoPriorTable {
                class: SymbolClass::LiteralLength
            }
        ));

        // Predefined literal lengths, repeated match lengths.
        let err = decode_sequences_section(&[0x01, 0x0C, 0x01], &mut tables).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::NoPriorTable {
                class: SymbolClass::MatchLength
            }
        ));
    }

    #[test]
    fn test_fse_compressed_offsets() {
        let of_header = [0x90, 0x62, 0x1A, 0x10, 0x1E];
        let (dist, _) = Distribution::parse(&of_header, SymbolClass::Offset).unwrap();
        let of_table = FseTable::build(&dist).unwrap();
        let state = of_table
            .entries()
            .iter()
            .position(|e| e.symbol == 5)
            .unwrap();

        // Read order: states (ll, of, ml), then offset extra bits.
        let mut writer = BackwardBitWriter::new();
        writer.write_bits(0b10110, 5);
        writer.write_bits(state as u64, 5);
        let bitstream = writer.finish();

        // LL RLE code 2, OF FSE-compressed, ML RLE code 0.
        let mut section = vec![0x01, 0b0110_0100, 0x02];
        section.extend_from_slice(&of_header);
        section.push(0x00);
        section.extend_from_slice(&bitstream);

        let mut tables = SequenceTables::new();
        let sequences = decode_sequences_section(&section, &mut tables).unwrap();
        assert_eq!(sequences, vec![Sequence::new(2, 3, 32 + 0b10110)]);
        assert_eq!(tables.offsets.as_ref(), Some(&of_table));
    }

    #[test]
    fn test_leftover_bits_rejected() {
        // One RLE sequence with no extra bits, but the stream holds 6 bits.
        let section = [0x01, 0x54, 0x01, 0x00, 0x01, 0x55];
        let mut tables = SequenceTables::new();
        assert!(matches!(
            decode_sequences_section(&section, &mut tables),
            Err(DecodeError::CorruptedData { .. })
        ));
    }

    #[test]
    fn test_exhausted_bitstream() {
        // Offset code 20 needs 20 extra bits; the stream has 6.
        let section = [0x01, 0x54, 0x01, 0x14, 0x01, 0x55];
        let mut tables = SequenceTables::new();
        assert!(matches!(
            decode_sequences_section(&section, &mut tables),
            Err(DecodeError::BitstreamExhausted { .. })
        ));
    }

    #[test]
    fn test_rle_symbol_out_of_range() {
        let section = [0x01, 0x54, 0x40, 0x00, 0x01, 0x01];
        let mut tables = SequenceTables::new();
        assert!(matches!(
            decode_sequences_section(&section, &mut tables),
            Err(DecodeError::InvalidDistribution { .. })
        ));
    }
}
