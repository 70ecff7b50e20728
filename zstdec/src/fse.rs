//! Finite State Entropy (FSE) decoding tables.
//!
//! FSE is the table-driven entropy coder Zstandard uses for literal lengths,
//! match lengths, offsets, and compressed Huffman weights. A decoder state is
//! an index into a table of `2^accuracy_log` entries; each entry yields a
//! symbol and tells how many bits to read to reach the next state.

use zstdec_core::bitstream::{ForwardBitReader, ReverseBitReader};
use zstdec_core::error::{DecodeError, Result, SymbolClass};

/// Smallest accuracy log a distribution may declare.
pub const MIN_ACCURACY_LOG: u8 = 5;

/// Default literal length distribution (accuracy log 6).
const LL_DEFAULT_DISTRIBUTION: [i16; 36] = [
    4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3, 2, 1, 1, 1, 1, 1,
    -1, -1, -1, -1,
];

/// Default match length distribution (accuracy log 6).
const ML_DEFAULT_DISTRIBUTION: [i16; 53] = [
    1, 4, 3, 2, 2, 2, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1,
    1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1, -1, -1,
];

/// Default offset distribution (accuracy log 5).
const OF_DEFAULT_DISTRIBUTION: [i16; 29] = [
    1, 1, 1, 1, 1, 1, 2, 2, 2, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, -1, -1, -1, -1, -1,
];

/// Normalized per-symbol probabilities for one symbol class.
///
/// A probability of `-1` marks a "less than one" symbol: it occupies a single
/// slot at the tail of the table. Valid distributions sum to
/// `2^accuracy_log`, counting each `-1` as one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    /// Symbol class the distribution belongs to.
    class: SymbolClass,
    /// Log2 of the table size.
    accuracy_log: u8,
    /// Probability per symbol, indexed by symbol value.
    probabilities: Vec<i16>,
}

impl Distribution {
    /// Create a distribution from explicit probabilities.
    ///
    /// Validation happens when the table is built.
    pub fn new(class: SymbolClass, accuracy_log: u8, probabilities: Vec<i16>) -> Self {
        Self {
            class,
            accuracy_log,
            probabilities,
        }
    }

    /// The format's default distribution for a sequence symbol class.
    ///
    /// Huffman weights have no default and yield `None`.
    pub fn predefined(class: SymbolClass) -> Option<Self> {
        let (accuracy_log, probabilities): (u8, &[i16]) = match class {
            SymbolClass::LiteralLength => (6, &LL_DEFAULT_DISTRIBUTION),
            SymbolClass::MatchLength => (6, &ML_DEFAULT_DISTRIBUTION),
            SymbolClass::Offset => (5, &OF_DEFAULT_DISTRIBUTION),
            SymbolClass::HuffmanWeight => return None,
        };
        Some(Self::new(class, accuracy_log, probabilities.to_vec()))
    }

    /// Parse a bit-packed distribution header.
    ///
    /// Returns the distribution and the number of bytes the header occupies.
    pub fn parse(data: &[u8], class: SymbolClass) -> Result<(Self, usize)> {
        let mut reader = ForwardBitReader::new(data);

        let accuracy_log = reader
            .read_bits(4)
            .map_err(|_| DecodeError::invalid_distribution(class, "empty distribution header"))?
            as u8
            + MIN_ACCURACY_LOG;

        if accuracy_log > class.max_accuracy_log() {
            return Err(DecodeError::invalid_distribution(
                class,
                format!(
                    "accuracy log {} exceeds maximum {}",
                    accuracy_log,
                    class.max_accuracy_log()
                ),
            ));
        }

        let max_symbols = class.max_symbol() as usize + 1;
        let mut probabilities: Vec<i16> = Vec::with_capacity(max_symbols);

        // `remaining` starts one above the table size so that the loop ends
        // at exactly 1 when the counts sum correctly.
        let mut remaining: i32 = (1 << accuracy_log) + 1;
        let mut threshold: i32 = 1 << accuracy_log;
        let mut bits = accuracy_log + 1;

        while remaining > 1 {
            if probabilities.len() >= max_symbols {
                return Err(DecodeError::invalid_distribution(
                    class,
                    format!("more than {} symbols declared", max_symbols),
                ));
            }

            // Values below `max` fit in `bits - 1` bits; the rest need `bits`.
            let max = 2 * threshold - 1 - remaining;
            let low = reader.peek_bits(bits - 1) as i32;
            let value = if low < max {
                reader.skip_bits(bits - 1).map_err(|_| truncated(class))?;
                low
            } else {
                let full = reader.peek_bits(bits) as i32;
                reader.skip_bits(bits).map_err(|_| truncated(class))?;
                if full >= threshold { full - max } else { full }
            };

            let probability = value - 1;
            remaining -= probability.abs();
            probabilities.push(probability as i16);

            if probability == 0 {
                // Zero probabilities are followed by 2-bit repeat counts;
                // a count of 3 means another repeat field follows.
                loop {
                    let repeat = reader.read_bits(2).map_err(|_| truncated(class))? as usize;
                    if probabilities.len() + repeat > max_symbols {
                        return Err(DecodeError::invalid_distribution(
                            class,
                            "zero run extends past the last symbol",
                        ));
                    }
                    probabilities.resize(probabilities.len() + repeat, 0);
                    if repeat != 3 {
                        break;
                    }
                }
            }

            if remaining < 1 {
                break;
            }
            while remaining < threshold {
                bits -= 1;
                threshold >>= 1;
            }
        }

        if remaining != 1 {
            return Err(DecodeError::invalid_distribution(
                class,
                "probabilities do not sum to the table size",
            ));
        }

        Ok((
            Self {
                class,
                accuracy_log,
                probabilities,
            },
            reader.bytes_consumed(),
        ))
    }

    /// Symbol class of this distribution.
    pub fn class(&self) -> SymbolClass {
        self.class
    }

    /// Accuracy log (table size = 1 << accuracy_log).
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    /// Probabilities indexed by symbol.
    pub fn probabilities(&self) -> &[i16] {
        &self.probabilities
    }
}

fn truncated(class: SymbolClass) -> DecodeError {
    DecodeError::invalid_distribution(class, "truncated distribution header")
}

/// FSE decoding table entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FseTableEntry {
    /// Symbol to emit.
    pub symbol: u8,
    /// Number of bits to read for next state.
    pub num_bits: u8,
    /// Baseline for calculating next state.
    pub baseline: u16,
}

/// FSE decoding table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FseTable {
    /// Table entries indexed by state.
    entries: Vec<FseTableEntry>,
    /// Accuracy log (table size = 1 << accuracy_log).
    accuracy_log: u8,
}

impl FseTable {
    /// Build a decoding table from a distribution.
    ///
    /// Symbols are spread over the table with the format's fixed step, so
    /// equal distributions always produce identical tables.
    pub fn build(distribution: &Distribution) -> Result<Self> {
        let class = distribution.class;
        let accuracy_log = distribution.accuracy_log;
        let probabilities = &distribution.probabilities;

        if !(MIN_ACCURACY_LOG..=class.max_accuracy_log()).contains(&accuracy_log) {
            return Err(DecodeError::invalid_distribution(
                class,
                format!(
                    "accuracy log {} outside {}..={}",
                    accuracy_log,
                    MIN_ACCURACY_LOG,
                    class.max_accuracy_log()
                ),
            ));
        }

        if probabilities.len() > class.max_symbol() as usize + 1 {
            return Err(DecodeError::invalid_distribution(
                class,
                format!("{} symbols exceed the alphabet", probabilities.len()),
            ));
        }

        if probabilities.iter().any(|&p| p < -1) {
            return Err(DecodeError::invalid_distribution(
                class,
                "negative probability other than -1",
            ));
        }

        let table_size = 1usize << accuracy_log;
        let total: usize = probabilities
            .iter()
            .map(|&p| if p == -1 { 1 } else { p as usize })
            .sum();
        if total != table_size {
            return Err(DecodeError::invalid_distribution(
                class,
                format!("probabilities sum to {}, expected {}", total, table_size),
            ));
        }

        let mut symbols = vec![0u8; table_size];
        let mut next_state = vec![0u16; probabilities.len()];

        // "Less than one" symbols take one slot each from the tail down.
        let mut tail = table_size;
        for (symbol, &prob) in probabilities.iter().enumerate() {
            if prob == -1 {
                tail -= 1;
                symbols[tail] = symbol as u8;
                next_state[symbol] = 1;
            } else {
                next_state[symbol] = prob as u16;
            }
        }

        let mask = table_size - 1;
        let step = (table_size >> 1) + (table_size >> 3) + 3;
        let mut position = 0usize;

        for (symbol, &prob) in probabilities.iter().enumerate() {
            for _ in 0..prob.max(0) {
                symbols[position] = symbol as u8;
                loop {
                    position = (position + step) & mask;
                    if position < tail {
                        break;
                    }
                }
            }
        }

        if position != 0 {
            return Err(DecodeError::invalid_distribution(
                class,
                "symbol spread did not cover the table",
            ));
        }

        let entries = symbols
            .iter()
            .map(|&symbol| {
                let next = next_state[symbol as usize];
                next_state[symbol as usize] += 1;

                let num_bits = accuracy_log - highest_bit_set(next);
                let baseline = ((next as usize) << num_bits) - table_size;
                FseTableEntry {
                    symbol,
                    num_bits,
                    baseline: baseline as u16,
                }
            })
            .collect();

        Ok(Self {
            entries,
            accuracy_log,
        })
    }

    /// Single-entry table that always yields `symbol` and reads no bits.
    pub fn rle(symbol: u8) -> Self {
        Self {
            entries: vec![FseTableEntry {
                symbol,
                num_bits: 0,
                baseline: 0,
            }],
            accuracy_log: 0,
        }
    }

    /// Get table entry for a given state.
    #[inline]
    pub fn get(&self, state: usize) -> &FseTableEntry {
        &self.entries[state]
    }

    /// Symbol emitted in `state`.
    #[inline]
    pub fn decode_symbol(&self, state: usize) -> u8 {
        self.entries[state].symbol
    }

    /// State following `state`, reading its transition bits from `reader`.
    #[inline]
    pub fn next_state(&self, state: usize, reader: &mut ReverseBitReader<'_>) -> Result<usize> {
        let entry = &self.entries[state];
        let bits = reader.read_bits(entry.num_bits)?;
        Ok(entry.baseline as usize + bits as usize)
    }

    /// Get the accuracy log.
    pub fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    /// Get the table size.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    /// All entries in state order.
    pub fn entries(&self) -> &[FseTableEntry] {
        &self.entries
    }
}

/// One FSE state machine walking a table.
#[derive(Debug, Clone, Copy)]
pub struct FseDecoder<'t> {
    /// FSE table.
    table: &'t FseTable,
    /// Current state.
    state: usize,
}

impl<'t> FseDecoder<'t> {
    /// Create a decoder, reading the initial state from the stream.
    pub fn new(table: &'t FseTable, reader: &mut ReverseBitReader<'_>) -> Result<Self> {
        let state = reader.read_bits(table.accuracy_log())? as usize;
        Ok(Self { table, state })
    }

    /// Symbol of the current state.
    #[inline]
    pub fn symbol(&self) -> u8 {
        self.table.decode_symbol(self.state)
    }

    /// Current state.
    pub fn state(&self) -> usize {
        self.state
    }

    /// Advance to the next state.
    #[inline]
    pub fn update(&mut self, reader: &mut ReverseBitReader<'_>) -> Result<()> {
        self.state = self.table.next_state(self.state, reader)?;
        Ok(())
    }

    /// Advance to the next state, zero-filling bits past the start of the
    /// stream. The caller checks [`ReverseBitReader::has_overflowed`].
    #[inline]
    pub fn update_padded(&mut self, reader: &mut ReverseBitReader<'_>) {
        let entry = self.table.get(self.state);
        let bits = reader.read_bits_padded(entry.num_bits);
        self.state = entry.baseline as usize + bits as usize;
    }
}

/// Find the position of the highest set bit (0-indexed from LSB).
#[inline]
pub(crate) fn highest_bit_set(value: u16) -> u8 {
    if value == 0 {
        0
    } else {
        15 - value.leading_zeros() as u8
    }
}
