//! Bit-level readers and writer for entropy-coded sections.
//!
//! Two bit orders appear in the format:
//!
//! - **Forward** (`ForwardBitReader`): FSE distribution headers are read from
//!   the first byte onwards, LSB-first within each byte.
//! - **Reversed** (`ReverseBitReader`): FSE and Huffman payloads are written
//!   LSB-first by the encoder and terminated with a single `1` sentinel bit.
//!   The decoder starts at the sentinel and walks backwards, so the last bits
//!   written are the first bits read, and within one read the earliest bit
//!   consumed is the most significant one.
//!
//! `BackwardBitWriter` produces streams in the reversed layout; whatever it
//! writes last is what a `ReverseBitReader` returns first.
//!
//! # Example
//!
//! ```
//! use zstdec_core::bitstream::{BackwardBitWriter, ReverseBitReader};
//!
//! let mut writer = BackwardBitWriter::new();
//! writer.write_bits(0b101, 3);
//! writer.write_bits(0b1100, 4);
//! let stream = writer.finish();
//!
//! let mut reader = ReverseBitReader::new(&stream).unwrap();
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert!(reader.is_empty());
//! ```

use crate::error::{DecodeError, Result};

/// Largest number of bits a single read, peek, or write may span.
pub const MAX_BITS_PER_OP: u8 = 56;

/// Extract `count` bits starting at bit `start` of `data`, viewed as one
/// little-endian integer. Bits past the end of `data` read as zero.
#[inline]
fn extract_bits(data: &[u8], start: usize, count: u8) -> u64 {
    debug_assert!(count <= MAX_BITS_PER_OP);

    if count == 0 {
        return 0;
    }

    let first = start / 8;
    let mut value = 0u64;
    for (i, &byte) in data.iter().skip(first).take(8).enumerate() {
        value |= (byte as u64) << (8 * i);
    }

    (value >> (start % 8)) & ((1u64 << count) - 1)
}

/// Forward LSB-first bit reader over a byte slice.
#[derive(Debug, Clone)]
pub struct ForwardBitReader<'a> {
    /// Input bytes.
    data: &'a [u8],
    /// Bits consumed so far.
    bit_pos: usize,
}

impl<'a> ForwardBitReader<'a> {
    /// Create a reader positioned at the first bit of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Peek at `count` bits without consuming them.
    ///
    /// Bits beyond the end of the input read as zero; consuming them fails.
    #[inline]
    pub fn peek_bits(&self, count: u8) -> u64 {
        extract_bits(self.data, self.bit_pos, count)
    }

    /// Consume `count` bits.
    #[inline]
    pub fn skip_bits(&mut self, count: u8) -> Result<()> {
        let available = self.bits_remaining();
        if count as usize > available {
            return Err(DecodeError::exhausted(count as usize, available));
        }
        self.bit_pos += count as usize;
        Ok(())
    }

    /// Read `count` bits, the first bit read in the LSB position.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u64> {
        let value = self.peek_bits(count);
        self.skip_bits(count)?;
        Ok(value)
    }

    /// Number of bits consumed so far.
    pub fn bit_position(&self) -> usize {
        self.bit_pos
    }

    /// Number of unread bits.
    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }

    /// Number of whole bytes touched by the bits consumed so far.
    pub fn bytes_consumed(&self) -> usize {
        self.bit_pos.div_ceil(8)
    }
}

/// Reversed-stream bit reader.
///
/// Reads from the logical end of the input towards its start, after skipping
/// the zero padding and the sentinel bit in the final byte.
#[derive(Debug, Clone)]
pub struct ReverseBitReader<'a> {
    /// Input bytes.
    data: &'a [u8],
    /// Unread bits; the next read takes the bits just below this position.
    remaining: usize,
    /// Set once a padded read ran past the start of the stream.
    overflowed: bool,
}

impl<'a> ReverseBitReader<'a> {
    /// Create a reader, locating the sentinel bit in the last byte.
    pub fn new(data: &'a [u8]) -> Result<Self> {
        let Some(&last) = data.last() else {
            return Err(DecodeError::corrupted(0, "empty reversed bitstream"));
        };

        if last == 0 {
            return Err(DecodeError::corrupted(
                (data.len() - 1) as u64,
                "reversed bitstream has no end marker",
            ));
        }

        // Highest set bit of the last byte is the sentinel; everything above
        // it is padding.
        let remaining = data.len() * 8 - last.leading_zeros() as usize - 1;

        Ok(Self {
            data,
            remaining,
            overflowed: false,
        })
    }

    /// Read `count` bits. Reading past the start of the stream fails with
    /// [`DecodeError::BitstreamExhausted`].
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u64> {
        if count as usize > self.remaining {
            return Err(DecodeError::exhausted(count as usize, self.remaining));
        }
        self.remaining -= count as usize;
        Ok(extract_bits(self.data, self.remaining, count))
    }

    /// Peek at the next `count` bits without consuming them.
    ///
    /// If fewer than `count` bits remain, the missing low-order bits read as
    /// zero.
    #[inline]
    pub fn peek_bits(&self, count: u8) -> u64 {
        let count_usize = count as usize;
        if self.remaining >= count_usize {
            extract_bits(self.data, self.remaining - count_usize, count)
        } else {
            // `remaining < count <= 56` here, so the cast cannot truncate.
            let available = self.remaining as u8;
            extract_bits(self.data, 0, available) << (count - available)
        }
    }

    /// Consume `count` bits previously peeked.
    #[inline]
    pub fn consume(&mut self, count: u8) -> Result<()> {
        if count as usize > self.remaining {
            return Err(DecodeError::exhausted(count as usize, self.remaining));
        }
        self.remaining -= count as usize;
        Ok(())
    }

    /// Read `count` bits, treating bits before the start of the stream as
    /// zero. Records the overrun instead of failing; see
    /// [`has_overflowed`](Self::has_overflowed).
    #[inline]
    pub fn read_bits_padded(&mut self, count: u8) -> u64 {
        let value = self.peek_bits(count);
        if count as usize > self.remaining {
            self.overflowed = true;
            self.remaining = 0;
        } else {
            self.remaining -= count as usize;
        }
        value
    }

    /// Whether a padded read has run past the start of the stream.
    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Number of unread bits.
    pub fn bits_remaining(&self) -> usize {
        self.remaining
    }

    /// Whether every bit has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining == 0
    }
}

/// Writer producing streams in the reversed layout.
///
/// Bits are packed LSB-first; [`finish`](Self::finish) appends the sentinel
/// bit and pads the final byte.
#[derive(Debug, Default)]
pub struct BackwardBitWriter {
    /// Completed bytes.
    buffer: Vec<u8>,
    /// Pending bits (LSB-first).
    acc: u64,
    /// Number of pending bits, always below 8 between calls.
    bits_in_acc: u8,
    /// Total bits written.
    total_bits_written: u64,
}

impl BackwardBitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the low `count` bits of `value`.
    #[inline]
    pub fn write_bits(&mut self, value: u64, count: u8) {
        debug_assert!(count <= MAX_BITS_PER_OP, "Cannot write more than 56 bits at once");

        if count == 0 {
            return;
        }

        let value = value & ((1u64 << count) - 1);
        self.acc |= value << self.bits_in_acc;
        self.bits_in_acc += count;
        self.total_bits_written += count as u64;

        while self.bits_in_acc >= 8 {
            self.buffer.push((self.acc & 0xFF) as u8);
            self.acc >>= 8;
            self.bits_in_acc -= 8;
        }
    }

    /// Get the total number of bits written so far, excluding the sentinel.
    pub fn bits_written(&self) -> u64 {
        self.total_bits_written
    }

    /// Append the sentinel bit and return the finished stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.write_bits(1, 1);
        if self.bits_in_acc > 0 {
            self.buffer.push((self.acc & 0xFF) as u8);
        }
        self.buffer
    }
}
