//! Sequence execution.
//!
//! Replays decoded sequences against the block's literals and the frame's
//! output so far, resolving repeat offsets along the way.

use crate::MAX_BLOCK_SIZE;
use crate::sequences::Sequence;
use zstdec_core::error::{DecodeError, Result};

/// The three most recently used match offsets, most recent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatOffsets {
    offsets: [usize; 3],
}

impl Default for RepeatOffsets {
    fn default() -> Self {
        Self::new()
    }
}

impl RepeatOffsets {
    /// Offsets every frame starts with.
    pub const INITIAL: [usize; 3] = [1, 4, 8];

    /// Create a cache holding the initial offsets.
    pub fn new() -> Self {
        Self {
            offsets: Self::INITIAL,
        }
    }

    /// Current offsets, most recent first.
    pub fn get(&self) -> [usize; 3] {
        self.offsets
    }

    /// Resolve an offset value to a match offset, updating the cache.
    pub fn resolve(&mut self, offset_code: usize, literal_length: usize) -> Result<usize> {
        let [r0, r1, r2] = self.offsets;

        if offset_code > 3 {
            let offset = offset_code - 3;
            self.offsets = [offset, r0, r1];
            return Ok(offset);
        }

        // With no literals, the repeat indices shift by one.
        let index = offset_code + usize::from(literal_length == 0);
        let offset = match index {
            1 => r0,
            2 => {
                self.offsets = [r1, r0, r2];
                r1
            }
            3 => {
                self.offsets = [r2, r0, r1];
                r2
            }
            4 => {
                let offset = r0 - 1;
                if offset == 0 {
                    return Err(DecodeError::corrupted(0, "repeat offset resolves to zero"));
                }
                self.offsets = [offset, r0, r1];
                offset
            }
            _ => {
                return Err(DecodeError::corrupted(0, "offset value of zero"));
            }
        };

        Ok(offset)
    }
}

/// Execute `sequences` against `literals`, appending to `output`.
///
/// `output` holds everything decoded so far in the frame; matches may reach
/// back across block boundaries up to `window_size` bytes. Literals left
/// after the last sequence are appended at the end. A block may not add more
/// than [`MAX_BLOCK_SIZE`] bytes.
pub fn execute_sequences(
    sequences: &[Sequence],
    literals: &[u8],
    repeat_offsets: &mut RepeatOffsets,
    output: &mut Vec<u8>,
    window_size: usize,
) -> Result<()> {
    let block_start = output.len();
    let mut literal_pos = 0usize;

    for sequence in sequences {
        let literal_end = literal_pos + sequence.literal_length;
        let Some(run) = literals.get(literal_pos..literal_end) else {
            return Err(DecodeError::corrupted(
                output.len() as u64,
                format!(
                    "sequence needs {} literals, {} remain",
                    sequence.literal_length,
                    literals.len() - literal_pos
                ),
            ));
        };
        output.extend_from_slice(run);
        literal_pos = literal_end;

        let offset = repeat_offsets.resolve(sequence.offset_code, sequence.literal_length)?;
        if offset > output.len() || offset > window_size {
            return Err(DecodeError::offset_out_of_window(
                offset,
                output.len(),
                window_size,
            ));
        }

        if output.len() - block_start + sequence.match_length > MAX_BLOCK_SIZE {
            return Err(DecodeError::corrupted(
                output.len() as u64,
                format!("block output exceeds {} bytes", MAX_BLOCK_SIZE),
            ));
        }

        copy_match(output, offset, sequence.match_length);
    }

    output.extend_from_slice(&literals[literal_pos..]);
    Ok(())
}

/// Append `length` bytes starting `offset` bytes back. The source may
/// overlap the bytes being written.
#[inline]
fn copy_match(output: &mut Vec<u8>, offset: usize, length: usize) {
    let start = output.len() - offset;

    if offset >= length {
        output.extend_from_within(start..start + length);
    } else {
        output.reserve(length);
        for i in 0..length {
            let byte = output[start + i];
            output.push(byte);
        }
    }
}
