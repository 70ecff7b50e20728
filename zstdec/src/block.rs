//! Block content decompression.
//!
//! [`BlockDecompressor`] decodes the blocks of one frame in order. It owns
//! the state that carries from block to block: the last Huffman table, the
//! last FSE table per sequence symbol class, and the repeat offsets.

use crate::execute::{RepeatOffsets, execute_sequences};
use crate::huffman::HuffmanTable;
use crate::literals::decode_literals_section;
use crate::sequences::{SequenceTables, decode_sequences_section};
use crate::{BlockType, MAX_BLOCK_SIZE};
use log::trace;
use zstdec_core::error::{DecodeError, Result};

/// One block as delivered by framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// Block type.
    pub block_type: BlockType,
    /// Content bytes: the data of a raw block, the single byte of an RLE
    /// block, or the literals and sequences sections of a compressed block.
    pub content: &'a [u8],
    /// Whether this is the last block of its frame.
    pub is_last: bool,
    /// Size from the block header. For RLE blocks this is the number of
    /// bytes produced.
    pub declared_size: usize,
}

impl<'a> Block<'a> {
    /// A raw block.
    pub fn raw(content: &'a [u8], is_last: bool) -> Self {
        Self {
            block_type: BlockType::Raw,
            content,
            is_last,
            declared_size: content.len(),
        }
    }

    /// An RLE block producing `count` copies of `content[0]`.
    pub fn rle(content: &'a [u8], count: usize, is_last: bool) -> Self {
        Self {
            block_type: BlockType::Rle,
            content,
            is_last,
            declared_size: count,
        }
    }

    /// A compressed block.
    pub fn compressed(content: &'a [u8], is_last: bool) -> Self {
        Self {
            block_type: BlockType::Compressed,
            content,
            is_last,
            declared_size: content.len(),
        }
    }
}

/// Entropy tables and repeat offsets carried between the blocks of a frame.
#[derive(Debug, Clone, Default)]
pub struct FrameTables {
    /// Most recent Huffman table for literals.
    pub huffman: Option<HuffmanTable>,
    /// Most recent FSE table per sequence symbol class.
    pub sequences: SequenceTables,
    /// Repeat offset cache.
    pub repeat_offsets: RepeatOffsets,
}

impl FrameTables {
    /// Fresh state for the start of a frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return to the start-of-frame state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Decodes the blocks of one frame.
#[derive(Debug, Clone)]
pub struct BlockDecompressor {
    /// Declared window size of the frame.
    window_size: usize,
    /// State shared between blocks.
    tables: FrameTables,
    /// Index of the next block.
    block_index: usize,
}

impl BlockDecompressor {
    /// Create a decompressor for a frame with the given window size.
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            tables: FrameTables::new(),
            block_index: 0,
        }
    }

    /// Declared window size of the frame.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// State carried between blocks.
    pub fn tables(&self) -> &FrameTables {
        &self.tables
    }

    /// Number of blocks decoded so far.
    pub fn blocks_decoded(&self) -> usize {
        self.block_index
    }

    /// Decode one block, appending its content to `output`.
    ///
    /// `output` must hold everything decoded so far in the frame. On error
    /// `output` and the frame tables are left as they were and the error
    /// carries the block's index.
    pub fn decompress_block(&mut self, block: &Block<'_>, output: &mut Vec<u8>) -> Result<()> {
        let index = self.block_index;
        self.block_index += 1;
        let start = output.len();
        // Only compressed blocks touch the tables.
        let saved = (block.block_type == BlockType::Compressed).then(|| self.tables.clone());

        trace!(
            "block {}: {:?}, {} content bytes, last={}",
            index,
            block.block_type,
            block.content.len(),
            block.is_last
        );

        let result = match block.block_type {
            BlockType::Raw => {
                output.extend_from_slice(block.content);
                Ok(())
            }
            BlockType::Rle => decompress_rle(block, output),
            BlockType::Compressed => self.decompress_compressed(block.content, output),
        }
        .and_then(|()| {
            let produced = output.len() - start;
            if produced > MAX_BLOCK_SIZE {
                Err(DecodeError::corrupted(
                    0,
                    format!("block produced {} bytes, limit {}", produced, MAX_BLOCK_SIZE),
                ))
            } else {
                Ok(())
            }
        });

        result.map_err(|err| {
            output.truncate(start);
            if let Some(tables) = saved {
                self.tables = tables;
            }
            err.in_block(index)
        })
    }

    fn decompress_compressed(&mut self, content: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let (literals, literals_size) = decode_literals_section(content, &mut self.tables.huffman)?;
        if literals.len() > MAX_BLOCK_SIZE {
            return Err(DecodeError::corrupted(
                0,
                format!("{} literals exceed the block size limit", literals.len()),
            ));
        }

        let sequences =
            decode_sequences_section(&content[literals_size..], &mut self.tables.sequences)?;

        execute_sequences(
            &sequences,
            &literals,
            &mut self.tables.repeat_offsets,
            output,
            self.window_size,
        )
    }
}

fn decompress_rle(block: &Block<'_>, output: &mut Vec<u8>) -> Result<()> {
    let Some(&byte) = block.content.first() else {
        return Err(DecodeError::corrupted(0, "RLE block without content byte"));
    };
    if block.declared_size > MAX_BLOCK_SIZE {
        return Err(DecodeError::corrupted(
            0,
            format!(
                "RLE block of {} bytes exceeds limit {}",
                block.declared_size, MAX_BLOCK_SIZE
            ),
        ));
    }
    let Some(end) = output.len().checked_add(block.declared_size) else {
        return Err(DecodeError::corrupted(0, "RLE block overflows the output"));
    };
    output.resize(end, byte);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decompressor() -> BlockDecompressor {
        BlockDecompressor::new(1 << 20)
    }

    #[test]
    fn test_raw_block() {
        let mut output = b"ab".to_vec();
        let mut blocks = decompressor();
        blocks
            .decompress_block(&Block::raw(b"cdef", true), &mut output)
            .unwrap();
        assert_eq!(output, b"abcdef");
    }

    #[test]
    fn test_rle_block_sizes() {
        for count in [0usize, 1, 4096] {
            let mut output = Vec::new();
            let mut blocks = decompressor();
            blocks
                .decompress_block(&Block::rle(&[0x5A], count, true), &mut output)
                .unwrap();
            assert_eq!(output.len(), count);
            assert!(output.iter().all(|&b| b == 0x5A));
        }
    }

    #[test]
    fn test_rle_block_too_large() {
        let mut output = Vec::new();
        let mut blocks = decompressor();
        let err = blocks
            .decompress_block(&Block::rle(&[1], MAX_BLOCK_SIZE + 1, true), &mut output)
            .unwrap_err();
        assert_eq!(err.block_index(), Some(0));
        assert!(output.is_empty());
    }

    #[test]
    fn test_rle_block_huge_sizes() {
        for count in [usize::MAX, 1 << 40] {
            let mut output = b"keep".to_vec();
            let mut blocks = decompressor();
            let err = blocks
                .decompress_block(&Block::rle(&[1], count, true), &mut output)
                .unwrap_err();
            assert_eq!(err.block_index(), Some(0));
            assert!(matches!(err.root_cause(), DecodeError::CorruptedData { .. }));
            assert_eq!(output, b"keep");
        }
    }

    #[test]
    fn test_predefined_sequence_block() {
        let content = [0x18, b'a', b'b', b'c', 0x01, 0x00, 0x08, 0x6E, 0x08];
        let mut output = b"xyzzy".to_vec();
        let mut blocks = decompressor();

        blocks
            .decompress_block(&Block::compressed(&content, true), &mut output)
            .unwrap();
        assert_eq!(output, b"xyzzyabcccccc");
        assert_eq!(blocks.tables().repeat_offsets.get(), [1, 1, 4]);
    }

    #[test]
    fn test_rle_mode_sequences_and_trailing_literals() {
        let content = [0x18, b'X', b'Y', b'Z', 0x02, 0x54, 0x01, 0x03, 0x01, 0x55];
        let mut output = b"0123456789ABCDEF".to_vec();
        let mut blocks = decompressor();

        blocks
            .decompress_block(&Block::compressed(&content, true), &mut output)
            .unwrap();
        assert_eq!(output, b"0123456789ABCDEFXABCDYCDEFZ");
        assert_eq!(blocks.tables().repeat_offsets.get(), [10, 7, 1]);
    }

    #[test]
    fn test_treeless_literals_across_blocks() {
        let mut first = vec![0x82, 0x40, 0x0D, 227];
        first.extend_from_slice(&[0u8; 48]);
        first.extend_from_slice(&[0x02, 0x11, 0x1D, 0x6C, 0x00]);
        let second = [0x83, 0x80, 0x00, 0x1D, 0x6C, 0x00];

        let mut output = Vec::new();
        let mut blocks = decompressor();
        blocks
            .decompress_block(&Block::compressed(&first, false), &mut output)
            .unwrap();
        blocks
            .decompress_block(&Block::compressed(&second, true), &mut output)
            .unwrap();
        assert_eq!(output, b"dadbcddadadbcdda");
        assert_eq!(blocks.blocks_decoded(), 2);
    }

    #[test]
    fn test_error_tagging_and_rollback() {
        let mut output = b"prefix".to_vec();
        let mut blocks = decompressor();
        blocks
            .decompress_block(&Block::raw(b"-ok", false), &mut output)
            .unwrap();

        // Treeless literals with no table decoded yet.
        let content = [0x83, 0x80, 0x00, 0x1D, 0x6C, 0x00];
        let err = blocks
            .decompress_block(&Block::compressed(&content, true), &mut output)
            .unwrap_err();

        assert_eq!(err.block_index(), Some(1));
        assert!(matches!(err.root_cause(), DecodeError::NoPriorHuffmanTable));
        assert_eq!(output, b"prefix-ok");
    }

    #[test]
    fn test_window_violation_rolls_back() {
        // All-RLE sequence: no literals, offset value 1, which selects the
        // second repeat offset (4) while nothing has been decoded.
        let mut content = vec![0x18, b'a', b'b', b'c'];
        content.extend_from_slice(&[0x01, 0x54, 0x00, 0x00, 0x01, 0x01]);
        let mut output = Vec::new();
        let mut blocks = decompressor();
        let err = blocks
            .decompress_block(&Block::compressed(&content, true), &mut output)
            .unwrap_err();

        assert!(matches!(
            err.root_cause(),
            DecodeError::OffsetOutOfWindow {
                offset: 4,
                history: 0,
                ..
            }
        ));
        assert!(output.is_empty());
        // Resolving the offset rotated the cache; the failure restores it.
        assert_eq!(blocks.tables().repeat_offsets.get(), RepeatOffsets::INITIAL);
    }

    #[test]
    fn test_failed_block_keeps_prior_huffman_state() {
        // Valid Huffman literals followed by a sequences section with the
        // reserved modes bits set.
        let mut content = vec![0x82, 0x40, 0x0D, 227];
        content.extend_from_slice(&[0u8; 48]);
        content.extend_from_slice(&[0x02, 0x11, 0x1D, 0x6C, 0x01, 0x03]);

        let mut output = Vec::new();
        let mut blocks = decompressor();
        assert!(
            blocks
                .decompress_block(&Block::compressed(&content, true), &mut output)
                .is_err()
        );
        assert!(blocks.tables().huffman.is_none());
        assert!(output.is_empty());
    }

    #[test]
    fn test_frame_tables_reset() {
        let mut tables = FrameTables::new();
        tables.repeat_offsets.resolve(3 + 100, 1).unwrap();
        tables.huffman = Some(HuffmanTable::from_weights(&[1]).unwrap());
        tables.reset();
        assert!(tables.huffman.is_none());
        assert_eq!(tables.repeat_offsets.get(), RepeatOffsets::INITIAL);
    }
}
