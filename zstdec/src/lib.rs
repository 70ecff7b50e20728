//! # zstdec
//!
//! Pure Rust decompression of the Zstandard (zstd) format (RFC 8878).
//!
//! The crate is split along the format's own layers:
//!
//! - [`fse`]: Finite State Entropy tables and distribution headers
//! - [`huffman`]: Huffman tree descriptions and literal streams
//! - [`literals`]: the literals section of a compressed block
//! - [`sequences`]: the sequences section and its three FSE state machines
//! - [`execute`]: sequence execution and repeat offsets
//! - [`block`]: per-block decompression with frame-scoped tables
//! - [`frame`]: frame headers, block headers, skippable frames
//!
//! ## Features
//!
//! - Raw, RLE and compressed blocks, including treeless literals and
//!   repeated sequence tables
//! - Concatenated and skippable frames
//! - Configurable window limit and content size verification
//! - Structural inspection of frames without decoding
//! - Parallel decoding of independent frames (`parallel` feature)
//!
//! Compression, dictionaries, and checksum verification are not provided;
//! the content checksum is exposed by [`inspect`] but never computed.
//!
//! ## Example
//!
//! ```rust
//! use zstdec::decompress;
//!
//! // A frame holding one raw block with "Hello".
//! let frame = [
//!     0x28, 0xB5, 0x2F, 0xFD, 0x20, 0x05, 0x29, 0x00, 0x00, b'H', b'e', b'l', b'l', b'o',
//! ];
//! assert_eq!(decompress(&frame).unwrap(), b"Hello");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block;
pub mod config;
pub mod execute;
pub mod frame;
pub mod fse;
pub mod huffman;
pub mod literals;
pub mod sequences;

pub use block::{Block, BlockDecompressor, FrameTables};
pub use config::{DEFAULT_MAX_WINDOW_SIZE, DecoderConfig};
pub use execute::RepeatOffsets;
pub use frame::{
    BlockHeader, BlockSummary, FrameDecoder, FrameHeader, FrameKind, FrameSpan, FrameSummary,
    decompress, decompress_with_config, frame_spans, inspect,
};
pub use sequences::Sequence;
pub use zstdec_core::error::{DecodeError, Result, SymbolClass};

#[cfg(feature = "parallel")]
pub use frame::{decompress_parallel, decompress_parallel_with_config};

/// Zstandard magic number (0xFD2FB528 little-endian).
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Skippable frame magic number range start (0x184D2A50).
pub const SKIPPABLE_MAGIC_LOW: u32 = 0x184D2A50;

/// Skippable frame magic number range end (0x184D2A5F).
pub const SKIPPABLE_MAGIC_HIGH: u32 = 0x184D2A5F;

/// Maximum block size (128 KB).
pub const MAX_BLOCK_SIZE: usize = 128 * 1024;

/// Block types in Zstandard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Raw uncompressed block.
    Raw,
    /// RLE block (single byte repeated).
    Rle,
    /// Compressed block with literals and sequences.
    Compressed,
}

impl BlockType {
    /// Create block type from 2-bit value.
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits & 0x03 {
            0 => Ok(BlockType::Raw),
            1 => Ok(BlockType::Rle),
            2 => Ok(BlockType::Compressed),
            _ => Err(DecodeError::corrupted(0, "reserved block type")),
        }
    }
}

/// Literals block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralsBlockType {
    /// Raw literals (uncompressed).
    Raw,
    /// RLE literals (single byte).
    Rle,
    /// Compressed with Huffman, tree included.
    Compressed,
    /// Compressed with Huffman, uses previous tree.
    Treeless,
}

impl LiteralsBlockType {
    /// Create from 2-bit value.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => LiteralsBlockType::Raw,
            1 => LiteralsBlockType::Rle,
            2 => LiteralsBlockType::Compressed,
            _ => LiteralsBlockType::Treeless,
        }
    }
}
