//! Error types for zstdec operations.
//!
//! Every failure the decoder can report is a variant of [`DecodeError`].
//! Decompression is deterministic, so none of these are retryable: an error
//! means the frame being decoded is abandoned as a whole.

use std::fmt;
use thiserror::Error;

/// The class of entropy-coded symbol a table belongs to.
///
/// Used both as error context and to look up the per-class limits the
/// format imposes on FSE tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolClass {
    /// Literal-length codes of the sequences section.
    LiteralLength,
    /// Match-length codes of the sequences section.
    MatchLength,
    /// Offset codes of the sequences section.
    Offset,
    /// Huffman weights in a compressed literals tree description.
    HuffmanWeight,
}

impl SymbolClass {
    /// Largest accuracy log a distribution of this class may declare.
    pub const fn max_accuracy_log(self) -> u8 {
        match self {
            SymbolClass::LiteralLength | SymbolClass::MatchLength => 9,
            SymbolClass::Offset => 8,
            SymbolClass::HuffmanWeight => 6,
        }
    }

    /// Largest symbol value of this class.
    pub const fn max_symbol(self) -> u8 {
        match self {
            SymbolClass::LiteralLength => 35,
            SymbolClass::MatchLength => 52,
            SymbolClass::Offset => 31,
            SymbolClass::HuffmanWeight => 11,
        }
    }
}

impl fmt::Display for SymbolClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SymbolClass::LiteralLength => "literal length",
            SymbolClass::MatchLength => "match length",
            SymbolClass::Offset => "offset",
            SymbolClass::HuffmanWeight => "huffman weight",
        };
        f.write_str(name)
    }
}

/// The main error type for zstdec operations.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// An entropy-coded bitstream ended before the expected bits were read.
    #[error("Bitstream exhausted: requested {requested} bits, {available} available")]
    BitstreamExhausted {
        /// Number of bits the decoder tried to consume.
        requested: usize,
        /// Number of bits left in the stream.
        available: usize,
    },

    /// Malformed FSE distribution or table parameters.
    #[error("Invalid {class} distribution: {message}")]
    InvalidDistribution {
        /// Symbol class the distribution was declared for.
        class: SymbolClass,
        /// Description of the problem.
        message: String,
    },

    /// Malformed Huffman tree description.
    #[error("Invalid Huffman table: {message}")]
    InvalidHuffmanTable {
        /// Description of the problem.
        message: String,
    },

    /// Treeless literals used before any Huffman table exists in the frame.
    #[error("Treeless literals section without a prior Huffman table")]
    NoPriorHuffmanTable,

    /// Repeat mode used before any table of that class exists in the frame.
    #[error("Repeat mode for {class} codes without a prior table")]
    NoPriorTable {
        /// Symbol class whose table was requested.
        class: SymbolClass,
    },

    /// Back-reference reaching before the decoded history or past the window.
    #[error("Offset {offset} out of window (history {history} bytes, window {window} bytes)")]
    OffsetOutOfWindow {
        /// Resolved match offset.
        offset: usize,
        /// Bytes decoded so far in the frame.
        history: usize,
        /// Declared window size of the frame.
        window: usize,
    },

    /// Corrupted data in a frame or block.
    #[error("Corrupted data at offset {offset}: {message}")]
    CorruptedData {
        /// Byte offset where corruption was detected.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Invalid magic number at the start of a frame.
    #[error("Invalid magic number: expected {expected:02x?}, found {found:02x?}")]
    InvalidMagic {
        /// Expected magic bytes.
        expected: Vec<u8>,
        /// Actual magic bytes found.
        found: Vec<u8>,
    },

    /// Invalid frame header field.
    #[error("Invalid header: {message}")]
    InvalidHeader {
        /// Description of the header error.
        message: String,
    },

    /// Input ended in the middle of a structure.
    #[error("Unexpected end of input: expected {expected} more bytes")]
    UnexpectedEof {
        /// Number of bytes that were expected but not available.
        expected: usize,
    },

    /// Frame requires a larger window than the decoder is configured to allow.
    #[error("Window size {requested} exceeds configured limit {limit}")]
    WindowTooLarge {
        /// Window size declared by the frame.
        requested: u64,
        /// Configured maximum.
        limit: usize,
    },

    /// An error raised while decoding a specific block of a frame.
    #[error("Block {index}: {source}")]
    Block {
        /// Zero-based index of the block within its frame.
        index: usize,
        /// The underlying error.
        #[source]
        source: Box<DecodeError>,
    },
}

/// Result type alias for zstdec operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

impl DecodeError {
    /// Create a bitstream exhausted error.
    pub fn exhausted(requested: usize, available: usize) -> Self {
        Self::BitstreamExhausted {
            requested,
            available,
        }
    }

    /// Create an invalid distribution error.
    pub fn invalid_distribution(class: SymbolClass, message: impl Into<String>) -> Self {
        Self::InvalidDistribution {
            class,
            message: message.into(),
        }
    }

    /// Create an invalid Huffman table error.
    pub fn invalid_huffman(message: impl Into<String>) -> Self {
        Self::InvalidHuffmanTable {
            message: message.into(),
        }
    }

    /// Create a missing repeat table error.
    pub fn no_prior_table(class: SymbolClass) -> Self {
        Self::NoPriorTable { class }
    }

    /// Create an offset out of window error.
    pub fn offset_out_of_window(offset: usize, history: usize, window: usize) -> Self {
        Self::OffsetOutOfWindow {
            offset,
            history,
            window,
        }
    }

    /// Create a corrupted data error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::CorruptedData {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid magic error.
    pub fn invalid_magic(expected: impl Into<Vec<u8>>, found: impl Into<Vec<u8>>) -> Self {
        Self::InvalidMagic {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Create an invalid header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an unexpected EOF error.
    pub fn unexpected_eof(expected: usize) -> Self {
        Self::UnexpectedEof { expected }
    }

    /// Create a window too large error.
    pub fn window_too_large(requested: u64, limit: usize) -> Self {
        Self::WindowTooLarge { requested, limit }
    }

    /// Tag this error with the index of the block it occurred in.
    ///
    /// Errors already tagged keep their original index.
    pub fn in_block(self, index: usize) -> Self {
        match self {
            tagged @ Self::Block { .. } => tagged,
            other => Self::Block {
                index,
                source: Box::new(other),
            },
        }
    }

    /// Index of the block this error was raised in, if tagged.
    pub fn block_index(&self) -> Option<usize> {
        match self {
            Self::Block { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The error with any block tagging removed.
    pub fn root_cause(&self) -> &DecodeError {
        match self {
            Self::Block { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
