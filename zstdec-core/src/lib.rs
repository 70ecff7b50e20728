//! # zstdec Core
//!
//! Core components shared by the zstdec decoder.
//!
//! - [`bitstream`]: forward and reversed bit readers, and the matching
//!   reversed-stream writer
//! - [`error`]: error types and the [`SymbolClass`] tag
//!
//! ## Example
//!
//! ```rust
//! use zstdec_core::bitstream::ReverseBitReader;
//!
//! // One payload byte followed by a byte holding only the sentinel bit.
//! let data = [0xA5, 0x01];
//! let mut reader = ReverseBitReader::new(&data).unwrap();
//! assert_eq!(reader.read_bits(8).unwrap(), 0xA5);
//! assert!(reader.is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod error;

// Re-exports for convenience
pub use bitstream::{BackwardBitWriter, ForwardBitReader, ReverseBitReader};
pub use error::{DecodeError, Result, SymbolClass};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BackwardBitWriter, ForwardBitReader, ReverseBitReader};
    pub use crate::error::{DecodeError, Result, SymbolClass};
}
