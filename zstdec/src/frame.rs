//! Zstandard frame parsing and decompression.
//!
//! Handles the top-level frame format: frame header, block headers,
//! skippable frames, and the optional content checksum. Block contents are
//! handed to [`BlockDecompressor`].

use crate::block::{Block, BlockDecompressor};
use crate::config::DecoderConfig;
use crate::{BlockType, MAX_BLOCK_SIZE, SKIPPABLE_MAGIC_HIGH, SKIPPABLE_MAGIC_LOW, ZSTD_MAGIC};
use log::{debug, trace, warn};
use std::fmt;
use zstdec_core::error::{DecodeError, Result};

/// Frame header descriptor flags.
const FHD_SINGLE_SEGMENT: u8 = 0x20;
const FHD_RESERVED: u8 = 0x08;
const FHD_CONTENT_CHECKSUM: u8 = 0x04;
const FHD_DICT_ID_FLAG_MASK: u8 = 0x03;
const FHD_CONTENT_SIZE_FLAG_MASK: u8 = 0xC0;

/// Size of a block header in bytes.
pub const BLOCK_HEADER_SIZE: usize = 3;

/// Size of the content checksum in bytes.
pub const CHECKSUM_SIZE: usize = 4;

/// Bytes shown per block by [`FrameSummary`]'s `Display`.
const PREVIEW_LEN: usize = 16;

/// Zstandard frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Window size for back-references.
    pub window_size: u64,
    /// Uncompressed content size (if known).
    pub content_size: Option<u64>,
    /// Dictionary ID (if present).
    pub dictionary_id: Option<u32>,
    /// Whether content checksum is present.
    pub has_checksum: bool,
    /// Whether the frame is a single segment.
    pub single_segment: bool,
    /// Header size in bytes, magic number included.
    pub header_size: usize,
}

impl FrameHeader {
    /// Parse a frame header starting at the magic number.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 5 {
            return Err(DecodeError::unexpected_eof(5 - data.len()));
        }

        // Check magic
        if data[0..4] != ZSTD_MAGIC {
            return Err(DecodeError::invalid_magic(ZSTD_MAGIC, &data[0..4]));
        }

        let descriptor = data[4];
        if descriptor & FHD_RESERVED != 0 {
            return Err(DecodeError::invalid_header(
                "reserved bit set in frame header descriptor",
            ));
        }

        let single_segment = (descriptor & FHD_SINGLE_SEGMENT) != 0;
        let has_checksum = (descriptor & FHD_CONTENT_CHECKSUM) != 0;
        let dict_id_size = [0, 1, 2, 4][(descriptor & FHD_DICT_ID_FLAG_MASK) as usize];
        let content_size_size = match (descriptor & FHD_CONTENT_SIZE_FLAG_MASK) >> 6 {
            0 if single_segment => 1,
            0 => 0,
            1 => 2,
            2 => 4,
            _ => 8,
        };

        let window_descriptor_size = usize::from(!single_segment);
        let header_size = 5 + window_descriptor_size + dict_id_size + content_size_size;
        if data.len() < header_size {
            return Err(DecodeError::unexpected_eof(header_size - data.len()));
        }

        let mut pos = 5;

        // Window descriptor (absent if single segment)
        let window_size = if single_segment {
            None
        } else {
            let wd = data[pos];
            pos += 1;

            let exponent = (wd >> 3) as u32;
            let mantissa = (wd & 0x07) as u64;
            let base = 1u64 << (10 + exponent);
            Some(base + (base >> 3) * mantissa)
        };

        let dictionary_id = (dict_id_size > 0).then(|| read_le(&data[pos..pos + dict_id_size]) as u32);
        pos += dict_id_size;

        let content_size = (content_size_size > 0).then(|| {
            let size = read_le(&data[pos..pos + content_size_size]);
            // The 2-byte form is offset by 256.
            if content_size_size == 2 { size + 256 } else { size }
        });
        pos += content_size_size;

        // A single-segment frame's window is its whole content.
        let window_size = window_size.or(content_size).unwrap_or(0);

        Ok(Self {
            window_size,
            content_size,
            dictionary_id,
            has_checksum,
            single_segment,
            header_size: pos,
        })
    }
}

/// Little-endian integer from up to 8 bytes.
fn read_le(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .rev()
        .fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Zstandard block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Whether this is the last block of the frame.
    pub is_last: bool,
    /// Block type.
    pub block_type: BlockType,
    /// Block size field: content length, or the repeat count of an RLE block.
    pub size: usize,
}

impl BlockHeader {
    /// Parse a 3-byte little-endian block header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let Some(bytes) = data.get(..BLOCK_HEADER_SIZE) else {
            return Err(DecodeError::unexpected_eof(BLOCK_HEADER_SIZE - data.len()));
        };

        let raw = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        Ok(Self {
            is_last: raw & 1 != 0,
            block_type: BlockType::from_bits((raw >> 1) as u8)?,
            size: (raw >> 3) as usize,
        })
    }

    /// Number of content bytes following the header.
    pub fn content_size(&self) -> usize {
        match self.block_type {
            BlockType::Rle => 1,
            _ => self.size,
        }
    }
}

/// Kind of frame found in a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A Zstandard frame.
    Zstandard,
    /// A skippable frame carrying user data.
    Skippable,
}

/// Location of one frame within a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSpan {
    /// Kind of frame.
    pub kind: FrameKind,
    /// Byte offset of the frame's magic number.
    pub offset: usize,
    /// Total length of the frame in bytes.
    pub length: usize,
}

impl FrameSpan {
    /// The bytes of this frame within `data`.
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.offset..self.offset + self.length]
    }
}

/// Read the magic number at the start of `data`.
fn read_magic(data: &[u8]) -> Result<u32> {
    match data.get(..4) {
        Some(bytes) => Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])),
        None => Err(DecodeError::unexpected_eof(4 - data.len())),
    }
}

fn is_skippable(magic: u32) -> bool {
    (SKIPPABLE_MAGIC_LOW..=SKIPPABLE_MAGIC_HIGH).contains(&magic)
}

/// Total length of the skippable frame at the start of `data`.
fn skippable_frame_length(data: &[u8]) -> Result<usize> {
    let Some(size) = data.get(4..8) else {
        return Err(DecodeError::unexpected_eof(8 - data.len()));
    };
    let length = 8 + u32::from_le_bytes([size[0], size[1], size[2], size[3]]) as usize;
    if data.len() < length {
        return Err(DecodeError::unexpected_eof(length - data.len()));
    }
    Ok(length)
}

/// Blocks of one Zstandard frame, as located by their headers.
struct FrameLayout<'a> {
    header: FrameHeader,
    blocks: Vec<(usize, BlockHeader, &'a [u8])>,
    checksum: Option<u32>,
    length: usize,
}

/// Walk the headers of the Zstandard frame at the start of `data` without
/// decoding any block contents.
fn walk_frame(data: &[u8]) -> Result<FrameLayout<'_>> {
    let header = FrameHeader::parse(data)?;
    let block_limit = header.window_size.min(MAX_BLOCK_SIZE as u64) as usize;

    let mut pos = header.header_size;
    let mut blocks = Vec::new();

    loop {
        let index = blocks.len();
        let block_header = BlockHeader::parse(&data[pos..]).map_err(|e| e.in_block(index))?;
        let content_start = pos + BLOCK_HEADER_SIZE;

        if block_header.size > block_limit {
            return Err(DecodeError::corrupted(
                pos as u64,
                format!(
                    "block size {} exceeds maximum {}",
                    block_header.size, block_limit
                ),
            )
            .in_block(index));
        }

        let content_end = content_start + block_header.content_size();
        let Some(content) = data.get(content_start..content_end) else {
            return Err(DecodeError::unexpected_eof(content_end - data.len()).in_block(index));
        };

        blocks.push((pos, block_header, content));
        pos = content_end;

        if block_header.is_last {
            break;
        }
    }

    let checksum = if header.has_checksum {
        let Some(bytes) = data.get(pos..pos + CHECKSUM_SIZE) else {
            return Err(DecodeError::unexpected_eof(pos + CHECKSUM_SIZE - data.len()));
        };
        pos += CHECKSUM_SIZE;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    } else {
        None
    };

    Ok(FrameLayout {
        header,
        blocks,
        checksum,
        length: pos,
    })
}

/// Locate every frame in `data` using only frame and block headers.
pub fn frame_spans(data: &[u8]) -> Result<Vec<FrameSpan>> {
    let mut spans = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let rest = &data[offset..];
        let magic = read_magic(rest)?;

        let (kind, length) = if is_skippable(magic) {
            (FrameKind::Skippable, skippable_frame_length(rest)?)
        } else {
            (FrameKind::Zstandard, walk_frame(rest)?.length)
        };

        spans.push(FrameSpan {
            kind,
            offset,
            length,
        });
        offset += length;
    }

    Ok(spans)
}

/// Decodes Zstandard frames one at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameDecoder {
    config: DecoderConfig,
}

impl FrameDecoder {
    /// Create a decoder with the given configuration.
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode the frame at the start of `data`.
    ///
    /// Returns the frame's content and the number of bytes the frame
    /// occupies. A skippable frame yields no content. On error nothing of
    /// the frame is returned.
    pub fn decode_frame(&self, data: &[u8]) -> Result<(Vec<u8>, usize)> {
        let magic = read_magic(data)?;
        if is_skippable(magic) {
            let length = skippable_frame_length(data)?;
            debug!("skipping skippable frame {:#010x} of {} bytes", magic, length);
            return Ok((Vec::new(), length));
        }

        let header = FrameHeader::parse(data)?;
        debug!(
            "frame header: window {} bytes, content size {:?}, checksum {}",
            header.window_size, header.content_size, header.has_checksum
        );

        if header.window_size > self.config.max_window_size as u64 {
            return Err(DecodeError::window_too_large(
                header.window_size,
                self.config.max_window_size,
            ));
        }
        if let Some(id) = header.dictionary_id.filter(|&id| id != 0) {
            warn!("frame references dictionary {}, decoding without it", id);
        }

        let layout = walk_frame(data)?;
        let mut blocks = BlockDecompressor::new(header.window_size as usize);

        let mut output = Vec::new();
        if let Some(size) = header.content_size {
            output.reserve(size.min(self.config.max_window_size as u64) as usize);
        }

        for &(_, block_header, content) in &layout.blocks {
            let block = Block {
                block_type: block_header.block_type,
                content,
                is_last: block_header.is_last,
                declared_size: block_header.size,
            };
            blocks.decompress_block(&block, &mut output)?;
        }

        if let (true, Some(expected)) = (self.config.verify_content_size, header.content_size) {
            if output.len() as u64 != expected {
                return Err(DecodeError::corrupted(
                    layout.length as u64,
                    format!(
                        "content size mismatch: expected {}, got {}",
                        expected,
                        output.len()
                    ),
                ));
            }
        }

        debug!(
            "frame finished: {} blocks, {} bytes in, {} bytes out",
            layout.blocks.len(),
            layout.length,
            output.len()
        );

        Ok((output, layout.length))
    }
}

/// Decompress every frame in `data` and concatenate the results.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with_config(data, DecoderConfig::DEFAULT)
}

/// Decompress every frame in `data` using `config`.
pub fn decompress_with_config(data: &[u8], config: DecoderConfig) -> Result<Vec<u8>> {
    let decoder = FrameDecoder::new(config);
    let mut output = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let (frame, consumed) = decoder.decode_frame(&data[offset..])?;
        trace!("frame at {} produced {} bytes", offset, frame.len());
        output.extend_from_slice(&frame);
        offset += consumed;
    }

    Ok(output)
}

/// Decompress independent frames concurrently (requires `parallel` feature).
///
/// Frame boundaries are located from headers first, then each frame is
/// decoded by its own worker. The output is identical to [`decompress`].
#[cfg(feature = "parallel")]
pub fn decompress_parallel(data: &[u8]) -> Result<Vec<u8>> {
    decompress_parallel_with_config(data, DecoderConfig::DEFAULT)
}

/// Parallel variant of [`decompress_with_config`] (requires `parallel` feature).
#[cfg(feature = "parallel")]
pub fn decompress_parallel_with_config(data: &[u8], config: DecoderConfig) -> Result<Vec<u8>> {
    use rayon::prelude::*;

    let spans = frame_spans(data)?;
    let decoder = FrameDecoder::new(config);

    let frames: Vec<Result<Vec<u8>>> = spans
        .par_iter()
        .map(|span| match span.kind {
            FrameKind::Skippable => Ok(Vec::new()),
            FrameKind::Zstandard => decoder
                .decode_frame(span.slice(data))
                .map(|(output, _)| output),
        })
        .collect();

    let mut output = Vec::new();
    for frame in frames {
        output.extend_from_slice(&frame?);
    }
    Ok(output)
}

/// Structure of one block, as reported by [`inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSummary {
    /// Byte offset of the block header within the inspected input.
    pub offset: usize,
    /// Decoded block header.
    pub header: BlockHeader,
    /// Leading content bytes.
    pub preview: Vec<u8>,
}

/// Structure of one frame, as reported by [`inspect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameSummary {
    /// A Zstandard frame.
    Zstandard {
        /// Byte offset of the frame within the inspected input.
        offset: usize,
        /// Decoded frame header.
        header: FrameHeader,
        /// Blocks in frame order.
        blocks: Vec<BlockSummary>,
        /// Content checksum, if present.
        checksum: Option<u32>,
        /// Total frame length in bytes.
        length: usize,
    },
    /// A skippable frame.
    Skippable {
        /// Byte offset of the frame within the inspected input.
        offset: usize,
        /// Magic number.
        magic: u32,
        /// Total frame length in bytes.
        length: usize,
    },
}

/// Describe every frame in `data` without decoding block contents.
pub fn inspect(data: &[u8]) -> Result<Vec<FrameSummary>> {
    let mut summaries = Vec::new();

    for span in frame_spans(data)? {
        let frame = span.slice(data);
        let summary = match span.kind {
            FrameKind::Skippable => FrameSummary::Skippable {
                offset: span.offset,
                magic: read_magic(frame)?,
                length: span.length,
            },
            FrameKind::Zstandard => {
                let layout = walk_frame(frame)?;
                let blocks = layout
                    .blocks
                    .iter()
                    .map(|&(pos, header, content)| BlockSummary {
                        offset: span.offset + pos,
                        header,
                        preview: content[..content.len().min(PREVIEW_LEN)].to_vec(),
                    })
                    .collect();
                FrameSummary::Zstandard {
                    offset: span.offset,
                    header: layout.header,
                    blocks,
                    checksum: layout.checksum,
                    length: layout.length,
                }
            }
        };
        summaries.push(summary);
    }

    Ok(summaries)
}

fn write_preview(f: &mut fmt::Formatter<'_>, bytes: &[u8], truncated: bool) -> fmt::Result {
    for b in bytes {
        write!(f, "{:02x}", b)?;
    }
    if truncated {
        f.write_str("...")?;
    }
    if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') && !bytes.is_empty() {
        write!(f, " {:?}", String::from_utf8_lossy(bytes))?;
    }
    Ok(())
}

impl fmt::Display for BlockSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = &self.header;
        writeln!(f, "  block @{} {{", self.offset)?;
        writeln!(f, "    type: {:?}", header.block_type)?;
        match header.block_type {
            BlockType::Rle => {
                writeln!(f, "    count: {}", header.size)?;
                f.write_str("    value: ")?;
            }
            _ => {
                writeln!(f, "    size: {}", header.size)?;
                f.write_str("    data: ")?;
            }
        }
        write_preview(f, &self.preview, header.content_size() > self.preview.len())?;
        writeln!(f)?;
        if header.is_last {
            writeln!(f, "    last: true")?;
        }
        writeln!(f, "  }}")
    }
}

impl fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameSummary::Skippable {
                offset,
                magic,
                length,
            } => {
                writeln!(f, "skippable frame @{} {{", offset)?;
                writeln!(f, "  magic: {:#010x}", magic)?;
                writeln!(f, "  length: {}", length)?;
                writeln!(f, "}}")
            }
            FrameSummary::Zstandard {
                offset,
                header,
                blocks,
                checksum,
                length,
            } => {
                writeln!(f, "frame @{} {{", offset)?;
                writeln!(f, "  length: {}", length)?;
                writeln!(f, "  single segment: {}", header.single_segment)?;
                writeln!(f, "  window size: {}", header.window_size)?;
                if let Some(id) = header.dictionary_id {
                    writeln!(f, "  dictionary id: {}", id)?;
                }
                if let Some(size) = header.content_size {
                    writeln!(f, "  content size: {}", size)?;
                }
                for block in blocks {
                    write!(f, "{}", block)?;
                }
                if let Some(sum) = checksum {
                    writeln!(f, "  checksum: {:08x}", sum)?;
                }
                writeln!(f, "}}")
            }
        }
    }
}
