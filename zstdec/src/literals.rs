//! Literals section decoding for Zstandard.
//!
//! The literals section contains literal bytes that are copied directly
//! to the output, either uncompressed or Huffman-encoded.

use crate::LiteralsBlockType;
use crate::huffman::HuffmanTable;
use log::trace;
use zstdec_core::error::{DecodeError, Result};

/// Decoded literals section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralsHeader {
    /// Block type.
    pub block_type: LiteralsBlockType,
    /// Regenerated (uncompressed) size.
    pub regenerated_size: usize,
    /// Bytes of section content following the header.
    pub compressed_size: usize,
    /// Number of streams (1 or 4).
    pub num_streams: usize,
    /// Header size in bytes.
    pub header_size: usize,
}

impl LiteralsHeader {
    /// Parse a literals section header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let Some(&byte0) = data.first() else {
            return Err(DecodeError::corrupted(0, "empty literals section"));
        };

        let block_type = LiteralsBlockType::from_bits(byte0);
        let size_format = (byte0 >> 2) & 0x03;

        match block_type {
            LiteralsBlockType::Raw | LiteralsBlockType::Rle => {
                // 5, 12 or 20 bits of regenerated size.
                let header_size = match size_format {
                    0 | 2 => 1,
                    1 => 2,
                    _ => 3,
                };
                let bytes = header_bytes(data, header_size)?;

                let regenerated_size = match header_size {
                    1 => (byte0 >> 3) as usize,
                    2 => ((byte0 >> 4) as usize) | ((bytes[1] as usize) << 4),
                    _ => {
                        ((byte0 >> 4) as usize)
                            | ((bytes[1] as usize) << 4)
                            | ((bytes[2] as usize) << 12)
                    }
                };

                Ok(Self {
                    block_type,
                    regenerated_size,
                    compressed_size: if block_type == LiteralsBlockType::Rle {
                        1
                    } else {
                        regenerated_size
                    },
                    num_streams: 1,
                    header_size,
                })
            }
            LiteralsBlockType::Compressed | LiteralsBlockType::Treeless => {
                // Both sizes share one little-endian field after the low nibble.
                let (header_size, size_bits, num_streams) = match size_format {
                    0 => (3, 10, 1),
                    1 => (3, 10, 4),
                    2 => (4, 14, 4),
                    _ => (5, 18, 4),
                };
                let bytes = header_bytes(data, header_size)?;

                let combined = bytes[1..]
                    .iter()
                    .enumerate()
                    .fold((byte0 >> 4) as u64, |acc, (i, &b)| {
                        acc | ((b as u64) << (4 + 8 * i))
                    });
                let mask = (1u64 << size_bits) - 1;

                Ok(Self {
                    block_type,
                    regenerated_size: (combined & mask) as usize,
                    compressed_size: ((combined >> size_bits) & mask) as usize,
                    num_streams,
                    header_size,
                })
            }
        }
    }

    /// Total bytes the section occupies, header included.
    pub fn section_size(&self) -> usize {
        self.header_size + self.compressed_size
    }
}

fn header_bytes(data: &[u8], header_size: usize) -> Result<&[u8]> {
    data.get(..header_size)
        .ok_or_else(|| DecodeError::corrupted(0, "truncated literals header"))
}

/// Decode a literals section.
///
/// `huffman` is the frame's most recent Huffman table; a compressed section
/// replaces it, a treeless section requires it. Returns the literals and the
/// number of bytes the section occupies.
pub fn decode_literals_section(
    data: &[u8],
    huffman: &mut Option<HuffmanTable>,
) -> Result<(Vec<u8>, usize)> {
    let header = LiteralsHeader::parse(data)?;
    let content = &data[header.header_size..];

    trace!(
        "literals: {:?}, {} bytes regenerated, {} streams",
        header.block_type, header.regenerated_size, header.num_streams
    );

    let body = content.get(..header.compressed_size).ok_or_else(|| {
        DecodeError::corrupted(
            header.header_size as u64,
            format!(
                "literals section needs {} bytes, {} available",
                header.compressed_size,
                content.len()
            ),
        )
    })?;

    let literals = match header.block_type {
        LiteralsBlockType::Raw => body.to_vec(),
        LiteralsBlockType::Rle => vec![body[0]; header.regenerated_size],
        LiteralsBlockType::Compressed => {
            let (table, table_size) = HuffmanTable::parse(body)?;
            let table = huffman.insert(table);
            decode_huffman_streams(
                table,
                &body[table_size..],
                header.regenerated_size,
                header.num_streams,
            )?
        }
        LiteralsBlockType::Treeless => {
            let table = huffman.as_ref().ok_or(DecodeError::NoPriorHuffmanTable)?;
            decode_huffman_streams(table, body, header.regenerated_size, header.num_streams)?
        }
    };

    Ok((literals, header.section_size()))
}

/// Decode one or four Huffman streams, concatenating their output.
fn decode_huffman_streams(
    table: &HuffmanTable,
    data: &[u8],
    total_size: usize,
    num_streams: usize,
) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(total_size);

    if num_streams == 1 {
        table.decode_stream(data, total_size, &mut output)?;
        return Ok(output);
    }

    // Jump table: sizes of the first three streams.
    let Some(jump) = data.get(..6) else {
        return Err(DecodeError::corrupted(0, "truncated 4-stream jump table"));
    };
    let sizes = [
        u16::from_le_bytes([jump[0], jump[1]]) as usize,
        u16::from_le_bytes([jump[2], jump[3]]) as usize,
        u16::from_le_bytes([jump[4], jump[5]]) as usize,
    ];

    let streams = &data[6..];
    let declared: usize = sizes.iter().sum();
    if declared > streams.len() {
        return Err(DecodeError::corrupted(
            0,
            format!(
                "jump table declares {} bytes, {} available",
                declared,
                streams.len()
            ),
        ));
    }

    let segment = total_size.div_ceil(4);
    let Some(last_segment) = total_size.checked_sub(3 * segment) else {
        return Err(DecodeError::corrupted(
            0,
            format!("{} literals cannot be split into four streams", total_size),
        ));
    };

    let (first, rest) = streams.split_at(sizes[0]);
    let (second, rest) = rest.split_at(sizes[1]);
    let (third, fourth) = rest.split_at(sizes[2]);

    table.decode_stream(first, segment, &mut output)?;
    table.decode_stream(second, segment, &mut output)?;
    table.decode_stream(third, segment, &mut output)?;
    table.decode_stream(fourth, last_segment, &mut output)?;

    Ok(output)
}
