//! Edge case tests for malformed and unusual input.

use proptest::prelude::*;
use zstdec::{DecodeError, decompress, frame_spans, inspect};

const TINY: &[u8] = include_bytes!("data/tiny.zst");
const TEXT: &[u8] = include_bytes!("data/text_small.zst");

/// Frame with a 1 KiB window, no content size, and one compressed block.
fn compressed_frame(content: &[u8]) -> Vec<u8> {
    let mut data = vec![0x28, 0xB5, 0x2F, 0xFD, 0x00, 0x00];
    let header = ((content.len() as u32) << 3) | (2 << 1) | 1;
    data.extend_from_slice(&header.to_le_bytes()[..3]);
    data.extend_from_slice(content);
    data
}

#[test]
fn test_empty_input() {
    assert!(decompress(b"").unwrap().is_empty());
    assert!(inspect(b"").unwrap().is_empty());
}

#[test]
fn test_empty_frame() {
    let data = include_bytes!("data/empty.zst");
    assert!(decompress(data).unwrap().is_empty());
}

#[test]
fn test_every_truncation_fails() {
    for len in 1..TINY.len() {
        assert!(decompress(&TINY[..len]).is_err(), "prefix of {len} bytes");
        assert!(frame_spans(&TINY[..len]).is_err(), "prefix of {len} bytes");
    }
}

#[test]
fn test_truncated_compressed_block() {
    // Cut inside the only block.
    let err = decompress(&TEXT[..TEXT.len() / 2]).unwrap_err();
    assert_eq!(err.block_index(), Some(0));
    assert!(matches!(err.root_cause(), DecodeError::UnexpectedEof { .. }));
}

#[test]
fn test_trailing_garbage() {
    let mut data = TINY.to_vec();
    data.extend_from_slice(b"junk data");
    assert!(matches!(
        decompress(&data),
        Err(DecodeError::InvalidMagic { .. })
    ));
}

#[test]
fn test_not_a_frame() {
    assert!(matches!(
        decompress(b"plain text, not zstd"),
        Err(DecodeError::InvalidMagic { .. })
    ));
}

#[test]
fn test_reserved_block_type() {
    let mut data = TINY.to_vec();
    // Block header byte 0: last flag, then block type 3.
    data[6] |= 0x06;
    let err = decompress(&data).unwrap_err();
    assert_eq!(err.block_index(), Some(0));
}

#[test]
fn test_reserved_sequence_modes_bits() {
    // Raw literals "abc", one sequence, and the reserved bits of the modes
    // byte set.
    let data = compressed_frame(&[0x18, b'a', b'b', b'c', 0x01, 0x03, 0x08, 0x6E, 0x08]);
    let err = decompress(&data).unwrap_err();
    assert_eq!(err.block_index(), Some(0));
}

#[test]
fn test_small_compressed_frame() {
    // Raw literals "abc" then one predefined-table sequence: literal
    // length 3, match length 5, repeat offset 1.
    let data = compressed_frame(&[0x18, b'a', b'b', b'c', 0x01, 0x00, 0x08, 0x6E, 0x08]);
    assert_eq!(decompress(&data).unwrap(), b"abcccccc");

    let summaries = inspect(&data).unwrap();
    let zstdec::FrameSummary::Zstandard { header, .. } = &summaries[0] else {
        panic!("expected a Zstandard frame");
    };
    assert_eq!(header.window_size, 1024);
    assert_eq!(header.content_size, None);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_corrupted_block_never_panics(pos in 7usize..TEXT.len() - 4, byte in any::<u8>()) {
        let mut data = TEXT.to_vec();
        data[pos] = byte;
        // Corruption may go unnoticed without checksum verification; it
        // must never panic or produce more than the declared size.
        if let Ok(output) = decompress(&data) {
            prop_assert_eq!(output.len(), 20_000);
        }
    }

    #[test]
    fn prop_arbitrary_input_never_panics(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let mut framed = vec![0x28, 0xB5, 0x2F, 0xFD];
        framed.extend_from_slice(&data);
        let _ = decompress(&framed);
        let _ = inspect(&framed);
    }
}
