//! Deterministic inputs matching the `.zst` fixtures under `tests/data`.
//!
//! The fixtures were produced by the reference `zstd` CLI from exactly these
//! byte sequences, so decoding a fixture must reproduce the generator output.

#![allow(dead_code)]

const WORDS: [&[u8]; 20] = [
    b"the", b"quick", b"brown", b"fox", b"jumps", b"over", b"lazy", b"dog", b"frame", b"block",
    b"literal", b"sequence", b"offset", b"window", b"entropy", b"huffman", b"table", b"decoder",
    b"stream", b"bits",
];

/// 64-bit linear congruential generator.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }
}

/// Space- and newline-separated words.
pub fn text(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg(seed);
    let mut out = Vec::with_capacity(n + 16);
    while out.len() < n {
        let s = rng.next();
        out.extend_from_slice(WORDS[((s >> 33) % WORDS.len() as u64) as usize]);
        out.push(if (s >> 20) % 8 == 0 { b'\n' } else { b' ' });
    }
    out.truncate(n);
    out
}

/// Incompressible bytes.
pub fn noise(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = Lcg(seed);
    (0..n).map(|_| (rng.next() >> 56) as u8).collect()
}

/// Alternating runs of text, noise, and zeros.
pub fn mixed(n: usize, seed: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(n + 5200);
    let mut i = 0;
    while out.len() < n {
        out.extend(text(3000, seed + i));
        out.extend(noise(700, seed + i));
        out.extend(std::iter::repeat_n(0u8, 1500));
        i += 1;
    }
    out.truncate(n);
    out
}

/// Lowercase letters drawn from the first `k` of the alphabet.
pub fn letters(n: usize, seed: u64, k: u64) -> Vec<u8> {
    let mut rng = Lcg(seed);
    (0..n).map(|_| b'a' + ((rng.next() >> 33) % k) as u8).collect()
}

/// Input of the `tiny.zst` fixture.
pub const TINY: &[u8] = b"abcabcabcabcabcabcabc hello hello hello";

/// Every fixture with the input it was compressed from.
pub fn fixtures() -> Vec<(&'static str, &'static [u8], Vec<u8>)> {
    vec![
        ("empty", &include_bytes!("../data/empty.zst")[..], Vec::new()),
        ("tiny", &include_bytes!("../data/tiny.zst")[..], TINY.to_vec()),
        ("text_small", &include_bytes!("../data/text_small.zst")[..], text(20000, 1)),
        ("text_l19", &include_bytes!("../data/text_l19.zst")[..], text(20000, 2)),
        ("text_big", &include_bytes!("../data/text_big.zst")[..], text(300000, 3)),
        ("zeros", &include_bytes!("../data/zeros.zst")[..], vec![0u8; 300000]),
        ("mixed", &include_bytes!("../data/mixed.zst")[..], mixed(200000, 5)),
        ("letters", &include_bytes!("../data/letters.zst")[..], letters(60000, 6, 26)),
        ("l5", &include_bytes!("../data/l5.zst")[..], letters(3000, 16, 5)),
    ]
}
