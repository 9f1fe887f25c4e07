// src/tokenizer/pre_tokenizer.rs
//
// Byte-level decomposition: every input byte is one atomic symbol.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::tokenizer::sequence::Sequence;
use crate::tokenizer::vocab::{UNKNOWN_ID, Vocabulary};

// Maps each byte to a printable char so that whitespace and control bytes
// stay visible in summaries and JSON exports (space -> 'Ġ', '\n' -> 'Ċ').
pub(crate) fn bytes_char() -> HashMap<u8, char> {
    let mut bs: Vec<u8> = vec![];
    bs.extend(b'!'..=b'~');
    bs.extend(b'\xA1'..=b'\xAC');
    bs.extend(b'\xAE'..=b'\xFF');

    let mut cs: Vec<u32> = bs.iter().map(|i| *i as u32).collect();

    let mut n = 0;
    for b in 0..=255u8 {
        if !bs.contains(&b) {
            bs.push(b);
            cs.push(256 + n);
            n += 1;
        }
    }

    // Every code point here is below 0x200, so none is rejected.
    bs.into_iter()
        .zip(cs)
        .filter_map(|(f, t)| std::char::from_u32(t).map(|ch| (f, ch)))
        .collect()
}

static BYTES_CHAR: LazyLock<HashMap<u8, char>> = LazyLock::new(bytes_char);

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ByteLevel;

impl ByteLevel {
    pub fn new() -> Self {
        Self
    }

    /// Splits `bytes` into atoms, registering any byte the vocabulary has
    /// not seen yet.
    pub fn ingest(&self, bytes: &[u8], vocab: &mut Vocabulary) -> Sequence {
        let mut sequence = Sequence::with_capacity(bytes.len());
        for &b in bytes {
            sequence.add(vocab.get_or_insert(&[b]));
        }
        sequence
    }

    /// Splits `bytes` into atoms using only ids the vocabulary already has.
    /// Unseen bytes become the reserved unknown id.
    pub fn atoms(&self, bytes: &[u8], vocab: &Vocabulary) -> Vec<u32> {
        bytes
            .iter()
            .map(|&b| vocab.atom(b).unwrap_or(UNKNOWN_ID))
            .collect()
    }

    /// Printable rendering of raw token bytes.
    pub fn visible(&self, bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|b| BYTES_CHAR.get(b).copied().unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_map_is_a_bijection() {
        let map = bytes_char();
        assert_eq!(map.len(), 256);
        let mut chars: Vec<char> = map.values().copied().collect();
        chars.sort_unstable();
        chars.dedup();
        assert_eq!(chars.len(), 256);
        assert_eq!(map[&b'a'], 'a');
        assert_eq!(map[&b' '], 'Ġ');
        assert_eq!(map[&b'\n'], 'Ċ');
    }

    #[test]
    fn ingest_registers_atoms_on_first_sight() {
        let mut vocab = Vocabulary::new();
        let seq = ByteLevel.ingest(b"abca", &mut vocab);
        assert_eq!(seq.get_ids(), &[1, 2, 3, 1]);
        assert_eq!(vocab.len(), 4);

        let seq = ByteLevel.ingest(b"cd", &mut vocab);
        assert_eq!(seq.get_ids(), &[3, 4]);
        assert_eq!(vocab.len(), 5);
    }

    #[test]
    fn multibyte_chars_decompose_to_bytes() {
        let mut vocab = Vocabulary::new();
        let seq = ByteLevel.ingest("é".as_bytes(), &mut vocab);
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn unseen_bytes_map_to_unknown() {
        let mut vocab = Vocabulary::new();
        ByteLevel.ingest(b"ab", &mut vocab);
        assert_eq!(ByteLevel.atoms(b"abz", &vocab), vec![1, 2, UNKNOWN_ID]);
    }

    #[test]
    fn visible_rendering() {
        assert_eq!(ByteLevel.visible(b"a b\n"), "aĠbĊ");
    }
}
