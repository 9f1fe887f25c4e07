// src/tokenizer/vocab.rs

use bstr::ByteSlice;
use rustc_hash::FxHashMap as HashMap;
use std::borrow::Cow;

use crate::tokenizer::pair::Pair;
use crate::tokenizer::{Error, Result};

/// Literal stored at the reserved id and returned for any id outside the table.
pub const UNKNOWN_TOKEN: &str = "<UNK>";

/// Id reserved for bytes that never appeared during training.
pub const UNKNOWN_ID: u32 = 0;

/// A recorded merge: the adjacent pair `(left, right)` collapses into `new_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MergeRule {
    pub left: u32,
    pub right: u32,
    pub new_id: u32,
}

impl MergeRule {
    pub fn pair(&self) -> Pair {
        (self.left, self.right)
    }
}

/// The id↔bytes table together with the ordered list of merge rules.
///
/// Ids are dense from 0 and never renumbered. Id 0 is always the reserved
/// unknown symbol, which has no entry in the reverse map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    id_to_token: Vec<Vec<u8>>,
    token_to_id: HashMap<Vec<u8>, u32>,
    merges: Vec<MergeRule>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Self {
            id_to_token: vec![UNKNOWN_TOKEN.as_bytes().to_vec()],
            token_to_id: HashMap::default(),
            merges: Vec::new(),
        }
    }

    /// Number of entries, the reserved unknown symbol included.
    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    /// True when only the reserved unknown symbol is present.
    pub fn is_empty(&self) -> bool {
        self.id_to_token.len() <= 1
    }

    /// Returns the id for `bytes`, appending a new entry on first sight.
    pub fn get_or_insert(&mut self, bytes: &[u8]) -> u32 {
        if let Some(&id) = self.token_to_id.get(bytes) {
            return id;
        }
        let id = self.id_to_token.len() as u32;
        self.id_to_token.push(bytes.to_vec());
        self.token_to_id.insert(bytes.to_vec(), id);
        id
    }

    pub fn token_to_id(&self, bytes: &[u8]) -> Option<u32> {
        self.token_to_id.get(bytes).copied()
    }

    /// Id of a single-byte atom, if that byte has been seen.
    pub fn atom(&self, byte: u8) -> Option<u32> {
        self.token_to_id.get([byte].as_slice()).copied()
    }

    pub fn token_bytes(&self, id: u32) -> Option<&[u8]> {
        self.id_to_token.get(id as usize).map(Vec::as_slice)
    }

    pub fn try_token_bytes(&self, id: u32) -> Result<&[u8]> {
        self.token_bytes(id).ok_or(Error::UnknownTokenId(id))
    }

    /// The token's literal text, or [`UNKNOWN_TOKEN`] when `id` is out of range.
    pub fn token_string(&self, id: u32) -> Cow<'_, str> {
        match self.try_token_bytes(id) {
            Ok(bytes) => bytes.to_str_lossy(),
            Err(_) => Cow::Borrowed(UNKNOWN_TOKEN),
        }
    }

    /// Mints the composite for `(left, right)` and records the merge rule.
    /// Reuses the existing id if the concatenation is already known through
    /// another split.
    pub fn add_merge(&mut self, (left, right): Pair) -> MergeRule {
        let mut merged = Vec::new();
        if let Some(bytes) = self.token_bytes(left) {
            merged.extend_from_slice(bytes);
        }
        if let Some(bytes) = self.token_bytes(right) {
            merged.extend_from_slice(bytes);
        }
        let new_id = self.get_or_insert(&merged);
        let rule = MergeRule {
            left,
            right,
            new_id,
        };
        self.merges.push(rule);
        rule
    }

    pub fn merges(&self) -> &[MergeRule] {
        &self.merges
    }

    pub fn tokens(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.id_to_token
            .iter()
            .enumerate()
            .map(|(id, bytes)| (id as u32, bytes.as_slice()))
    }

    /// Rebuilds a vocabulary from already-validated parts.
    pub(crate) fn from_parts(id_to_token: Vec<Vec<u8>>, merges: Vec<MergeRule>) -> Self {
        let token_to_id = id_to_token
            .iter()
            .enumerate()
            .skip(1)
            .map(|(id, bytes)| (bytes.clone(), id as u32))
            .collect();
        Self {
            id_to_token,
            token_to_id,
            merges,
        }
    }
}
