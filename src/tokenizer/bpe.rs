// src/tokenizer/bpe.rs

use std::borrow::Cow;

use crate::tokenizer::Model;
use crate::tokenizer::pre_tokenizer::ByteLevel;
use crate::tokenizer::vocab::{MergeRule, UNKNOWN_ID, Vocabulary};

pub type Rank = u32;

/// Tokenizer runtime over a finalized vocabulary.
///
/// Encoding splits the input into byte atoms and then replays every merge
/// rule in recorded order, one full pass per rule. This reproduces exactly
/// the segmentation the same text received during training.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BPE {
    vocab: Vocabulary,
    pre_tokenizer: ByteLevel,
}

impl BPE {
    pub fn new(vocab: Vocabulary) -> Self {
        Self {
            vocab,
            pre_tokenizer: ByteLevel::new(),
        }
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn encode_bytes(&self, bytes: &[u8]) -> Vec<Rank> {
        let mut ids = self.pre_tokenizer.atoms(bytes, &self.vocab);
        for rule in self.vocab.merges() {
            if ids.len() < 2 {
                break;
            }
            apply_rule(&mut ids, rule);
        }
        ids
    }

    pub fn encode(&self, text: &str) -> Vec<Rank> {
        self.encode_bytes(text.as_bytes())
    }

    /// Concatenated bytes of `tokens`. The unknown symbol and ids outside
    /// the vocabulary contribute nothing.
    pub fn decode(&self, tokens: &[Rank]) -> Vec<u8> {
        let mut ret = Vec::with_capacity(tokens.len() * 2);
        for &token in tokens {
            if token == UNKNOWN_ID {
                continue;
            }
            if let Some(bytes) = self.vocab.token_bytes(token) {
                ret.extend_from_slice(bytes);
            }
        }
        ret
    }

    pub fn token_string(&self, id: Rank) -> Cow<'_, str> {
        self.vocab.token_string(id)
    }

    pub fn get_vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

// One left-to-right pass replacing non-overlapping `(left, right)` with
// `new_id`, compacting in place.
fn apply_rule(ids: &mut Vec<Rank>, rule: &MergeRule) {
    let mut read = 0;
    let mut write = 0;
    while read < ids.len() {
        if read + 1 < ids.len() && ids[read] == rule.left && ids[read + 1] == rule.right {
            ids[write] = rule.new_id;
            read += 2;
        } else {
            ids[write] = ids[read];
            read += 1;
        }
        write += 1;
    }
    ids.truncate(write);
}

impl Model for BPE {
    fn tokenize(&self, text: &str) -> Vec<Rank> {
        self.encode(text)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.vocab
            .token_bytes(id)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.token_to_id(token.as_bytes())
    }

    fn get_vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{BpeTrainer, Corpus, UNKNOWN_TOKEN};

    fn trained(docs: &[&str]) -> (Corpus, BPE) {
        let mut corpus = Corpus::new();
        for doc in docs {
            corpus.ingest_bytes(doc.as_bytes());
        }
        BpeTrainer::builder()
            .parallel(false)
            .build()
            .do_train(&mut corpus);
        let bpe = BPE::new(corpus.vocab().clone());
        (corpus, bpe)
    }

    #[test]
    fn replay_matches_training_segmentation() {
        let docs = [
            "import React from 'react';\nexport default function App() { return <div/>; }\n",
            "const [state, setState] = useState(0);\nuseEffect(() => {}, [state]);\n",
            "aaaaaaaaabaaaaab",
        ];
        let (corpus, bpe) = trained(&docs);
        for (doc, sequence) in docs.iter().zip(corpus.sequences()) {
            assert_eq!(bpe.encode(doc), sequence.get_ids());
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let (_, bpe) = trained(&["let x = 1; let y = 2; let z = x + y;"]);
        let first = bpe.encode("let w = x;");
        for _ in 0..5 {
            assert_eq!(bpe.encode("let w = x;"), first);
        }
    }

    #[test]
    fn unseen_bytes_become_unknown() {
        let (_, bpe) = trained(&["abab abab"]);
        let ids = bpe.encode("ab#");
        assert_eq!(*ids.last().unwrap(), UNKNOWN_ID);
        assert_eq!(bpe.token_string(UNKNOWN_ID), UNKNOWN_TOKEN);
    }

    #[test]
    fn decode_inverts_encode_for_known_bytes() {
        let text = "for (let i = 0; i < n; i++) { sum += i; }";
        let (_, bpe) = trained(&[text, text]);
        assert_eq!(bpe.decode(&bpe.encode(text)), text.as_bytes());
    }

    #[test]
    fn rules_apply_in_recorded_order() {
        // Rule 1 builds "ab"; rule 2 only fires on its output.
        let mut vocab = Vocabulary::new();
        let a = vocab.get_or_insert(b"a");
        let b = vocab.get_or_insert(b"b");
        let ab = vocab.add_merge((a, b)).new_id;
        let abb = vocab.add_merge((ab, b)).new_id;
        let bpe = BPE::new(vocab);
        assert_eq!(bpe.encode("abbab"), vec![abb, ab]);
        assert_eq!(bpe.id_to_token(abb).as_deref(), Some("abb"));
        assert_eq!(bpe.token_to_id("ab"), Some(ab));
    }

    #[test]
    fn empty_input_yields_no_tokens() {
        let (_, bpe) = trained(&["abc abc"]);
        assert!(bpe.encode("").is_empty());
    }
}
