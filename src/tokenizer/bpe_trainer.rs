// src/tokenizer/bpe_trainer.rs

use rustc_hash::FxHashSet as HashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::tokenizer::bpe::BPE;
use crate::tokenizer::corpus::Corpus;
use crate::tokenizer::counter::PairCounter;
use crate::tokenizer::pair::Pair;
use crate::tokenizer::parallelism::MaybeParallelIterator;
use crate::tokenizer::progress;
use crate::tokenizer::sequence::Sequence;
use crate::tokenizer::vocab::{MergeRule, Vocabulary};
use crate::tokenizer::{Error, Result, Trainer};

/// Knobs for a training run. Every field has a default, so a JSON config
/// only needs the fields it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Pairs seen fewer times than this are never merged. Clamped to at least 1.
    pub min_frequency: u64,
    /// Upper bound on vocabulary entries, the reserved unknown symbol included.
    pub vocab_size: usize,
    /// Longest composite token, in bytes.
    pub max_token_length: Option<usize>,
    pub show_progress: bool,
    /// Count pairs and rewrite sequences on the rayon pool.
    pub parallel: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            min_frequency: 2,
            vocab_size: 4096,
            max_token_length: None,
            show_progress: false,
            parallel: true,
        }
    }
}

impl TrainerConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }
}

#[derive(Debug, Default)]
pub struct BpeTrainerBuilder {
    config: TrainerConfig,
}

impl BpeTrainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn min_frequency(mut self, frequency: u64) -> Self {
        self.config.min_frequency = frequency;
        self
    }

    #[must_use]
    pub fn vocab_size(mut self, size: usize) -> Self {
        self.config.vocab_size = size;
        self
    }

    #[must_use]
    pub fn max_token_length(mut self, max_token_length: Option<usize>) -> Self {
        self.config.max_token_length = max_token_length;
        self
    }

    #[must_use]
    pub fn show_progress(mut self, show: bool) -> Self {
        self.config.show_progress = show;
        self
    }

    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    pub fn build(self) -> BpeTrainer {
        BpeTrainer {
            config: self.config,
        }
    }
}

/// Why the merge loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    VocabSizeReached,
    BelowMinFrequency,
    NoPairsLeft,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::VocabSizeReached => write!(f, "vocabulary size reached"),
            StopReason::BelowMinFrequency => write!(f, "best pair below minimum frequency"),
            StopReason::NoPairsLeft => write!(f, "no mergeable pairs left"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BpeTrainer {
    config: TrainerConfig,
}

impl From<TrainerConfig> for BpeTrainer {
    fn from(config: TrainerConfig) -> Self {
        Self { config }
    }
}

impl BpeTrainer {
    pub fn new(min_frequency: u64, vocab_size: usize) -> Self {
        Self::builder()
            .min_frequency(min_frequency)
            .vocab_size(vocab_size)
            .build()
    }

    pub fn builder() -> BpeTrainerBuilder {
        BpeTrainerBuilder::new()
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Runs the merge loop over `corpus` until a stopping condition holds.
    ///
    /// Each iteration takes the most frequent pair (ties to the smallest
    /// `(left, right)`), records it as the next merge rule and rewrites every
    /// sequence containing it. The corpus vocabulary and sequences are
    /// updated in place.
    pub fn do_train(&self, corpus: &mut Corpus) -> StopReason {
        let min_frequency = self.config.min_frequency.max(1);
        let max_token_length = self.config.max_token_length.unwrap_or(usize::MAX);
        let parallel = self.config.parallel;
        let progress = progress::setup(self.should_show_progress());

        progress::update(&progress, corpus.sequences.len(), "Count pairs");
        let mut counter = PairCounter::count(&corpus.sequences, parallel, &progress);
        progress::finalize(&progress, corpus.sequences.len());

        log::info!(
            "training on {} documents ({} symbols, {} distinct pairs, {} atoms)",
            corpus.len(),
            corpus.symbol_count(),
            counter.len(),
            corpus.vocab.len() - 1
        );

        progress::update(&progress, self.config.vocab_size, "Compute merges");
        let reason = loop {
            if corpus.vocab.len() >= self.config.vocab_size {
                break StopReason::VocabSizeReached;
            }

            let vocab = &corpus.vocab;
            let best = counter.pop_best(|pair| merged_len(vocab, pair) <= max_token_length);
            let Some((pair, count)) = best else {
                break StopReason::NoPairsLeft;
            };
            if (count as u64) < min_frequency {
                break StopReason::BelowMinFrequency;
            }

            let rule = corpus.vocab.add_merge(pair);
            log::debug!(
                "merge #{}: ({}, {}) x{} -> {}",
                corpus.vocab.merges().len(),
                rule.left,
                rule.right,
                count,
                rule.new_id
            );

            let targets = counter.sequences_with(&pair);
            let changes = rewrite(&mut corpus.sequences, &targets, rule, parallel);
            counter.apply(changes);

            if let Some(p) = &progress {
                p.set_position(corpus.vocab.len() as u64);
            }
        };
        progress::finalize(&progress, corpus.vocab.len());

        log::info!(
            "training stopped ({reason}): {} tokens, {} merge rules",
            corpus.vocab.len(),
            corpus.vocab.merges().len()
        );
        reason
    }
}

fn merged_len(vocab: &Vocabulary, (a, b): Pair) -> usize {
    let len = |id| vocab.token_bytes(id).map_or(0, <[u8]>::len);
    len(a) + len(b)
}

/// Applies `rule` to the sequences at `targets` and gathers the resulting
/// pair deltas tagged with their sequence index.
fn rewrite(
    sequences: &mut Vec<Sequence>,
    targets: &[usize],
    rule: MergeRule,
    parallel: bool,
) -> Vec<((Pair, i64), usize)> {
    let targets: HashSet<usize> = targets.iter().copied().collect();
    sequences
        .into_maybe_par_iter_cond(parallel)
        .enumerate()
        .map(|(i, sequence)| {
            if !targets.contains(&i) {
                return Vec::new();
            }
            sequence
                .merge(rule.left, rule.right, rule.new_id)
                .into_iter()
                .map(|change| (change, i))
                .collect::<Vec<_>>()
        })
        .reduce(Vec::new, |mut acc, changes| {
            acc.extend(changes);
            acc
        })
}

impl Trainer for BpeTrainer {
    type Model = BPE;

    fn train(&self, corpus: &mut Corpus) -> Result<Self::Model> {
        self.do_train(corpus);
        Ok(BPE::new(corpus.vocab.clone()))
    }

    fn should_show_progress(&self) -> bool {
        self.config.show_progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus_of(docs: &[&str]) -> Corpus {
        let mut corpus = Corpus::new();
        for doc in docs {
            corpus.ingest_bytes(doc.as_bytes());
        }
        corpus
    }

    fn trainer() -> BpeTrainer {
        BpeTrainer::builder().vocab_size(1000).parallel(false).build()
    }

    #[test]
    fn most_frequent_pair_merges_first() {
        let mut corpus = corpus_of(&["aaab".repeat(100).as_str()]);
        trainer().do_train(&mut corpus);

        let vocab = corpus.vocab();
        let a = vocab.atom(b'a').unwrap();
        let b = vocab.atom(b'b').unwrap();
        let merges = vocab.merges();
        assert_eq!(merges[0].pair(), (a, a));
        let first_with_b = merges
            .iter()
            .position(|m| m.left == b || m.right == b)
            .unwrap();
        assert!(first_with_b > 0);
    }

    #[test]
    fn empty_corpus_is_a_valid_terminal_state() {
        let mut corpus = Corpus::new();
        let reason = trainer().do_train(&mut corpus);
        assert_eq!(reason, StopReason::NoPairsLeft);
        assert_eq!(corpus.vocab().len(), 1);
        assert!(corpus.vocab().merges().is_empty());
    }

    #[test]
    fn stops_below_min_frequency() {
        // Every pair occurs once.
        let mut corpus = corpus_of(&["abcdef"]);
        let reason = trainer().do_train(&mut corpus);
        assert_eq!(reason, StopReason::BelowMinFrequency);
        assert!(corpus.vocab().merges().is_empty());

        let mut corpus = corpus_of(&["abcdef"]);
        let reason = BpeTrainer::builder()
            .min_frequency(1)
            .parallel(false)
            .build()
            .do_train(&mut corpus);
        assert_eq!(reason, StopReason::NoPairsLeft);
        assert_eq!(corpus.sequences()[0].len(), 1);
        assert_eq!(corpus.vocab().token_string(corpus.sequences()[0].get_ids()[0]), "abcdef");
    }

    #[test]
    fn zero_min_frequency_acts_as_one() {
        let docs = ["abcdef", "ghij"];
        let mut zero = corpus_of(&docs);
        let mut one = corpus_of(&docs);
        let reason = BpeTrainer::new(0, 1000).do_train(&mut zero);
        BpeTrainer::new(1, 1000).do_train(&mut one);
        assert_eq!(reason, StopReason::NoPairsLeft);
        assert_eq!(zero.vocab(), one.vocab());
        assert_eq!(zero.sequences(), one.sequences());
        assert_eq!(zero.vocab().merges().len(), 8);
    }

    #[test]
    fn stops_at_vocab_size() {
        let mut corpus = corpus_of(&["the cat sat on the mat with the hat"]);
        let atoms = corpus.vocab().len();
        let reason = BpeTrainer::builder()
            .vocab_size(atoms + 2)
            .parallel(false)
            .build()
            .do_train(&mut corpus);
        assert_eq!(reason, StopReason::VocabSizeReached);
        assert_eq!(corpus.vocab().len(), atoms + 2);
        assert_eq!(corpus.vocab().merges().len(), 2);
    }

    #[test]
    fn respects_max_token_length() {
        let mut corpus = corpus_of(&["abababababababab"]);
        BpeTrainer::builder()
            .max_token_length(Some(2))
            .parallel(false)
            .build()
            .do_train(&mut corpus);
        assert!(corpus.vocab().tokens().all(|(id, bytes)| id == 0 || bytes.len() <= 2));
        assert_eq!(corpus.vocab().merges().len(), 1);
    }

    #[test]
    fn pairs_do_not_cross_documents() {
        // "ab" only forms across the boundary between the two documents.
        let mut corpus = corpus_of(&["xa", "bx", "xa", "bx"]);
        trainer().do_train(&mut corpus);
        let vocab = corpus.vocab();
        assert!(vocab.token_to_id(b"ab").is_none());
        assert!(vocab.token_to_id(b"xa").is_some());
    }

    #[test]
    fn training_is_deterministic_and_parallel_agnostic() {
        let docs = [
            "function add(a, b) { return a + b; }",
            "function sub(a, b) { return a - b; }",
            "const total = add(1, 2) + sub(3, 4);",
        ];
        let mut serial = corpus_of(&docs);
        let mut parallel = corpus_of(&docs);
        trainer().do_train(&mut serial);
        BpeTrainer::builder()
            .vocab_size(1000)
            .parallel(true)
            .build()
            .do_train(&mut parallel);
        assert_eq!(serial.vocab(), parallel.vocab());
        assert_eq!(serial.sequences(), parallel.sequences());
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trainer.json");
        std::fs::write(&path, r#"{ "vocab_size": 512, "parallel": false }"#).unwrap();
        let config = TrainerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.vocab_size, 512);
        assert!(!config.parallel);
        assert_eq!(config.min_frequency, 2);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TrainerConfig::from_json_file(&path),
            Err(Error::Config(_))
        ));
    }
}
