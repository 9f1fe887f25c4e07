//! Byte-level BPE vocabulary builder and tokenizer for source-code corpora.
//!
//! Training ingests raw files into a [`Corpus`], merges the most frequent
//! adjacent pairs until a stopping condition is met, and persists the
//! resulting [`Vocabulary`]. At inference time the vocabulary is loaded into
//! a [`BPE`] which replays the merge rules in recorded order.

pub mod tokenizer;

pub use tokenizer::{
    BPE, BpeTrainer, BpeTrainerBuilder, Corpus, Error, MergeRule, Model, Result, Session, Trainer,
    TrainerConfig, UNKNOWN_TOKEN, Vocabulary,
};
