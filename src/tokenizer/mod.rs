// src/tokenizer/mod.rs

pub mod bpe;
pub mod bpe_trainer;
pub mod corpus;
pub mod counter;
pub mod pair;
pub mod parallelism;
pub mod pre_tokenizer;
pub mod progress;
pub mod result;
pub mod sequence;
pub mod serialization;
pub mod session;
pub mod vocab;

pub use bpe::{BPE, Rank};
pub use bpe_trainer::{BpeTrainer, BpeTrainerBuilder, StopReason, TrainerConfig};
pub use corpus::Corpus;
pub use counter::PairCounter;
pub use pair::Pair;
pub use pre_tokenizer::ByteLevel;
pub use result::{Error, Result};
pub use sequence::Sequence;
pub use session::Session;
pub use vocab::{MergeRule, UNKNOWN_ID, UNKNOWN_TOKEN, Vocabulary};

/// Core behavior of a trained tokenizer model.
pub trait Model: Send + Sync {
    /// Tokenizes the given input string.
    fn tokenize(&self, text: &str) -> Vec<Rank>;

    /// Converts a token ID back to its string representation.
    fn id_to_token(&self, id: u32) -> Option<String>;

    /// Converts a token string to its ID.
    fn token_to_id(&self, token: &str) -> Option<u32>;

    /// Returns the vocabulary size of the model.
    fn get_vocab_size(&self) -> usize;
}

/// Behavior of a tokenizer trainer.
pub trait Trainer: Send + Sync {
    /// The type of Model this trainer can produce.
    type Model: Model;

    /// Runs training over `corpus`, which ends up segmented with the final
    /// merges, and returns the resulting model.
    fn train(&self, corpus: &mut Corpus) -> Result<Self::Model>;

    /// Indicates whether training progress should be displayed.
    fn should_show_progress(&self) -> bool;
}
