// src/tokenizer/corpus.rs

use std::fs;
use std::path::Path;

use crate::tokenizer::pre_tokenizer::ByteLevel;
use crate::tokenizer::sequence::Sequence;
use crate::tokenizer::vocab::Vocabulary;
use crate::tokenizer::{Error, Result};

/// Training-time state: the vocabulary being built and one sequence per
/// ingested document. Dropped once training has finalized the vocabulary.
#[derive(Debug, Default, Clone)]
pub struct Corpus {
    pub(crate) vocab: Vocabulary,
    pub(crate) sequences: Vec<Sequence>,
    pre_tokenizer: ByteLevel,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the whole file and appends it as one document.
    pub fn ingest<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
        if bytes.is_empty() {
            log::warn!("{} is empty, nothing to ingest", path.display());
        }
        self.ingest_bytes(&bytes);
        log::info!(
            "ingested {} ({} bytes, {} symbols known)",
            path.display(),
            bytes.len(),
            self.vocab.len()
        );
        Ok(())
    }

    /// Appends an in-memory document.
    pub fn ingest_bytes(&mut self, bytes: &[u8]) {
        let sequence = self.pre_tokenizer.ingest(bytes, &mut self.vocab);
        self.sequences.push(sequence);
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Number of ingested documents.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Total symbols across every document.
    pub fn symbol_count(&self) -> usize {
        self.sequences.iter().map(Sequence::len).sum()
    }
}
