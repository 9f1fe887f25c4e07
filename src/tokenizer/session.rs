// src/tokenizer/session.rs

use std::borrow::Cow;
use std::io::{self, Write};
use std::mem;
use std::path::Path;

use crate::tokenizer::bpe::BPE;
use crate::tokenizer::bpe_trainer::{BpeTrainer, TrainerConfig};
use crate::tokenizer::corpus::Corpus;
use crate::tokenizer::pre_tokenizer::ByteLevel;
use crate::tokenizer::vocab::{UNKNOWN_TOKEN, Vocabulary};
use crate::tokenizer::{Error, Result, Trainer};

#[derive(Debug, Default)]
enum State {
    /// Nothing active: fresh session or after `free`.
    #[default]
    Released,
    /// Files are being ingested; the vocabulary holds atoms only.
    Collecting(Corpus),
    /// Trained or loaded; ready to tokenize.
    Ready(BPE),
}

/// One vocabulary and its training corpus, plus the trainer configuration.
///
/// Every boundary operation goes through a session; several sessions can
/// live side by side in one process.
#[derive(Debug, Default)]
pub struct Session {
    state: State,
    trainer: BpeTrainer,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrainerConfig) -> Self {
        Self {
            state: State::Released,
            trainer: BpeTrainer::from(config),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        self.trainer.config()
    }

    /// Adds one file to the training corpus, starting a new corpus if
    /// nothing is active.
    pub fn ingest<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.corpus_mut()?.ingest(path)
    }

    pub fn ingest_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.corpus_mut()?.ingest_bytes(bytes);
        Ok(())
    }

    fn corpus_mut(&mut self) -> Result<&mut Corpus> {
        if let State::Released = self.state {
            self.state = State::Collecting(Corpus::new());
        }
        match &mut self.state {
            State::Collecting(corpus) => Ok(corpus),
            State::Ready(_) => Err(Error::AlreadyFinalized),
            State::Released => Err(Error::NotLoaded),
        }
    }

    /// Runs the merge loop over everything ingested so far and finalizes the
    /// vocabulary. With nothing ingested the result is the vocabulary of the
    /// unknown symbol alone. A finalized session is left as is.
    ///
    /// Returns the vocabulary size.
    pub fn train(&mut self) -> Result<usize> {
        let bpe = match mem::take(&mut self.state) {
            State::Ready(bpe) => bpe,
            State::Collecting(mut corpus) => match self.trainer.train(&mut corpus) {
                Ok(bpe) => bpe,
                Err(e) => {
                    self.state = State::Collecting(corpus);
                    return Err(e);
                }
            },
            State::Released => self.trainer.train(&mut Corpus::new())?,
        };
        let size = bpe.get_vocab_size();
        self.state = State::Ready(bpe);
        Ok(size)
    }

    /// Persists the vocabulary, training first if the corpus is still open.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if let State::Collecting(_) = self.state {
            self.train()?;
        }
        match &self.state {
            State::Ready(bpe) => bpe.vocab().save(path),
            _ => Err(Error::NotLoaded),
        }
    }

    /// Replaces whatever is active with the vocabulary stored at `path`.
    /// On failure the session is left untouched.
    ///
    /// Returns the total token count.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let vocab = Vocabulary::load(path)?;
        let size = vocab.len();
        self.state = State::Ready(BPE::new(vocab));
        Ok(size)
    }

    /// Releases the vocabulary and corpus. Safe to call repeatedly.
    pub fn free(&mut self) {
        if !matches!(self.state, State::Released) {
            log::info!("releasing vocabulary");
        }
        self.state = State::Released;
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    pub fn vocab_size(&self) -> Result<usize> {
        match &self.state {
            State::Ready(bpe) => Ok(bpe.get_vocab_size()),
            State::Collecting(corpus) => Ok(corpus.vocab().len()),
            State::Released => Err(Error::NotLoaded),
        }
    }

    pub fn vocab(&self) -> Result<&Vocabulary> {
        match &self.state {
            State::Ready(bpe) => Ok(bpe.vocab()),
            State::Collecting(corpus) => Ok(corpus.vocab()),
            State::Released => Err(Error::NotLoaded),
        }
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<u32>> {
        match &self.state {
            State::Ready(bpe) => Ok(bpe.encode(text)),
            State::Collecting(_) => Err(Error::Tokenize("vocabulary is not trained yet".into())),
            State::Released => Err(Error::Tokenize("no vocabulary loaded".into())),
        }
    }

    /// Tokenizes `input_text`, prints the ids and the last token, and
    /// returns `0` on success or `1` on any error.
    pub fn tokenize_test(&self, input_text: &str) -> i32 {
        let mut stdout = io::stdout().lock();
        match self.write_tokenize_test(&mut stdout, input_text) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("{e}");
                1
            }
        }
    }

    pub fn write_tokenize_test<W: Write>(&self, out: &mut W, input_text: &str) -> Result<()> {
        let ids = self.tokenize(input_text)?;
        let rendered: Vec<Cow<'_, str>> = ids.iter().map(|&id| self.token_string(id)).collect();
        let last = ids.last().copied();
        let written = writeln!(out, "ids: {ids:?}")
            .and_then(|_| writeln!(out, "tokens: {rendered:?}"))
            .and_then(|_| match last {
                Some(id) => writeln!(out, "last: {} (id: {id})", self.token_string(id)),
                None => writeln!(out, "last: none"),
            });
        written.map_err(|e| Error::io("<stdout>", e))
    }

    /// The literal text of token `id`, or the `<UNK>` marker when nothing is
    /// loaded or `id` is out of range.
    pub fn token_string(&self, id: u32) -> Cow<'_, str> {
        match self.vocab() {
            Ok(vocab) => vocab.token_string(id),
            Err(_) => Cow::Borrowed(UNKNOWN_TOKEN),
        }
    }

    /// Dumps the session state to stdout. `verbosity` 0 prints counts,
    /// 1 adds every merge rule, 2 and above also list the whole table.
    pub fn print_summary(&self, verbosity: usize) {
        let mut stdout = io::stdout().lock();
        if let Err(e) = self.write_summary(&mut stdout, verbosity) {
            log::warn!("could not write summary: {e}");
        }
    }

    pub fn write_summary<W: Write>(&self, out: &mut W, verbosity: usize) -> io::Result<()> {
        let vocab = match &self.state {
            State::Released => return writeln!(out, "no vocabulary loaded"),
            State::Collecting(corpus) => {
                writeln!(
                    out,
                    "corpus: {} documents, {} symbols, {} atoms (not trained)",
                    corpus.len(),
                    corpus.symbol_count(),
                    corpus.vocab().len() - 1
                )?;
                corpus.vocab()
            }
            State::Ready(bpe) => bpe.vocab(),
        };
        writeln!(
            out,
            "vocabulary: {} tokens, {} merge rules",
            vocab.len(),
            vocab.merges().len()
        )?;

        let byte_level = ByteLevel::new();
        let show = |id: u32| match vocab.token_bytes(id) {
            Some(bytes) if id != 0 => byte_level.visible(bytes),
            _ => UNKNOWN_TOKEN.to_string(),
        };
        if verbosity >= 1 {
            writeln!(out, "merges:")?;
            for (rank, rule) in vocab.merges().iter().enumerate() {
                writeln!(
                    out,
                    "  {rank:>6}: {} + {} -> {} ({})",
                    show(rule.left),
                    show(rule.right),
                    show(rule.new_id),
                    rule.new_id
                )?;
            }
        }
        if verbosity >= 2 {
            writeln!(out, "tokens:")?;
            for (id, _) in vocab.tokens() {
                writeln!(out, "  {id:>6}: {}", show(id))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trained_session() -> Session {
        let mut session = Session::with_config(TrainerConfig {
            parallel: false,
            ..TrainerConfig::default()
        });
        session
            .ingest_bytes(b"const a = useState(0); const b = useState(1);")
            .unwrap();
        session.train().unwrap();
        session
    }

    #[test]
    fn fresh_session_is_not_loaded() {
        let session = Session::new();
        assert!(!session.is_loaded());
        assert!(matches!(session.vocab_size(), Err(Error::NotLoaded)));
        assert!(matches!(session.tokenize("x"), Err(Error::Tokenize(_))));
        assert_eq!(session.tokenize_test("x"), 1);
        assert_eq!(session.token_string(1), UNKNOWN_TOKEN);
    }

    #[test]
    fn free_is_idempotent_and_final() {
        let mut session = trained_session();
        assert_eq!(session.tokenize_test("const"), 0);
        session.free();
        session.free();
        assert_eq!(session.tokenize_test("const"), 1);
        assert!(matches!(session.save("/tmp/never-written.bin"), Err(Error::NotLoaded)));
    }

    #[test]
    fn ingest_after_finalize_is_rejected() {
        let mut session = trained_session();
        assert!(matches!(
            session.ingest_bytes(b"more"),
            Err(Error::AlreadyFinalized)
        ));
        session.free();
        assert!(session.ingest_bytes(b"more").is_ok());
    }

    #[test]
    fn tokenize_before_training_fails() {
        let mut session = Session::new();
        session.ingest_bytes(b"abab").unwrap();
        assert!(matches!(session.tokenize("ab"), Err(Error::Tokenize(_))));
        assert_eq!(session.vocab_size().unwrap(), 3);
    }

    #[test]
    fn train_without_input_yields_unknown_only() {
        let mut session = Session::new();
        assert_eq!(session.train().unwrap(), 1);
        assert!(session.vocab().unwrap().merges().is_empty());
        assert_eq!(session.tokenize("abc").unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn tokenize_test_reports_last_token() {
        let session = trained_session();
        let mut out = Vec::new();
        session.write_tokenize_test(&mut out, "useState").unwrap();
        let text = String::from_utf8(out).unwrap();
        let last_id = *session.tokenize("useState").unwrap().last().unwrap();
        assert!(text.contains(&format!("(id: {last_id})")));
    }

    #[test]
    fn summary_grows_with_verbosity() {
        let session = trained_session();
        let mut quiet = Vec::new();
        let mut loud = Vec::new();
        session.write_summary(&mut quiet, 0).unwrap();
        session.write_summary(&mut loud, 2).unwrap();
        let quiet = String::from_utf8(quiet).unwrap();
        let loud = String::from_utf8(loud).unwrap();
        assert!(quiet.starts_with("vocabulary:"));
        assert!(loud.contains("merges:"));
        assert!(loud.contains("tokens:"));
        assert!(loud.contains("Ġ"));
        assert!(loud.len() > quiet.len());

        let mut released = Vec::new();
        Session::new().write_summary(&mut released, 2).unwrap();
        assert_eq!(String::from_utf8(released).unwrap(), "no vocabulary loaded\n");
    }
}
