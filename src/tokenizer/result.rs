// src/tokenizer/result.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The path is missing, unreadable or unwritable.
    #[error("I/O error for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted vocabulary file is structurally inconsistent.
    #[error("corrupt vocabulary file: {0}")]
    CorruptFormat(String),

    /// No vocabulary is active on this session.
    #[error("no vocabulary loaded")]
    NotLoaded,

    #[error("unknown token id: {0}")]
    UnknownTokenId(u32),

    /// Tokenization was attempted without a loaded vocabulary.
    #[error("tokenization failed: {0}")]
    Tokenize(String),

    /// The vocabulary was already trained or loaded and cannot take more input.
    #[error("vocabulary is finalized; free it before ingesting new files")]
    AlreadyFinalized,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let err = Error::io(
            "/nonexistent/vocab.bin",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/nonexistent/vocab.bin"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
