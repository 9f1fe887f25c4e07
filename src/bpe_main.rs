// src/bpe_main.rs

use std::env;
use std::io::{self, BufRead};
use std::process::ExitCode;

use codebpe::{Error, Result, Session};
use env_logger::Env;

const USAGE: &str = "usage: bpe_main <vocab.bin> [--summary level]";

#[derive(Debug, PartialEq, Eq)]
struct Args {
    vocab_path: String,
    summary: Option<usize>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = args.into_iter();
    let vocab_path = args.next().ok_or_else(|| Error::Config(USAGE.to_string()))?;
    let summary = match (args.next().as_deref(), args.next()) {
        (None, _) => None,
        (Some("--summary"), Some(level)) => Some(
            level
                .parse::<usize>()
                .map_err(|_| Error::Config(format!("invalid summary level {level:?}")))?,
        ),
        _ => return Err(Error::Config(USAGE.to_string())),
    };
    if let Some(extra) = args.next() {
        return Err(Error::Config(format!("unexpected argument {extra:?}\n{USAGE}")));
    }
    Ok(Args {
        vocab_path,
        summary,
    })
}

fn run() -> Result<i32> {
    let Args {
        vocab_path,
        summary,
    } = parse_args(env::args().skip(1))?;

    let mut session = Session::new();
    let size = session.load(&vocab_path)?;
    log::info!("{vocab_path}: {size} tokens");
    if let Some(level) = summary {
        session.print_summary(level);
    }

    // Each stdin line is tokenized on its own; the status is the worst seen.
    let mut status = 0;
    for line in io::stdin().lock().lines() {
        let line = line.map_err(|e| Error::io("<stdin>", e))?;
        status = status.max(session.tokenize_test(&line));
    }
    session.free();
    Ok(status)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match run() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        parse_args(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn accepts_vocab_and_optional_summary() {
        let args = parse(&["vocab.bin"]).unwrap();
        assert_eq!(args.vocab_path, "vocab.bin");
        assert_eq!(args.summary, None);
        assert_eq!(parse(&["vocab.bin", "--summary", "2"]).unwrap().summary, Some(2));
    }

    #[test]
    fn rejects_malformed_arguments() {
        for args in [
            &[][..],
            &["vocab.bin", "--summary"][..],
            &["vocab.bin", "--summary", "loud"][..],
            &["vocab.bin", "--verbose", "1"][..],
            &["vocab.bin", "--summary", "1", "extra"][..],
        ] {
            assert!(matches!(parse(args), Err(Error::Config(_))), "{args:?}");
        }
    }
}
