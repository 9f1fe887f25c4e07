// src/main.rs

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use codebpe::{Error, Result, Session, TrainerConfig};
use env_logger::Env;

const USAGE: &str = "usage: codebpe <vocab.bin> <file-or-dir>... \
[--config trainer.json] [--export dir] [--dot merges.dot] [--summary level]";

#[derive(Debug, Default)]
struct Args {
    output: PathBuf,
    inputs: Vec<PathBuf>,
    config: Option<PathBuf>,
    export: Option<PathBuf>,
    dot: Option<PathBuf>,
    summary: Option<usize>,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut positional = Vec::new();
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .ok_or_else(|| Error::Config(format!("{flag} needs a value\n{USAGE}")))
        };
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--export" => args.export = Some(PathBuf::from(value("--export")?)),
            "--dot" => args.dot = Some(PathBuf::from(value("--dot")?)),
            "--summary" => {
                let level = value("--summary")?;
                let level = level
                    .parse()
                    .map_err(|_| Error::Config(format!("invalid summary level {level:?}")))?;
                args.summary = Some(level);
            }
            _ => positional.push(PathBuf::from(arg)),
        }
    }
    let mut positional = positional.into_iter();
    args.output = positional
        .next()
        .ok_or_else(|| Error::Config(USAGE.to_string()))?;
    args.inputs = positional.collect();
    if args.inputs.is_empty() {
        return Err(Error::Config(USAGE.to_string()));
    }
    Ok(args)
}

/// Expands directories into the files below them, sorted so that atom ids
/// do not depend on directory listing order.
fn collect_files(path: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    if !path.is_dir() {
        files.push(path.to_path_buf());
        return Ok(());
    }
    let mut entries = fs::read_dir(path)
        .map_err(|e| Error::io(path, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::io(path, e))?;
    entries.sort();
    for entry in entries {
        collect_files(&entry, files)?;
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => TrainerConfig::from_json_file(path)?,
        None => TrainerConfig::default(),
    };
    let mut session = Session::with_config(config);

    let mut files = Vec::new();
    for input in &args.inputs {
        collect_files(input, &mut files)?;
    }
    for file in &files {
        session.ingest(file)?;
    }

    let size = session.train()?;
    session.save(&args.output)?;
    log::info!("{} files, {size} tokens", files.len());

    if let Some(dir) = &args.export {
        session.vocab()?.export_json(dir)?;
    }
    if let Some(path) = &args.dot {
        session.vocab()?.export_dot(path)?;
    }
    if let Some(level) = args.summary {
        session.print_summary(level);
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match parse_args().and_then(run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
