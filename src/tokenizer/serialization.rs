// src/tokenizer/serialization.rs
//
// Binary vocabulary file, all integers u32 little-endian:
//
//   entry_count
//   entry_count x { id, byte_len, bytes[byte_len] }
//   merge_count
//   merge_count x { left_id, right_id, new_id }

use rustc_hash::FxHashSet as HashSet;
use serde_json::{Map, Value, json};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::tokenizer::pre_tokenizer::ByteLevel;
use crate::tokenizer::vocab::{MergeRule, UNKNOWN_ID, UNKNOWN_TOKEN, Vocabulary};
use crate::tokenizer::{Error, Result};

impl Vocabulary {
    /// Writes the vocabulary to `path`. The bytes go to a sibling temp file
    /// first and are renamed into place, so a crash never leaves a
    /// truncated file at `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let temp_path = temp_path_for(path);
        {
            let file = File::create(&temp_path).map_err(|e| Error::io(&temp_path, e))?;
            let mut writer = BufWriter::new(file);
            writer
                .write_all(&self.to_bytes())
                .and_then(|_| writer.flush())
                .map_err(|e| Error::io(&temp_path, e))?;
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::io(path, e));
        }
        log::info!(
            "saved {} tokens and {} merge rules to {}",
            self.len(),
            self.merges().len(),
            path.display()
        );
        Ok(())
    }

    /// Reads and fully validates a vocabulary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| Error::io(path, e))?;
        let vocab = Self::from_bytes(&data)?;
        log::info!(
            "loaded {} tokens and {} merge rules from {}",
            vocab.len(),
            vocab.merges().len(),
            path.display()
        );
        Ok(vocab)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.len() as u32).to_le_bytes());
        for (id, bytes) in self.tokens() {
            out.extend_from_slice(&id.to_le_bytes());
            out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            out.extend_from_slice(bytes);
        }
        out.extend_from_slice(&(self.merges().len() as u32).to_le_bytes());
        for rule in self.merges() {
            out.extend_from_slice(&rule.left.to_le_bytes());
            out.extend_from_slice(&rule.right.to_le_bytes());
            out.extend_from_slice(&rule.new_id.to_le_bytes());
        }
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = Reader { data, cursor: 0 };

        let entry_count = reader.u32("entry count")? as usize;
        if entry_count == 0 {
            return Err(Error::CorruptFormat(
                "vocabulary has no entries; the unknown symbol is missing".into(),
            ));
        }
        // Each entry needs at least 8 bytes, which bounds the allocation.
        let mut id_to_token = Vec::with_capacity(entry_count.min(reader.remaining() / 8));
        let mut seen: HashSet<&[u8]> = HashSet::default();
        for index in 0..entry_count {
            let id = reader.u32("entry id")?;
            if id as usize != index {
                return Err(Error::CorruptFormat(format!(
                    "entry {index} declares id {id}; ids must be dense and ordered"
                )));
            }
            let len = reader.u32("entry length")? as usize;
            let bytes = reader.take(len, "entry bytes")?;
            if id != UNKNOWN_ID && !seen.insert(bytes) {
                return Err(Error::CorruptFormat(format!(
                    "entry {id} duplicates an earlier token"
                )));
            }
            id_to_token.push(bytes.to_vec());
        }

        let merge_count = reader.u32("merge count")? as usize;
        let mut merges = Vec::with_capacity(merge_count.min(reader.remaining() / 12));
        for rank in 0..merge_count {
            let rule = MergeRule {
                left: reader.u32("merge left id")?,
                right: reader.u32("merge right id")?,
                new_id: reader.u32("merge new id")?,
            };
            check_rule(&id_to_token, rank, &rule)?;
            merges.push(rule);
        }

        if reader.remaining() != 0 {
            return Err(Error::CorruptFormat(format!(
                "{} unexpected trailing bytes",
                reader.remaining()
            )));
        }

        Ok(Self::from_parts(id_to_token, merges))
    }

    /// Writes `vocab.json` and `merges.json` into `dir` for inspection.
    /// Tokens are rendered through the visible byte map so every key is
    /// printable. The reserved entry is listed under `"unk"`, apart from the
    /// token map, since a real token may share its literal.
    pub fn export_json<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
        let byte_level = ByteLevel::new();
        let render = |id: u32| match self.token_bytes(id) {
            Some(bytes) if id != UNKNOWN_ID => byte_level.visible(bytes),
            _ => self.token_string(id).into_owned(),
        };

        let mut token_map = Map::new();
        for (id, _) in self.tokens().skip(1) {
            token_map.insert(render(id), Value::from(id));
        }
        let vocab_json = json!({
            "unk": { "token": UNKNOWN_TOKEN, "id": UNKNOWN_ID },
            "vocab": Value::Object(token_map),
        });

        let merges: Vec<[String; 2]> = self
            .merges()
            .iter()
            .map(|rule| [render(rule.left), render(rule.right)])
            .collect();
        let merges_json = json!({ "merges": merges });

        write_json(&dir.join("vocab.json"), &vocab_json)?;
        write_json(&dir.join("merges.json"), &merges_json)?;
        Ok(())
    }
}

impl Vocabulary {
    /// Writes the merge tree as a Graphviz digraph: one node per token,
    /// labelled with its visible rendering, and an edge from every composite
    /// to each operand of its rule.
    pub fn write_dot<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let byte_level = ByteLevel::new();
        writeln!(out, "digraph G {{")?;
        for (id, bytes) in self.tokens().skip(1) {
            let label = byte_level.visible(bytes).replace('\\', "\\\\").replace('"', "\\\"");
            writeln!(out, "    {id} [label=\"{label}\"];")?;
        }
        for rule in self.merges() {
            writeln!(out, "    {} -> {};", rule.new_id, rule.left)?;
            writeln!(out, "    {} -> {};", rule.new_id, rule.right)?;
        }
        writeln!(out, "}}")
    }

    /// [`Vocabulary::write_dot`] into a file at `path`.
    pub fn export_dot<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut writer = BufWriter::new(file);
        self.write_dot(&mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| Error::io(path, e))
    }
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| Error::io(path, e))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn check_rule(id_to_token: &[Vec<u8>], rank: usize, rule: &MergeRule) -> Result<()> {
    let get = |id: u32| {
        id_to_token.get(id as usize).ok_or_else(|| {
            Error::CorruptFormat(format!("merge {rank} references id {id} outside the table"))
        })
    };
    let (left, right, merged) = (get(rule.left)?, get(rule.right)?, get(rule.new_id)?);
    if rule.left == UNKNOWN_ID || rule.right == UNKNOWN_ID || rule.new_id == UNKNOWN_ID {
        return Err(Error::CorruptFormat(format!(
            "merge {rank} uses the unknown symbol"
        )));
    }
    if merged.len() != left.len() + right.len()
        || !merged.starts_with(left)
        || !merged.ends_with(right)
    {
        return Err(Error::CorruptFormat(format!(
            "merge {rank}: token {} is not the concatenation of {} and {}",
            rule.new_id, rule.left, rule.right
        )));
    }
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::CorruptFormat(format!(
                "truncated while reading {what}: need {len} bytes, {} left",
                self.remaining()
            )));
        }
        let slice = &self.data[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}
