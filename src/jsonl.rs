//! JSONL log reading and timestamp normalization.

use std::{
    fs::{self, File},
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::Record;
use crate::time::Clock;

/// `dir/prefix*suffix`, e.g. `trades/trades_*.jsonl`.
#[derive(Debug, Clone)]
pub struct FilePattern {
    pub dir: PathBuf,
    pub prefix: String,
    pub suffix: String,
}

impl FilePattern {
    pub fn new(dir: impl AsRef<Path>, prefix: &str, suffix: &str) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        }
    }

    pub fn matches(&self, file_name: &str) -> bool {
        file_name.len() >= self.prefix.len() + self.suffix.len()
            && file_name.starts_with(&self.prefix)
            && file_name.ends_with(&self.suffix)
    }

    /// Matching files in lexical order. Filenames embed a sortable date.
    pub fn list(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("listing {}", self.dir.display()))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if self.matches(name) && entry.path().is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Reads every file matched by `pattern`, earliest first.
pub fn read_pattern(pattern: &FilePattern) -> Vec<Record> {
    match pattern.list() {
        Ok(files) => {
            if files.is_empty() {
                warn!(dir = %pattern.dir.display(), prefix = %pattern.prefix, "jsonl.no_files");
            }
            read_files(&files)
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "jsonl.list_failed");
            Vec::new()
        }
    }
}

/// Concatenates records of `files` in the given order. Unreadable files are skipped.
pub fn read_files(files: &[PathBuf]) -> Vec<Record> {
    let mut records = Vec::new();
    for path in files {
        debug!(path = %path.display(), "jsonl.read");
        if let Err(err) = read_file_into(path, &mut records) {
            warn!(path = %path.display(), error = %format!("{err:#}"), "jsonl.file_skipped");
        }
    }
    records
}

fn read_file_into(path: &Path, out: &mut Vec<Record>) -> Result<()> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => out.push(Record(map)),
            Ok(_) => {
                warn!(path = %path.display(), line = idx + 1, "jsonl.not_an_object");
            }
            Err(err) => {
                warn!(path = %path.display(), line = idx + 1, error = %err, "jsonl.parse_error");
            }
        }
    }
    Ok(())
}

/// Rewrites numeric epoch values in `field` into ISO-8601 strings.
///
/// Non-numeric or absent fields are left as-is, as are values that fail to convert.
pub fn normalize_timestamps(records: &mut [Record], field: &str, clock: &Clock) {
    for record in records.iter_mut() {
        let Some(secs) = record.get_f64(field) else {
            continue;
        };
        if let Some(iso) = clock.iso_from_epoch(secs) {
            record.insert(field, Value::String(iso));
        }
    }
}
