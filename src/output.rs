use anyhow::{Context, Result};
use serde::Serialize;
use std::{fs, path::{Path, PathBuf}};

/// Writes dashboard snapshots. Each file is replaced wholesale.
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating output dir {}", self.dir.display()))
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn save<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let path = self.path(name);
        let raw = serde_json::to_string_pretty(value)?;
        fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn replaces_previous_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(tmp.path().join("data"));
        writer.ensure_dir().unwrap();

        writer.save("x.json", &json!({"a": [1, 2, 3], "note": "日本語"})).unwrap();
        let path = writer.save("x.json", &json!({"b": 1})).unwrap();

        let raw = fs::read_to_string(path).unwrap();
        assert_eq!(raw, "{\n  \"b\": 1\n}");
    }

    #[test]
    fn keeps_non_ascii_unescaped() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = SnapshotWriter::new(tmp.path());
        let path = writer.save("r.json", &json!(["完了"])).unwrap();
        assert!(fs::read_to_string(path).unwrap().contains("完了"));
    }
}
