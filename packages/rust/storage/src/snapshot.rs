//! Per-unit JSON snapshot files.

use std::path::{Path, PathBuf};

use chrono::Local;
use restoscout_shared::{RestoscoutError, Result};
use serde::Serialize;
use tracing::info;

/// Writes one pretty-printed JSON array per unit of work into `dir`.
///
/// Files are named `{label}_{YYYYmmdd_HHMMSS}.json`; a numeric suffix is
/// appended if that name is already taken.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the canonical payloads of one unit.
    pub fn write<T: Serialize>(&self, unit_label: &str, items: &[T]) -> Result<PathBuf> {
        self.write_named(&file_stem(unit_label), items)
    }

    /// Write the raw (pre-canonicalization) records of one unit.
    pub fn write_raw<T: Serialize>(&self, unit_label: &str, items: &[T]) -> Result<PathBuf> {
        self.write_named(&format!("{}_raw", file_stem(unit_label)), items)
    }

    fn write_named<T: Serialize>(&self, stem: &str, items: &[T]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| RestoscoutError::io(&self.dir, e))?;

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.free_path(&format!("{stem}_{timestamp}"));

        let json = serde_json::to_string_pretty(items)
            .map_err(|e| RestoscoutError::Storage(format!("snapshot serialization: {e}")))?;
        std::fs::write(&path, json).map_err(|e| RestoscoutError::io(&path, e))?;

        info!(path = %path.display(), items = items.len(), "snapshot written");
        Ok(path)
    }

    fn free_path(&self, base: &str) -> PathBuf {
        let mut path = self.dir.join(format!("{base}.json"));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{base}_{n}.json"));
            n += 1;
        }
        path
    }
}

/// Make a unit label safe to use as a file name component.
fn file_stem(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Item {
        name: &'static str,
    }

    #[test]
    fn writes_indented_non_ascii_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = SnapshotWriter::new(dir.path().join("output"));

        let path = writer
            .write("Fès", &[Item { name: "Café Clock" }, Item { name: "Dar Hatim" }])
            .expect("write snapshot");

        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("Fès_"));
        assert!(file_name.ends_with(".json"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Café Clock"));
        assert!(content.contains("\n  {"));

        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn same_second_writes_do_not_collide() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = SnapshotWriter::new(dir.path());

        let a = writer.write("Rabat", &[Item { name: "a" }]).unwrap();
        let b = writer.write("Rabat", &[Item { name: "b" }]).unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }

    #[test]
    fn raw_snapshots_are_marked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let writer = SnapshotWriter::new(dir.path());

        let path = writer.write_raw("Agadir", &[Item { name: "x" }]).unwrap();
        let file_name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(file_name.starts_with("Agadir_raw_"));
    }

    #[test]
    fn labels_cannot_escape_the_directory() {
        assert_eq!(file_stem("../etc/passwd"), ".._etc_passwd");
    }
}
