//! Persistent, gap-free identifier allocation.
//!
//! The counter file holds the *next* identifier to issue as a plain decimal
//! integer. A missing file counts as `1`, so the Nth allocation on a fresh
//! counter returns ID N.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use restoscout_shared::{RestoscoutError, Result};
use tracing::debug;

/// Minimum width of a formatted identifier.
pub const ID_WIDTH: usize = 6;

/// Issues unique, increasing string identifiers.
pub trait IdAllocator: Send + Sync {
    /// Allocate the next identifier. Errors are fatal for the caller's unit of work.
    fn next_id(&self) -> Result<String>;
}

/// Zero-pad an identifier to [`ID_WIDTH`] digits.
pub fn format_id(n: u64) -> String {
    format!("{n:0width$}", width = ID_WIDTH)
}

/// Counter-file backed [`IdAllocator`].
///
/// Each call reads the whole file, writes the incremented value through a
/// temp file + rename, and only then hands out the identifier. A crash after
/// the write skips one ID; it never reissues one.
#[derive(Debug)]
pub struct CounterFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CounterFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Value the next allocation will return, without consuming it.
    pub fn peek(&self) -> Result<u64> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| RestoscoutError::Storage("counter lock poisoned".into()))?;
        self.read_next()
    }

    fn read_next(&self) -> Result<u64> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(1),
            Err(e) => return Err(RestoscoutError::io(&self.path, e)),
        };

        let trimmed = content.trim();
        let value: u64 = trimmed.parse().map_err(|_| {
            RestoscoutError::Storage(format!(
                "counter file {} does not hold an integer: {trimmed:?}",
                self.path.display()
            ))
        })?;

        if value == 0 {
            return Err(RestoscoutError::Storage(format!(
                "counter file {} holds 0; identifiers start at 1",
                self.path.display()
            )));
        }
        Ok(value)
    }

    fn write_next(&self, value: u64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RestoscoutError::io(parent, e))?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, value.to_string()).map_err(|e| RestoscoutError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| RestoscoutError::io(&self.path, e))
    }
}

impl IdAllocator for CounterFile {
    fn next_id(&self) -> Result<String> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| RestoscoutError::Storage("counter lock poisoned".into()))?;

        let current = self.read_next()?;
        let next = current.checked_add(1).ok_or_else(|| {
            RestoscoutError::Storage("identifier space exhausted".into())
        })?;
        self.write_next(next)?;

        debug!(id = current, "allocated identifier");
        Ok(format_id(current))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn fresh_counter_starts_at_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let counter = CounterFile::new(dir.path().join("output").join("counter.txt"));

        assert_eq!(counter.next_id().unwrap(), "000001");
        assert_eq!(counter.next_id().unwrap(), "000002");
        assert_eq!(counter.next_id().unwrap(), "000003");

        let stored = std::fs::read_to_string(counter.path()).unwrap();
        assert_eq!(stored, "4");
    }

    #[test]
    fn ids_are_distinct_padded_and_increasing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let counter = CounterFile::new(dir.path().join("counter.txt"));

        let ids: Vec<String> = (0..25).map(|_| counter.next_id().unwrap()).collect();

        assert!(ids.iter().all(|id| id.len() == ID_WIDTH));
        let numbers: Vec<u64> = ids.iter().map(|id| id.parse().unwrap()).collect();
        assert!(numbers.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(numbers.first(), Some(&1));
        assert_eq!(numbers.last(), Some(&25));
    }

    #[test]
    fn survives_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("counter.txt");

        let first = CounterFile::new(&path);
        assert_eq!(first.next_id().unwrap(), "000001");
        assert_eq!(first.next_id().unwrap(), "000002");
        drop(first);

        let second = CounterFile::new(&path);
        assert_eq!(second.peek().unwrap(), 3);
        assert_eq!(second.next_id().unwrap(), "000003");
    }

    #[test]
    fn existing_counter_is_used_as_next_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("counter.txt");
        std::fs::write(&path, "41\n").unwrap();

        let counter = CounterFile::new(&path);
        assert_eq!(counter.next_id().unwrap(), "000041");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "42");
    }

    #[test]
    fn wide_ids_are_not_truncated() {
        assert_eq!(format_id(7), "000007");
        assert_eq!(format_id(1_234_567), "1234567");
    }

    #[test]
    fn corrupt_counter_fails_fast() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("counter.txt");
        std::fs::write(&path, "twelve").unwrap();

        let counter = CounterFile::new(&path);
        let err = counter.next_id().unwrap_err();
        assert!(matches!(err, RestoscoutError::Storage(_)));
        // The bad file is left untouched for inspection.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "twelve");
    }

    #[test]
    fn unwritable_location_fails_fast() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let counter = CounterFile::new(blocker.join("counter.txt"));
        assert!(counter.next_id().is_err());
    }

    #[test]
    fn concurrent_callers_never_share_an_id() {
        let dir = tempfile::tempdir().expect("tempdir");
        let counter = Arc::new(CounterFile::new(dir.path().join("counter.txt")));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|_| counter.next_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<String> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 80);
    }
}
