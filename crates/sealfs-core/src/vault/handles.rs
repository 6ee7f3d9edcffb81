//! File handle table.
//!
//! Open files are identified by small non-negative integers scoped to one
//! session. Allocation always picks the lowest free slot, so handles are
//! reused after close; the table is bounded, and exhaustion is reported to
//! the caller rather than growing without limit. Closing the owning session
//! clears the table, invalidating any handles the caller forgot to close.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::fs::file::EncryptedFile;

/// Maximum number of concurrently open files per session.
pub const MAX_OPEN_FILES: usize = 1024;

/// A small integer identifying an open file within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(u32);

impl FileHandle {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Table of open files for one session.
///
/// Entries are shared as `Arc<Mutex<_>>`: lookups clone the `Arc` and drop
/// the table lock immediately, so long block-cipher work on one handle
/// never blocks opens and closes of others.
pub(crate) struct HandleTable {
    slots: Mutex<Vec<Option<Arc<Mutex<EncryptedFile>>>>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Insert an open file, returning the lowest free handle.
    /// `None` when the table is full.
    pub fn insert(&self, file: EncryptedFile) -> Option<FileHandle> {
        let mut slots = self.slots.lock().expect("handle table poisoned");
        let entry = Arc::new(Mutex::new(file));
        for (i, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(entry);
                return Some(FileHandle(i as u32));
            }
        }
        if slots.len() >= MAX_OPEN_FILES {
            return None;
        }
        slots.push(Some(entry));
        let handle = FileHandle((slots.len() - 1) as u32);
        trace!(%handle, "file handle allocated");
        Some(handle)
    }

    pub fn get(&self, handle: FileHandle) -> Option<Arc<Mutex<EncryptedFile>>> {
        let slots = self.slots.lock().expect("handle table poisoned");
        slots.get(handle.0 as usize).and_then(Clone::clone)
    }

    /// Remove a handle, returning whether it was present.
    pub fn remove(&self, handle: FileHandle) -> bool {
        let mut slots = self.slots.lock().expect("handle table poisoned");
        match slots.get_mut(handle.0 as usize) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                true
            }
            _ => false,
        }
    }

    /// Drop every open file, used when the owning session closes.
    pub fn clear(&self) {
        let mut slots = self.slots.lock().expect("handle table poisoned");
        slots.clear();
    }

    pub fn open_count(&self) -> usize {
        let slots = self.slots.lock().expect("handle table poisoned");
        slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn open_file(tmp: &TempDir, name: &str) -> EncryptedFile {
        let path = tmp.path().join(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        EncryptedFile::new(file, PathBuf::from(name), true)
    }

    #[test]
    fn handles_start_at_zero_and_count_up() {
        let tmp = TempDir::new().unwrap();
        let table = HandleTable::new();
        let h0 = table.insert(open_file(&tmp, "a")).unwrap();
        let h1 = table.insert(open_file(&tmp, "b")).unwrap();
        assert_eq!(h0.index(), 0);
        assert_eq!(h1.index(), 1);
        assert_eq!(table.open_count(), 2);
    }

    #[test]
    fn lowest_free_slot_is_reused() {
        let tmp = TempDir::new().unwrap();
        let table = HandleTable::new();
        let h0 = table.insert(open_file(&tmp, "a")).unwrap();
        let h1 = table.insert(open_file(&tmp, "b")).unwrap();
        let h2 = table.insert(open_file(&tmp, "c")).unwrap();

        assert!(table.remove(h1));
        let reused = table.insert(open_file(&tmp, "d")).unwrap();
        assert_eq!(reused, h1);
        assert_ne!(reused, h0);
        assert_ne!(reused, h2);
    }

    #[test]
    fn get_after_remove_fails() {
        let tmp = TempDir::new().unwrap();
        let table = HandleTable::new();
        let h = table.insert(open_file(&tmp, "a")).unwrap();
        assert!(table.get(h).is_some());
        assert!(table.remove(h));
        assert!(table.get(h).is_none());
        assert!(!table.remove(h));
    }

    #[test]
    fn clear_invalidates_everything() {
        let tmp = TempDir::new().unwrap();
        let table = HandleTable::new();
        let handles: Vec<_> = (0..5)
            .map(|i| table.insert(open_file(&tmp, &format!("f{i}"))).unwrap())
            .collect();
        table.clear();
        assert_eq!(table.open_count(), 0);
        for h in handles {
            assert!(table.get(h).is_none());
        }
    }

    #[test]
    fn table_is_bounded() {
        let tmp = TempDir::new().unwrap();
        let table = HandleTable::new();
        for i in 0..MAX_OPEN_FILES {
            assert!(table.insert(open_file(&tmp, &format!("f{i}"))).is_some());
        }
        assert!(table.insert(open_file(&tmp, "one-too-many")).is_none());

        // Freeing one slot makes allocation succeed again, at that slot.
        assert!(table.remove(FileHandle(17)));
        let h = table.insert(open_file(&tmp, "again")).unwrap();
        assert_eq!(h.index(), 17);
    }
}
