//! Memtable: sorted in-memory write buffer
//!
//! The front door of a log-structured merge engine. Entries are kept in
//! ascending key order so that a flush can emit a sorted file directly.
//! Deletes leave tombstones instead of removing keys, because an older
//! on-disk table may still hold the key.
//!
//! Flushing is not implemented; [`Memtable::should_flush`] only reports
//! when the buffer has reached its threshold.

use std::collections::BTreeMap;

/// Entry count at which a memtable is considered full.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 10;

/// A memtable slot: a value or a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemtableEntry {
    Value(String),
    Tombstone,
}

impl MemtableEntry {
    pub fn is_tombstone(&self) -> bool {
        matches!(self, MemtableEntry::Tombstone)
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            MemtableEntry::Value(v) => Some(v),
            MemtableEntry::Tombstone => None,
        }
    }

    fn value_len(&self) -> usize {
        self.value().map_or(0, str::len)
    }
}

/// Sorted in-memory table with tombstones.
#[derive(Debug)]
pub struct Memtable {
    data: BTreeMap<String, MemtableEntry>,
    /// Sum of key and value byte lengths over all entries
    size_bytes: usize,
    flush_threshold: usize,
}

impl Memtable {
    pub fn new() -> Self {
        Self::with_flush_threshold(DEFAULT_FLUSH_THRESHOLD)
    }

    pub fn with_flush_threshold(flush_threshold: usize) -> Self {
        Self {
            data: BTreeMap::new(),
            size_bytes: 0,
            flush_threshold,
        }
    }

    /// Inserts or overwrites `key`, reviving it if it was a tombstone.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        let key_len = key.len();
        let value_len = value.len();

        match self.data.insert(key, MemtableEntry::Value(value)) {
            // The key is already counted.
            Some(old) => self.size_bytes = self.size_bytes - old.value_len() + value_len,
            None => self.size_bytes += key_len + value_len,
        }
    }

    /// The entry for `key`, tombstones included.
    ///
    /// `None` means the key was never written here, which is different from
    /// a tombstone.
    pub fn get(&self, key: &str) -> Option<&MemtableEntry> {
        self.data.get(key)
    }

    /// Marks `key` deleted.
    ///
    /// An absent key still gets a tombstone. Returns `false` only when the
    /// key is already a tombstone.
    pub fn delete(&mut self, key: &str) -> bool {
        match self.data.get_mut(key) {
            Some(MemtableEntry::Tombstone) => false,
            Some(entry) => {
                self.size_bytes -= entry.value_len();
                *entry = MemtableEntry::Tombstone;
                true
            }
            None => {
                self.size_bytes += key.len();
                self.data.insert(key.to_string(), MemtableEntry::Tombstone);
                true
            }
        }
    }

    /// All entries in ascending key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &MemtableEntry)> + '_ {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Entry count, tombstones included.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn live_count(&self) -> usize {
        self.data.values().filter(|e| !e.is_tombstone()).count()
    }

    /// Approximate memory footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether the entry count has reached the flush threshold.
    pub fn should_flush(&self) -> bool {
        self.data.len() >= self.flush_threshold
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.size_bytes = 0;
    }
}

impl Default for Memtable {
    fn default() -> Self {
        Self::new()
    }
}
