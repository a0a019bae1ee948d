//! Keyspace Storage Engine
//!
//! This module implements the keyspace RingKV serves: a single [`HMap`] of
//! [`Entry`] records keyed by their byte-string key.
//!
//! ## Design Decisions
//!
//! 1. **Single Owner**: The store is owned by the command handler, which is
//!    owned by the dispatcher. Everything runs on one thread, so there are no
//!    locks and no shared references.
//! 2. **Caller-Side Hashing**: Keys are hashed here with a 32-bit FNV-style
//!    function and the hash is handed to the map with every call.
//! 3. **In-Place Updates**: Overwriting a key mutates the existing entry
//!    rather than removing and reinserting it.

use crate::storage::hashtable::{HMap, Keyed};
use bytes::Bytes;

/// A stored key-value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Bytes,
    pub value: Bytes,
}

impl Keyed for Entry {
    type Key = [u8];

    fn key(&self) -> &[u8] {
        &self.key
    }
}

/// What a `set` did to the keyspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// The key did not exist and a new entry was created.
    Created,
    /// The key existed and its value was replaced.
    Updated,
}

/// Statistics about the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys
    pub keys: usize,
    /// Bucket count of the active table
    pub capacity: usize,
    /// Whether a resize is in flight
    pub resizing: bool,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
}

/// Hashes a key the way the keyspace indexes it.
///
/// 32-bit FNV-1 style: add the byte, then multiply by the FNV prime.
#[inline]
pub fn str_hash(data: &[u8]) -> u64 {
    let mut h: u32 = 0x811C_9DC5;
    for &byte in data {
        h = h.wrapping_add(u32::from(byte)).wrapping_mul(0x0100_0193);
    }
    u64::from(h)
}

/// The keyspace.
///
/// # Example
///
/// ```
/// use ringkv::storage::{SetOutcome, Store};
/// use bytes::Bytes;
///
/// let mut store = Store::new();
///
/// assert_eq!(store.set(Bytes::from("name"), Bytes::from("ringkv")), SetOutcome::Created);
/// assert_eq!(store.get(b"name"), Some(Bytes::from("ringkv")));
///
/// assert!(store.delete(b"name").is_some());
/// assert!(store.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct Store {
    db: HMap<Entry>,
    get_count: u64,
    set_count: u64,
    del_count: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value for a key.
    pub fn get(&mut self, key: &[u8]) -> Option<Bytes> {
        self.get_count += 1;
        self.db
            .lookup(str_hash(key), key)
            .map(|entry| entry.value.clone())
    }

    /// Sets a key, overwriting any existing value.
    pub fn set(&mut self, key: Bytes, value: Bytes) -> SetOutcome {
        self.set_count += 1;

        let hash = str_hash(&key);
        if let Some(entry) = self.db.lookup_mut(hash, &key) {
            entry.value = value;
            return SetOutcome::Updated;
        }

        self.db.insert(hash, Entry { key, value });
        SetOutcome::Created
    }

    /// Removes a key, returning the detached entry if it existed.
    pub fn delete(&mut self, key: &[u8]) -> Option<Entry> {
        self.del_count += 1;
        self.db.remove(str_hash(key), key)
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Returns storage statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.db.len(),
            capacity: self.db.capacity(),
            resizing: self.db.is_resizing(),
            get_ops: self.get_count,
            set_ops: self.set_count,
            del_ops: self.del_count,
        }
    }
}
