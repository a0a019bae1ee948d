//! Incrementally Resized Chained Hash Map
//!
//! A resize never rehashes the whole table at once. Instead the map keeps two
//! fixed-size tables and migrates nodes from the old one to the new one a few
//! at a time, piggybacking on ordinary operations:
//!
//! ```text
//!   active (new capacity)            retiring (old capacity)
//! ┌───┬───┬───┬───┬───┬───┬───┬───┐  ┌───┬───┬───┬───┐
//! │ • │   │ • │   │   │ • │   │   │  │   │ • │ • │   │
//! └─┼─┴───┴─┼─┴───┴───┴─┼─┴───┴───┘  └───┴─┼─┴─┼─┴───┘
//!   ▼       ▼           ▼              ▲   ▼   ▼
//!   n       n           n       resize_cursor  n
//!   ▼                                      ▼
//!   n                                      n
//! ```
//!
//! While `retiring` holds nodes, every lookup and removal checks both tables,
//! so the migration is invisible to callers. Each operation moves at most
//! [`RESIZE_WORK`] nodes, which bounds the latency any single request can pay
//! for rehashing.
//!
//! ## Node Storage
//!
//! Nodes live in a `SlotMap` arena. Bucket heads and chain links are arena
//! keys, so a node moves between tables by relinking; the record itself is
//! never copied.

use slotmap::{DefaultKey, SlotMap};
use std::mem;
use tracing::debug;

/// Capacity of a freshly allocated table, and the floor for shrinking.
pub const MIN_CAPACITY: usize = 4;

/// Average chain length that triggers a grow.
pub const MAX_LOAD_FACTOR: usize = 4;

/// Maximum number of nodes migrated per operation.
pub const RESIZE_WORK: usize = 1024;

/// Records stored in an [`HMap`] expose the key they are compared by.
///
/// Hash equality only narrows the search; two records with equal hashes are
/// told apart by comparing their keys.
pub trait Keyed {
    type Key: ?Sized + Eq;

    fn key(&self) -> &Self::Key;
}

#[derive(Debug)]
struct Node<T> {
    next: Option<DefaultKey>,
    hash: u64,
    record: T,
}

/// Where a node hangs in its chain: directly off a bucket, or after another node.
#[derive(Debug, Clone, Copy)]
enum Link {
    Head(usize),
    After(DefaultKey),
}

/// A fixed-size table of bucket chains. An unallocated table has no slots.
#[derive(Debug, Default)]
struct Table {
    slots: Vec<Option<DefaultKey>>,
    mask: usize,
    size: usize,
}

impl Table {
    fn with_capacity(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two());
        Self {
            slots: vec![None; capacity],
            mask: capacity - 1,
            size: 0,
        }
    }

    #[inline]
    fn is_allocated(&self) -> bool {
        !self.slots.is_empty()
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Pushes `id` onto the front of its bucket.
    fn insert<T>(&mut self, nodes: &mut SlotMap<DefaultKey, Node<T>>, id: DefaultKey) {
        let pos = (nodes[id].hash as usize) & self.mask;
        nodes[id].next = self.slots[pos];
        self.slots[pos] = Some(id);
        self.size += 1;
    }

    fn find<T: Keyed>(
        &self,
        nodes: &SlotMap<DefaultKey, Node<T>>,
        hash: u64,
        key: &T::Key,
    ) -> Option<(Link, DefaultKey)> {
        if !self.is_allocated() {
            return None;
        }

        let pos = (hash as usize) & self.mask;
        let mut link = Link::Head(pos);
        let mut cursor = self.slots[pos];
        while let Some(id) = cursor {
            let node = &nodes[id];
            if node.hash == hash && node.record.key() == key {
                return Some((link, id));
            }
            link = Link::After(id);
            cursor = node.next;
        }
        None
    }

    /// Splices `id` out of its chain.
    fn detach<T>(&mut self, nodes: &mut SlotMap<DefaultKey, Node<T>>, link: Link, id: DefaultKey) {
        let next = nodes[id].next.take();
        match link {
            Link::Head(pos) => self.slots[pos] = next,
            Link::After(prev) => nodes[prev].next = next,
        }
        self.size -= 1;
    }
}

/// A chained hash map that resizes incrementally.
///
/// Callers supply the hash of each key; the map never hashes on its own.
///
/// # Example
///
/// ```
/// use ringkv::storage::{HMap, Keyed};
///
/// struct Pair(String, u32);
///
/// impl Keyed for Pair {
///     type Key = str;
///     fn key(&self) -> &str {
///         &self.0
///     }
/// }
///
/// let mut map = HMap::new();
/// map.insert(7, Pair("seven".into(), 7));
/// assert_eq!(map.lookup(7, "seven").map(|p| p.1), Some(7));
/// assert!(map.remove(7, "seven").is_some());
/// assert!(map.is_empty());
/// ```
#[derive(Debug)]
pub struct HMap<T> {
    nodes: SlotMap<DefaultKey, Node<T>>,
    active: Table,
    retiring: Table,
    resize_cursor: usize,
    /// Nodes migrated per operation while resizing.
    resize_work: usize,
}

impl<T> Default for HMap<T> {
    fn default() -> Self {
        Self {
            nodes: SlotMap::new(),
            active: Table::default(),
            retiring: Table::default(),
            resize_cursor: 0,
            resize_work: RESIZE_WORK,
        }
    }
}

impl<T: Keyed> HMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a map that migrates at most `work` nodes per operation.
    ///
    /// # Panics
    ///
    /// Panics if `work` is zero.
    pub fn with_resize_work(work: usize) -> Self {
        assert!(work > 0, "resize work must be non-zero");
        Self {
            resize_work: work,
            ..Self::default()
        }
    }

    /// Number of records across both tables.
    pub fn len(&self) -> usize {
        self.active.size + self.retiring.size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bucket count of the active table (0 before the first insert).
    pub fn capacity(&self) -> usize {
        self.active.capacity()
    }

    /// Returns true while nodes are still being migrated out of the old table.
    pub fn is_resizing(&self) -> bool {
        self.retiring.is_allocated()
    }

    /// Inserts a record under `hash`.
    ///
    /// The map does not check for an existing record with the same key; callers
    /// look up first when they want replace semantics.
    pub fn insert(&mut self, hash: u64, record: T) {
        if !self.active.is_allocated() {
            self.active = Table::with_capacity(MIN_CAPACITY);
        }

        let id = self.nodes.insert(Node {
            next: None,
            hash,
            record,
        });
        self.active.insert(&mut self.nodes, id);

        if !self.is_resizing() {
            let capacity = self.active.capacity();
            if self.active.size / capacity >= MAX_LOAD_FACTOR {
                self.start_resizing(capacity * 2);
            }
        }
        self.help_resizing();
    }

    /// Finds the record stored under `hash` whose key equals `key`.
    pub fn lookup(&mut self, hash: u64, key: &T::Key) -> Option<&T> {
        self.help_resizing();
        let id = self.find(hash, key)?;
        Some(&self.nodes[id].record)
    }

    /// Like [`lookup`](Self::lookup), but allows the record to be updated in place.
    pub fn lookup_mut(&mut self, hash: u64, key: &T::Key) -> Option<&mut T> {
        self.help_resizing();
        let id = self.find(hash, key)?;
        Some(&mut self.nodes[id].record)
    }

    /// Detaches and returns the record stored under `hash` whose key equals `key`.
    pub fn remove(&mut self, hash: u64, key: &T::Key) -> Option<T> {
        self.help_resizing();

        let id = if let Some((link, id)) = self.active.find(&self.nodes, hash, key) {
            self.active.detach(&mut self.nodes, link, id);
            Some(id)
        } else if let Some((link, id)) = self.retiring.find(&self.nodes, hash, key) {
            self.retiring.detach(&mut self.nodes, link, id);
            Some(id)
        } else {
            None
        };
        let record = id
            .and_then(|id| self.nodes.remove(id))
            .map(|node| node.record);

        if record.is_some() && !self.is_resizing() {
            let capacity = self.active.capacity();
            if capacity > MIN_CAPACITY && self.active.size * MAX_LOAD_FACTOR < capacity {
                self.start_resizing((capacity / 2).max(MIN_CAPACITY));
            }
        }

        self.help_resizing();
        record
    }

    fn find(&self, hash: u64, key: &T::Key) -> Option<DefaultKey> {
        self.active
            .find(&self.nodes, hash, key)
            .or_else(|| self.retiring.find(&self.nodes, hash, key))
            .map(|(_, id)| id)
    }

    fn start_resizing(&mut self, new_capacity: usize) {
        debug_assert!(!self.is_resizing());
        let old_capacity = self.active.capacity();
        self.retiring = mem::replace(&mut self.active, Table::with_capacity(new_capacity));
        self.resize_cursor = 0;
        debug!(
            from = old_capacity,
            to = new_capacity,
            nodes = self.retiring.size,
            "start resizing"
        );
    }

    /// Migrates up to `resize_work` nodes from `retiring` into `active`.
    fn help_resizing(&mut self) {
        if !self.is_resizing() {
            return;
        }

        let mut work = 0;
        while work < self.resize_work && self.retiring.size > 0 {
            if self.resize_cursor > self.retiring.mask {
                break;
            }

            match self.retiring.slots[self.resize_cursor] {
                None => self.resize_cursor += 1,
                Some(id) => {
                    self.retiring
                        .detach(&mut self.nodes, Link::Head(self.resize_cursor), id);
                    self.active.insert(&mut self.nodes, id);
                    work += 1;
                }
            }
        }

        if self.retiring.size == 0 {
            self.retiring = Table::default();
            self.resize_cursor = 0;
            debug!(capacity = self.active.capacity(), "resizing done");
        }
    }
}
