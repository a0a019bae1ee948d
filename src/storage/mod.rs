//! Storage Engine Module
//!
//! This module provides the core storage functionality for RingKV: a chained
//! hash map that resizes incrementally, and the keyspace built on top of it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                               │
//! │                  (key hashing, stats)                       │
//! └──────────────────────────┬──────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       HMap<Entry>                           │
//! │  ┌───────────────────┐            ┌───────────────────┐     │
//! │  │  active (2x / ½x) │ <───────── │     retiring      │     │
//! │  └───────────────────┘  ≤ 1024    └───────────────────┘     │
//! │                       nodes / op                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Bounded Rehashing**: No operation moves more than 1024 nodes
//! - **Grow and Shrink**: Doubles at load factor 4, halves below 1 (floor 4)
//! - **Arena Nodes**: Chains link `SlotMap` keys, never raw pointers
//!
//! ## Example
//!
//! ```
//! use ringkv::storage::Store;
//! use bytes::Bytes;
//!
//! let mut store = Store::new();
//! store.set(Bytes::from("name"), Bytes::from("ringkv"));
//! assert_eq!(store.get(b"name"), Some(Bytes::from("ringkv")));
//! ```

pub mod engine;
pub mod hashtable;

// Re-export commonly used types
pub use engine::{str_hash, Entry, SetOutcome, StorageStats, Store};
pub use hashtable::{HMap, Keyed, MAX_LOAD_FACTOR, MIN_CAPACITY, RESIZE_WORK};
