//! Command Handler Module
//!
//! This module implements the three commands RingKV understands. It receives
//! the decoded argument vector of a request, runs it against the store, and
//! returns the response to frame back to the client.
//!
//! ## Supported Commands
//!
//! | Request         | Hit                             | Miss                      |
//! |-----------------|---------------------------------|---------------------------|
//! | `get key`       | `OK "get <value>"`              | `NX "not found <key>"`    |
//! | `set key value` | `OK "changed <key> to <value>"` | `OK "new <key> to <value>"` |
//! | `del key`       | `OK "deleted <key>"`            | `OK "not found <key>"`    |
//!
//! Note that a `del` miss is still `OK`; only `get` reports `NX`.
//!
//! Verbs are matched exactly and must come with the right number of
//! arguments, otherwise the answer is `ERR "Unknown cmd"`.

use crate::protocol::Response;
use crate::storage::{SetOutcome, Store};
use bytes::{Bytes, BytesMut};
use tracing::debug;

/// Payload of the error response for unknown verbs and wrong arity.
pub const UNKNOWN_CMD: &str = "Unknown cmd";

/// Runs commands against the store it owns.
#[derive(Debug, Default)]
pub struct CommandHandler {
    store: Store,
}

impl CommandHandler {
    /// Creates a new command handler that owns the given store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Executes a command and returns the response.
    ///
    /// # Arguments
    ///
    /// * `args` - The decoded request: the verb followed by its arguments
    pub fn execute(&mut self, args: &[Bytes]) -> Response {
        debug!(command = %display_args(args), "executing");

        match args {
            [verb, key] if cmd_is(verb, "get") => self.cmd_get(key),
            [verb, key, value] if cmd_is(verb, "set") => self.cmd_set(key, value),
            [verb, key] if cmd_is(verb, "del") => self.cmd_del(key),
            _ => Response::err(UNKNOWN_CMD),
        }
    }

    /// get key
    fn cmd_get(&mut self, key: &Bytes) -> Response {
        match self.store.get(key) {
            Some(value) => Response::ok(concat(&[&b"get "[..], &value[..]])),
            None => Response::nx(concat(&[&b"not found "[..], &key[..]])),
        }
    }

    /// set key value
    fn cmd_set(&mut self, key: &Bytes, value: &Bytes) -> Response {
        match self.store.set(key.clone(), value.clone()) {
            SetOutcome::Updated => {
                Response::ok(concat(&[&b"changed "[..], &key[..], &b" to "[..], &value[..]]))
            }
            SetOutcome::Created => {
                Response::ok(concat(&[&b"new "[..], &key[..], &b" to "[..], &value[..]]))
            }
        }
    }

    /// del key
    fn cmd_del(&mut self, key: &Bytes) -> Response {
        match self.store.delete(key) {
            Some(entry) => Response::ok(concat(&[&b"deleted "[..], &entry.key[..]])),
            None => Response::ok(concat(&[&b"not found "[..], &key[..]])),
        }
    }
}

#[inline]
fn cmd_is(arg: &[u8], name: &str) -> bool {
    arg == name.as_bytes()
}

fn concat(parts: &[&[u8]]) -> Bytes {
    let mut buf = BytesMut::with_capacity(parts.iter().map(|p| p.len()).sum());
    for part in parts {
        buf.extend_from_slice(part);
    }
    buf.freeze()
}

fn display_args(args: &[Bytes]) -> String {
    args.iter()
        .map(|arg| String::from_utf8_lossy(arg))
        .collect::<Vec<_>>()
        .join(" ")
}
