//! Server Module
//!
//! The readiness-driven dispatcher that owns the listener, every live
//! connection, and the keyspace.
//!
//! ## Event Loop
//!
//! ```text
//!   ┌──────────────────────────────────────────────┐
//!   │ wait: poll_accept + queued connections       │ <──┐
//!   └──────────────────────┬───────────────────────┘    │
//!                          │ ready events               │
//!                          ▼                            │
//!   ┌──────────────────────────────────────────────┐    │
//!   │ accept new connections (interest: readable)  │    │
//!   │ drive ready connections                      │    │
//!   │ reap Closing / re-arm by state               │ ───┘
//!   └──────────────────────────────────────────────┘
//! ```
//!
//! Everything runs inside a single future, so the store is never touched by
//! two requests at once.

pub mod dispatcher;
pub mod ready;

pub use dispatcher::{Dispatcher, Token, ACCEPT_BACKOFF, MAX_EVENTS};
pub use ready::ReadyQueue;
