//! Connection Handler Module
//!
//! This module manages individual client connections to RingKV. Connections
//! do not get their own task: the dispatcher owns all of them and drives each
//! one through a small state machine whenever its socket becomes ready.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Dispatcher                            │
//! │                   (server module)                           │
//! └──────────────────────┬──────────────────────────────────────┘
//!                        │
//!                        │ readable / writable
//!                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Connection                             │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ try_read    │───>│ read ring   │───>│ parse frame │      │
//! │  └─────────────┘    └─────────────┘    └──────┬──────┘      │
//! │                                               │             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────▼──────┐      │
//! │  │ try_write   │<───│ write ring  │<───│ execute cmd │      │
//! │  └─────────────┘    └─────────────┘    └─────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Non-blocking I/O**: Every read and write is a `try_*` call
//! - **Bounded Buffers**: Two fixed rings of one maximum frame each
//! - **Pipelining**: Supports multiple requests in a single TCP packet
//! - **Statistics**: Tracks connection and command metrics

pub mod handler;
pub mod ring;

pub use handler::{ConnState, Connection, ConnectionStats, Socket, BUFFER_SIZE};
pub use ring::RingBuffer;
