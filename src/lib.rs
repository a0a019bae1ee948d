//! # RingKV - An Event-Driven In-Memory Key-Value Server
//!
//! RingKV is a single-process key-value store reachable over a small
//! length-prefixed binary protocol. It serves every client from one
//! readiness-driven loop, so the keyspace needs no locks at all.
//!
//! ## Features
//!
//! - **Non-Blocking Connections**: Each connection owns a pair of fixed-size ring
//!   buffers and survives partial reads and writes without ever blocking the loop
//! - **Incremental Rehashing**: The hash table grows and shrinks by migrating a
//!   bounded number of nodes per operation instead of stopping the world
//! - **Bounded Frames**: Requests larger than 8 KB are rejected and the
//!   connection is closed
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                               RingKV                                 │
//! │                                                                      │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────┐              │
//! │  │ Dispatcher  │───>│  Connection  │───>│  Command    │              │
//! │  │ (readiness) │    │ rbuf / wbuf  │    │  Handler    │              │
//! │  └─────────────┘    └──────┬───────┘    └──────┬──────┘              │
//! │                            │                   │                     │
//! │                            ▼                   ▼                     │
//! │                     ┌─────────────┐    ┌──────────────────────────┐  │
//! │                     │  Protocol   │    │          Store           │  │
//! │                     │   Codec     │    │  ┌────────┐ ┌─────────┐  │  │
//! │                     └─────────────┘    │  │ active │ │retiring │  │  │
//! │                                        │  └────────┘ └─────────┘  │  │
//! │                                        └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use ringkv::server::Dispatcher;
//! use ringkv::storage::Store;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> std::io::Result<()> {
//!     let listener = TcpListener::bind("127.0.0.1:1234").await?;
//!     let mut dispatcher = Dispatcher::from_listener(listener, Store::new());
//!     dispatcher.run().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `get key` - `OK "get <value>"` or `NX "not found <key>"`
//! - `set key value` - `OK "new <key> to <value>"` or `OK "changed <key> to <value>"`
//! - `del key` - `OK "deleted <key>"` or `OK "not found <key>"`
//!
//! Anything else is answered with `ERR "Unknown cmd"`.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Request/response framing
//! - [`storage`]: Incrementally resized hash map and the keyspace built on it
//! - [`commands`]: The `get`/`set`/`del` command table
//! - [`connection`]: Ring buffers and the per-connection state machine
//! - [`server`]: The readiness-driven dispatcher
//! - [`client`]: A minimal async client
//! - [`config`]: Server configuration and argument parsing

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use commands::CommandHandler;
pub use config::{CliAction, Config, ConfigError};
pub use connection::{ConnState, Connection, ConnectionStats, RingBuffer};
pub use protocol::{ParseError, Response, Status};
pub use server::Dispatcher;
pub use storage::{HMap, Store};

/// The default port RingKV listens on
pub const DEFAULT_PORT: u16 = 1234;

/// The default host RingKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// The default listen backlog
pub const DEFAULT_BACKLOG: u32 = 20;

/// Environment variable the client reads its server address from
pub const ADDR_ENV: &str = "RINGKV_ADDR";

/// Version of RingKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
