//! Command Handler Module
//!
//! This module implements the command processing layer for RingKV.
//! It receives decoded requests, executes them against the store,
//! and returns the responses to frame back.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Request Codec   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │     Store       │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - `get key`
//! - `set key value`
//! - `del key`

pub mod handler;

// Re-export the main command handler
pub use handler::{CommandHandler, UNKNOWN_CMD};
