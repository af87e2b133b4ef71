//! Command Handler Module
//!
//! This module is the dispatch layer between the decoder and the store.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Parser    │  (protocol module)
//! └────────┬────────┘
//!          │ Vec<Bytes>
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Lookup       │  table::COMMANDS, case-insensitive
//! │  - Validate     │  declared arity
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```

pub mod handler;
pub mod table;

pub use handler::{CommandHandler, Response};
pub use table::{Arity, CommandSpec, COMMANDS};
