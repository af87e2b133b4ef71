//! Storage Engine Module
//!
//! The store is the only state shared between connections. It is a sharded
//! map from binary-safe keys to binary-safe values; every operation
//! synchronizes internally, so callers only ever hold an `Arc<StorageEngine>`.
//!
//! ## Example
//!
//! ```
//! use respkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"));
//! assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
//! ```

pub mod engine;

pub use engine::{StorageEngine, StorageStats};
