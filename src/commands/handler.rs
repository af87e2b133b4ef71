//! Command Handler Module
//!
//! Receives a decoded argument vector, looks the command up in the dispatch
//! table, checks its arity and runs it against the storage engine.
//!
//! ## Supported Commands
//!
//! - `PING` - Replies `PONG`
//! - `ECHO message [message ...]` - One argument comes back as a bulk
//!   string, several come back as an array
//! - `SET key value` - Set a key
//! - `GET key` - Get a key's value, or null
//! - `QUIT` - Replies `OK` and closes the connection
//! - `TEST` - Diagnostic; replies with the statuses `hello` and `world`
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │  lookup()   │───>│ arity check │───>│  cmd_*()    │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::commands::table;
use crate::protocol::RespValue;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;
use tracing::trace;

/// The outcome of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Reply to write back to the client
    pub reply: RespValue,
    /// Close the connection once the reply is written
    pub close: bool,
}

impl Response {
    fn reply(reply: RespValue) -> Self {
        Self {
            reply,
            close: false,
        }
    }
}

/// Dispatches commands to their implementations.
///
/// Cloning is cheap: every clone shares the same storage engine.
#[derive(Debug, Clone)]
pub struct CommandHandler {
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Executes a command and returns the reply.
    ///
    /// # Arguments
    ///
    /// * `args` - The decoded request; the first element is the command name
    ///
    /// Unknown commands and wrong argument counts produce error replies; they
    /// never fail the connection.
    pub fn execute(&self, args: &[Bytes]) -> Response {
        let Some((name, args)) = args.split_first() else {
            return Response::reply(RespValue::error("ERR empty command"));
        };

        let Some(spec) = table::lookup(name) else {
            return Response::reply(RespValue::error(format!(
                "ERR unknown command '{}'",
                String::from_utf8_lossy(name)
            )));
        };

        if !spec.arity.accepts(args.len()) {
            return Response::reply(RespValue::error(format!(
                "ERR wrong number of arguments for '{}' command",
                spec.name
            )));
        }

        trace!(command = spec.name, argc = args.len(), "Executing command");

        Response {
            reply: (spec.run)(self, args),
            close: spec.closes_connection,
        }
    }

    // Argument counts below are already checked against the table.

    /// PING
    pub(crate) fn cmd_ping(&self, _args: &[Bytes]) -> RespValue {
        RespValue::pong()
    }

    /// ECHO message [message ...]
    pub(crate) fn cmd_echo(&self, args: &[Bytes]) -> RespValue {
        match args {
            [message] => RespValue::bulk_string(message.clone()),
            messages => RespValue::array(
                messages
                    .iter()
                    .cloned()
                    .map(RespValue::bulk_string)
                    .collect(),
            ),
        }
    }

    /// SET key value
    pub(crate) fn cmd_set(&self, args: &[Bytes]) -> RespValue {
        self.storage.set(args[0].clone(), args[1].clone());
        RespValue::ok()
    }

    /// GET key
    pub(crate) fn cmd_get(&self, args: &[Bytes]) -> RespValue {
        match self.storage.get(&args[0]) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null(),
        }
    }

    /// QUIT
    pub(crate) fn cmd_quit(&self, _args: &[Bytes]) -> RespValue {
        RespValue::ok()
    }

    /// TEST
    pub(crate) fn cmd_test(&self, _args: &[Bytes]) -> RespValue {
        RespValue::array(vec![
            RespValue::simple_string("hello"),
            RespValue::simple_string("world"),
        ])
    }
}
