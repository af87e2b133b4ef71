//! The command dispatch table.
//!
//! Each supported command is one `CommandSpec` row: its name, how many
//! arguments it takes, and the function that runs it. Adding a command means
//! adding a row and a function; the dispatcher itself never changes.

use crate::commands::handler::CommandHandler;
use crate::protocol::RespValue;
use bytes::Bytes;

/// Number of arguments a command accepts, not counting the command name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, argc: usize) -> bool {
        match self {
            Arity::Exact(n) => argc == n,
            Arity::AtLeast(n) => argc >= n,
        }
    }
}

/// Signature shared by every command implementation.
pub type CommandFn = fn(&CommandHandler, &[Bytes]) -> RespValue;

/// One row of the dispatch table.
#[derive(Clone, Copy)]
pub struct CommandSpec {
    /// Lowercase command name
    pub name: &'static str,
    pub arity: Arity,
    /// The connection is closed after this command's reply is written
    pub closes_connection: bool,
    pub run: CommandFn,
}

impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("closes_connection", &self.closes_connection)
            .finish()
    }
}

/// All supported commands.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "ping",
        arity: Arity::Exact(0),
        closes_connection: false,
        run: CommandHandler::cmd_ping,
    },
    CommandSpec {
        name: "echo",
        arity: Arity::AtLeast(1),
        closes_connection: false,
        run: CommandHandler::cmd_echo,
    },
    CommandSpec {
        name: "set",
        arity: Arity::Exact(2),
        closes_connection: false,
        run: CommandHandler::cmd_set,
    },
    CommandSpec {
        name: "get",
        arity: Arity::Exact(1),
        closes_connection: false,
        run: CommandHandler::cmd_get,
    },
    CommandSpec {
        name: "quit",
        arity: Arity::Exact(0),
        closes_connection: true,
        run: CommandHandler::cmd_quit,
    },
    CommandSpec {
        name: "test",
        arity: Arity::Exact(0),
        closes_connection: false,
        run: CommandHandler::cmd_test,
    },
];

/// Finds a command by name, ignoring ASCII case.
pub fn lookup(name: &[u8]) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.as_bytes().eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        for name in [&b"get"[..], b"GET", b"Get", b"gEt"] {
            assert_eq!(lookup(name).map(|spec| spec.name), Some("get"));
        }
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup(b"flushall").is_none());
        assert!(lookup(b"").is_none());
        assert!(lookup(b"gett").is_none());
    }

    #[test]
    fn test_names_are_unique_and_lowercase() {
        for (i, spec) in COMMANDS.iter().enumerate() {
            assert_eq!(spec.name, spec.name.to_ascii_lowercase());
            assert!(COMMANDS[i + 1..].iter().all(|other| other.name != spec.name));
        }
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(2).accepts(2));
        assert!(!Arity::Exact(2).accepts(1));
        assert!(!Arity::Exact(2).accepts(3));
        assert!(Arity::AtLeast(1).accepts(1));
        assert!(Arity::AtLeast(1).accepts(5));
        assert!(!Arity::AtLeast(1).accepts(0));
    }

    #[test]
    fn test_only_quit_closes_connection() {
        let closing: Vec<_> = COMMANDS
            .iter()
            .filter(|spec| spec.closes_connection)
            .map(|spec| spec.name)
            .collect();
        assert_eq!(closing, vec!["quit"]);
    }
}
