//! The line protocol spoken with the launcher over the unix socket.
//!
//! Each connection carries exactly one command line, and receives newline-terminated records.
use crate::tab::{TabId, TabSnapshot};
use std::{fmt, fmt::Write, str::FromStr};
use thiserror::Error;

/// Written to the client when its command line can't be parsed
pub const INVALID_COMMAND_RESPONSE: &str = "Invalid command\n";

/// A request from the launcher
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    /// Prints the number of open tabs
    Count,
    /// Prints one line per cached tab
    List,
    /// Activates the tab, and focuses its window
    Select(TabId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid command: {0:?}")]
    InvalidCommand(String),
}

impl Command {
    /// Parses a command line.  Surrounding whitespace (including the newline) is ignored.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();

        match line {
            "count" => Ok(Command::Count),
            "list" => Ok(Command::List),
            _ => line
                .strip_prefix("select ")
                .and_then(|id| id.parse::<i64>().ok())
                .map(|id| Command::Select(TabId(id)))
                .ok_or_else(|| CommandError::InvalidCommand(line.to_string())),
        }
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Formats the command as a request line, without the trailing newline
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Count => write!(f, "count"),
            Command::List => write!(f, "list"),
            Command::Select(id) => write!(f, "select {}", id),
        }
    }
}

/// Renders the response to `count`
pub fn render_count(count: i64) -> String {
    format!("{}\n", count)
}

/// Renders the response to `list`, as `pid,id,host,title` records.
///
/// Commas and newlines within the host or title are not escaped.
pub fn render_list(pid: u32, snapshot: &TabSnapshot) -> String {
    let mut response = String::new();

    for tab in snapshot.iter() {
        // writing to a String can't fail
        let _ = writeln!(response, "{},{},{},{}", pid, tab.id, tab.host, tab.title);
    }

    response
}
