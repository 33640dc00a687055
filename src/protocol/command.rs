//! Command definitions
//!
//! The logical request sent in a query packet and the result decoded from
//! the response.

use super::Status;

/// Separator between command name and arguments in the query payload
pub const ARG_SEPARATOR: char = '!';

/// Query conventionally used to ask an agent for its version
pub const VERSION_COMMAND: &str = "_NRPE_CHECK";

/// A check to run on the remote agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command name as defined in the agent's configuration
    pub name: String,

    /// Ordered arguments
    pub args: Vec<String>,
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The version query
    pub fn version() -> Self {
        Self::new(VERSION_COMMAND)
    }

    /// Parse `name[!arg1[!arg2...]]` as found in a query payload
    pub fn parse(text: &str) -> Self {
        let mut parts = text.split(ARG_SEPARATOR);
        let name = parts.next().unwrap_or_default().to_string();
        Self {
            name,
            args: parts.map(str::to_string).collect(),
        }
    }

    /// Serialized form placed in the query payload (without terminator)
    pub fn to_query_text(&self) -> String {
        if self.args.is_empty() {
            return self.name.clone();
        }
        let mut text = self.name.clone();
        for arg in &self.args {
            text.push(ARG_SEPARATOR);
            text.push_str(arg);
        }
        text
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_query_text())
    }
}

/// The decoded answer to one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub status: Status,

    /// Payload text up to the first NUL
    pub output: String,
}

impl CommandResult {
    pub fn new(status: Status, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    pub fn ok(output: impl Into<String>) -> Self {
        Self::new(Status::Ok, output)
    }
}
