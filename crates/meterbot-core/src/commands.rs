//! Command table and message routing.
//!
//! The table is built once at startup and handed to the transport layer; the
//! router only decides *where* a message goes, handlers live in the adapter.

/// Bot commands understood by the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    Status,
    Help,
    Currency,
    Meters,
    LastMeters,
    Cancel,
    WhoAmI,
}

/// Who may run a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Anyone, including chats outside the allow-list.
    Public,
    /// Allow-listed chats only.
    Restricted,
}

#[derive(Clone, Copy, Debug)]
pub struct CommandSpec {
    pub command: Command,
    /// Name without the leading slash.
    pub name: &'static str,
    pub description: &'static str,
    pub access: Access,
}

/// Where an inbound message should go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Feed the text to the pending meters conversation.
    Conversation,
    Command(Command),
    /// Unknown command, or one the sender may not use.
    Unsupported(String),
    /// Plain text with nothing waiting for it.
    Ignore,
}

const STANDARD_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: Command::Status,
        name: "status",
        description: "check bot status",
        access: Access::Restricted,
    },
    CommandSpec {
        command: Command::Currency,
        name: "currency",
        description: "check current exchange rate",
        access: Access::Restricted,
    },
    CommandSpec {
        command: Command::Meters,
        name: "meters",
        description: "set meters",
        access: Access::Restricted,
    },
    CommandSpec {
        command: Command::LastMeters,
        name: "lastmeters",
        description: "show last meters",
        access: Access::Restricted,
    },
    CommandSpec {
        command: Command::Cancel,
        name: "cancel",
        description: "cancel meters input",
        access: Access::Restricted,
    },
    CommandSpec {
        command: Command::Help,
        name: "help",
        description: "list commands",
        access: Access::Restricted,
    },
    CommandSpec {
        command: Command::WhoAmI,
        name: "whoami",
        description: "show info about requesting user",
        access: Access::Public,
    },
];

#[derive(Clone, Debug)]
pub struct CommandRouter {
    table: Vec<CommandSpec>,
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new(STANDARD_COMMANDS.to_vec())
    }
}

impl CommandRouter {
    pub fn new(table: Vec<CommandSpec>) -> Self {
        Self { table }
    }

    pub fn commands(&self) -> &[CommandSpec] {
        &self.table
    }

    pub fn lookup(&self, name: &str) -> Option<&CommandSpec> {
        self.table.iter().find(|c| c.name == name)
    }

    pub fn route(&self, text: &str, authorized: bool, in_conversation: bool) -> Route {
        if authorized && in_conversation {
            return Route::Conversation;
        }

        let Some((name, _args)) = parse_command(text) else {
            return Route::Ignore;
        };

        match self.lookup(&name) {
            Some(entry) if authorized || entry.access == Access::Public => Route::Command(entry.command),
            _ => Route::Unsupported(name),
        }
    }

    /// `/name - description` lines, in table order.
    pub fn help_text(&self) -> String {
        self.table
            .iter()
            .map(|c| format!("/{} - {}", c.name, c.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Split `/cmd@botname arg1 ...` into a lowercased name and the rest.
///
/// Returns `None` for text that is not a command.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    if cmd.is_empty() {
        return None;
    }
    Some((cmd, rest))
}
