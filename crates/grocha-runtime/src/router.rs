use std::collections::HashMap;
use std::fmt;

/// Every command the bot answers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Kick,
    Lick,
    Emojis,
    Weekend,
    Autoreact,
    Meteo,
    Revolution,
    Grodle,
    Hurt,
    Version,
    Profile,
    Update,
    Restart,
}

impl Command {
    pub const ALL: [Command; 13] = [
        Command::Kick,
        Command::Lick,
        Command::Emojis,
        Command::Weekend,
        Command::Autoreact,
        Command::Meteo,
        Command::Revolution,
        Command::Grodle,
        Command::Hurt,
        Command::Version,
        Command::Profile,
        Command::Update,
        Command::Restart,
    ];

    /// Keyword triggering the command (already folded: lowercase, no accents).
    pub fn keyword(self) -> &'static str {
        match self {
            Command::Kick => "kick",
            Command::Lick => "lick",
            Command::Emojis => "emojis",
            Command::Weekend => "weekend",
            Command::Autoreact => "autoreact",
            Command::Meteo => "meteo",
            Command::Revolution => "revolution",
            Command::Grodle => "grodle",
            Command::Hurt => "hurt",
            Command::Version => "version",
            Command::Profile => "profile",
            Command::Update => "update",
            Command::Restart => "restart",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// What to do with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Dispatch(Command),
    /// Addressed, but no token names a command.
    Unrecognized,
    /// Not addressed: ordinary chatter, looked up in the autoreact table.
    Autoreact,
}

/// Keyword → command table, built once.
#[derive(Debug, Clone)]
pub struct CommandTable {
    commands: HashMap<&'static str, Command>,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTable {
    pub fn new() -> Self {
        Self {
            commands: Command::ALL.iter().map(|c| (c.keyword(), *c)).collect(),
        }
    }

    pub fn lookup(&self, token: &str) -> Option<Command> {
        self.commands.get(token).copied()
    }

    /// Route folded `tokens`. The first token naming a command wins.
    pub fn route(&self, tokens: &[String], addressed: bool) -> Route {
        if !addressed {
            return Route::Autoreact;
        }
        tokens
            .iter()
            .find_map(|t| self.lookup(t))
            .map_or(Route::Unrecognized, Route::Dispatch)
    }
}
