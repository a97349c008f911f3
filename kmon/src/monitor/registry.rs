//! The fixed command table
//!
//! Commands are registered once, in a static array, and never change at
//! runtime. Lookup is an exact, case-sensitive match returning the first
//! entry with that name.

use super::Context;
use crate::commands;
use crate::domain::{CommandError, RegistryError};
use kmon_common::Trapframe;

/// What the REPL should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Leave the monitor
    Exit,
}

impl Flow {
    /// Dispatcher status for this outcome; negative ends the REPL
    #[must_use]
    pub fn status(self) -> i32 {
        match self {
            Flow::Continue => 0,
            Flow::Exit => -1,
        }
    }
}

/// Signature shared by all command handlers
///
/// `args[0]` is the command name itself.
pub type Handler =
    fn(args: &[&str], ctx: &mut Context<'_>, tf: Option<&Trapframe>) -> Result<Flow, CommandError>;

/// One monitor command
#[derive(Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    pub desc: &'static str,
    pub handler: Handler,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command").field("name", &self.name).finish_non_exhaustive()
    }
}

/// The built-in commands, in the order `help` lists them
pub static BUILTIN_COMMANDS: [Command; 7] = [
    Command { name: "help", desc: "Display this list of commands", handler: commands::help },
    Command {
        name: "kerninfo",
        desc: "Display information about the kernel",
        handler: commands::kerninfo,
    },
    Command {
        name: "backtrace",
        desc: "Display a list of call frames",
        handler: commands::backtrace,
    },
    Command {
        name: "showmappings",
        desc: "Display the physical page mappings",
        handler: commands::showmappings,
    },
    Command {
        name: "dump",
        desc: "Display the content of a memory range",
        handler: commands::dump,
    },
    Command {
        name: "pmsetperm",
        desc: "Sets page mapping permissions bit",
        handler: commands::pmsetperm,
    },
    Command {
        name: "pmclearperm",
        desc: "Clears page mapping permissions bit",
        handler: commands::pmclearperm,
    },
];

/// Immutable view of a command table with unique names
#[derive(Debug, Clone, Copy)]
pub struct Registry {
    commands: &'static [Command],
}

impl Registry {
    /// Wrap a command table, checking that every name is non-empty and unique
    ///
    /// # Errors
    /// Returns the first offending name
    pub fn new(commands: &'static [Command]) -> Result<Self, RegistryError> {
        for (i, cmd) in commands.iter().enumerate() {
            if cmd.name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if commands[..i].iter().any(|earlier| earlier.name == cmd.name) {
                return Err(RegistryError::DuplicateName(cmd.name));
            }
        }
        Ok(Self { commands })
    }

    /// The monitor's built-in command set, checked like any other table
    ///
    /// # Errors
    /// Returns the first empty or repeated name in [`BUILTIN_COMMANDS`]
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(&BUILTIN_COMMANDS)
    }

    /// First command whose name equals `name` exactly
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&'static Command> {
        self.commands.iter().find(|cmd| cmd.name == name)
    }

    /// All commands in registration order
    #[must_use]
    pub fn commands(&self) -> &'static [Command] {
        self.commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(_: &[&str], _: &mut Context<'_>, _: Option<&Trapframe>) -> Result<Flow, CommandError> {
        Ok(Flow::Continue)
    }

    static DUPLICATED: [Command; 3] = [
        Command { name: "a", desc: "", handler: nop },
        Command { name: "b", desc: "", handler: nop },
        Command { name: "a", desc: "", handler: nop },
    ];

    static UNNAMED: [Command; 1] = [Command { name: "", desc: "", handler: nop }];

    #[test]
    fn test_builtin_names_are_unique() {
        let names: Vec<&str> =
            Registry::builtin().unwrap().commands().iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                "help",
                "kerninfo",
                "backtrace",
                "showmappings",
                "dump",
                "pmsetperm",
                "pmclearperm"
            ]
        );
    }

    #[test]
    fn test_rejects_duplicates() {
        assert_eq!(Registry::new(&DUPLICATED).unwrap_err(), RegistryError::DuplicateName("a"));
        assert_eq!(Registry::new(&UNNAMED).unwrap_err(), RegistryError::EmptyName);
    }

    #[test]
    fn test_find_is_exact_and_case_sensitive() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(registry.find("dump").map(|c| c.name), Some("dump"));
        assert!(registry.find("Dump").is_none());
        assert!(registry.find("du").is_none());
        assert!(registry.find("dumpx").is_none());
    }
}
