//! # The Interactive Monitor
//!
//! Reads command lines, splits them into arguments and hands them to the
//! matching entry of the fixed command table.
//!
//! ```text
//!  LineReader ──line──► tokenize ──argv──► Monitor::dispatch ──► Handler
//!      ▲                                        │                   │
//!      └──────────── status >= 0 ◄──────────────┘◄── Flow/Error ────┘
//! ```
//!
//! A negative dispatch status ends the loop; every other outcome, including
//! an unknown command or a failed handler, returns to the prompt.

pub mod console;
pub mod registry;
pub mod tokenizer;

pub use console::{Console, LineReader, Script, BUFLEN};
pub use registry::{Command, Flow, Handler, Registry, BUILTIN_COMMANDS};
pub use tokenizer::{tokenize, TooManyArguments};

use crate::domain::{CommandError, RegistryError};
use crate::machine::{KernelLayout, Machine};
use crate::symbolization::Symbolize;
use kmon_common::MAX_ARGS;
use log::{error, info};
use std::io::{self, Write};

/// Prompt printed before every command line
pub const PROMPT: &str = "K> ";

/// Default bound on frames printed by `backtrace`
pub const DEFAULT_MAX_FRAMES: usize = 256;

const BANNER: &str = "Welcome to the kernel monitor!\nType 'help' for a list of commands.";

/// Everything a command handler may touch
pub struct Context<'a> {
    pub machine: &'a mut dyn Machine,
    pub symbols: &'a dyn Symbolize,
    /// Console sink for command output
    pub out: &'a mut dyn Write,
    pub registry: Registry,
    /// Kernel image boundaries reported by `kerninfo`
    pub layout: KernelLayout,
    pub max_frames: usize,
}

/// A monitor session over one machine
pub struct Monitor<'a> {
    ctx: Context<'a>,
}

impl<'a> Monitor<'a> {
    /// Monitor with the built-in commands, reporting the machine's own layout
    ///
    /// # Errors
    /// Fails if the built-in command table has an empty or repeated name
    pub fn new(
        machine: &'a mut dyn Machine,
        symbols: &'a dyn Symbolize,
        out: &'a mut dyn Write,
    ) -> Result<Self, RegistryError> {
        let registry = Registry::builtin()?;
        let layout = *machine.layout();
        Ok(Self {
            ctx: Context {
                machine,
                symbols,
                out,
                registry,
                layout,
                max_frames: DEFAULT_MAX_FRAMES,
            },
        })
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.ctx.registry = registry;
        self
    }

    /// Report these image boundaries instead of the machine's
    #[must_use]
    pub fn with_layout(mut self, layout: KernelLayout) -> Self {
        self.ctx.layout = layout;
        self
    }

    #[must_use]
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.ctx.max_frames = max_frames;
        self
    }

    /// Print the welcome banner
    ///
    /// # Errors
    /// Returns an error if the console cannot be written
    pub fn banner(&mut self) -> io::Result<()> {
        writeln!(self.ctx.out, "{BANNER}")
    }

    /// Read, tokenize and dispatch lines until end of input or a negative status
    ///
    /// # Errors
    /// Returns an error if the line reader fails
    pub fn run<L: LineReader + ?Sized>(&mut self, reader: &mut L) -> io::Result<()> {
        info!("Monitor session started");
        loop {
            let Some(line) = reader.read_line(PROMPT)? else {
                info!("End of input, leaving monitor");
                break;
            };
            let status = self.run_line(&line);
            if status < 0 {
                info!("Command returned {status}, leaving monitor");
                break;
            }
        }
        self.ctx.out.flush()
    }

    /// Tokenize and dispatch one line, returning the dispatch status
    pub fn run_line(&mut self, line: &str) -> i32 {
        match tokenize(line, MAX_ARGS) {
            Ok(argv) => self.dispatch(&argv),
            Err(err) => self.say(format_args!("{err}")).unwrap_or(0),
        }
    }

    /// Run the command named by `argv[0]`
    ///
    /// Empty input is a no-op. An unknown name is reported and returns 0. A
    /// failing handler has its error reported and the error's status returned.
    pub fn dispatch(&mut self, argv: &[&str]) -> i32 {
        let Some(&name) = argv.first() else {
            return 0;
        };
        let Some(command) = self.ctx.registry.find(name) else {
            return self.say(format_args!("Unknown command '{name}'")).unwrap_or(0);
        };

        let tf = self.ctx.machine.trapframe().copied();
        match (command.handler)(argv, &mut self.ctx, tf.as_ref()) {
            Ok(flow) => flow.status(),
            Err(err) => self.report(command.name, &err),
        }
    }

    fn report(&mut self, name: &str, err: &CommandError) -> i32 {
        let printed = match err {
            CommandError::Usage { usage, .. } => {
                self.say(format_args!("{err}\nUsage :\n    {usage}"))
            }
            CommandError::Io(io_err) => {
                error!("Console write failed in '{name}': {io_err}");
                return err.status();
            }
            CommandError::NotMapped(_) | CommandError::Fault(_) => {
                self.say(format_args!("{name}: {err}"))
            }
        };
        printed.unwrap_or_else(|| err.status())
    }

    /// Write one line to the console; `Some(-1)` if the console is gone
    fn say(&mut self, message: std::fmt::Arguments<'_>) -> Option<i32> {
        match writeln!(self.ctx.out, "{message}") {
            Ok(()) => None,
            Err(err) => {
                error!("Console write failed: {err}");
                Some(-1)
            }
        }
    }
}
