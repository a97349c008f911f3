//! # Monitor Commands
//!
//! One handler per built-in command. Every handler has the
//! [`Handler`](crate::monitor::Handler) signature: it receives the full
//! argument vector (`args[0]` is the command name), the monitor context and
//! the saved trapframe, and reports argument problems as
//! [`CommandError::Usage`] so the dispatcher can print the usage text.
//!
//! | Command        | Reads                        | Writes         |
//! |----------------|------------------------------|----------------|
//! | `help`         | command table                |                |
//! | `kerninfo`     | kernel layout                |                |
//! | `backtrace`    | stack memory, symbols        |                |
//! | `showmappings` | page table                   |                |
//! | `dump`         | page table, physical memory  |                |
//! | `pmsetperm`    | page table                   | one entry bit  |
//! | `pmclearperm`  | page table                   | one entry bit  |

mod backtrace;
mod dump;
mod help;
mod kerninfo;
pub mod perm;
mod showmappings;

pub use backtrace::backtrace;
pub use dump::dump;
pub use help::help;
pub use kerninfo::kerninfo;
pub use perm::{pmclearperm, pmsetperm};
pub use showmappings::showmappings;

use crate::domain::{parse_hex, CommandError};

/// Parse a hex address argument
fn parse_addr(text: &str, usage: &'static str) -> Result<u32, CommandError> {
    parse_hex(text)
        .ok_or_else(|| CommandError::usage(usage, format!("'{text}' is not a 32-bit hex address")))
}

/// Parse `<cmd> <low> <high>` with `low <= high`
fn parse_range(args: &[&str], usage: &'static str) -> Result<(u32, u32), CommandError> {
    let [_, low, high] = args else {
        return Err(CommandError::usage(
            usage,
            format!("expected 2 arguments, got {}", args.len().saturating_sub(1)),
        ));
    };
    let low = parse_addr(low, usage)?;
    let high = parse_addr(high, usage)?;
    if low > high {
        return Err(CommandError::usage(
            usage,
            format!("start address {low:08x} is above end address {high:08x}"),
        ));
    }
    Ok((low, high))
}
