//! # kmon - Main Entry Point
//!
//! Supports two operational modes:
//! - **Interactive** (default): banner, `K> ` prompt, one command per stdin line
//! - **Scripted** (`-c CMD`, repeatable): runs the commands in order, then exits
//!
//! Either way the monitor inspects the machine described by the snapshot
//! file; `--kernel` adds DWARF symbols and the image layout from the ELF.

use anyhow::{Context, Result};
use clap::Parser;
use kmon::cli::Args;
use kmon::machine::{KernelLayout, SimulatedMachine, Snapshot};
use kmon::monitor::{Console, Monitor, Script};
use kmon::symbolization::{DwarfSymbolizer, StabTable, Symbolize};
use log::{info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOINPUT: i32 = 66;

fn main() {
    env_logger::init();
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    std::process::exit(match run(&args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

/// A snapshot or kernel image that could not be read from disk
#[derive(Error, Debug)]
#[error("Cannot read {}", path.display())]
struct UnreadableInput {
    path: PathBuf,
    #[source]
    source: io::Error,
}

impl UnreadableInput {
    fn new(path: &Path, source: io::Error) -> Self {
        Self { path: path.to_path_buf(), source }
    }
}

/// Only input files map to `EXIT_NOINPUT`; console failures are plain errors
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|cause| cause.is::<UnreadableInput>()) {
        EXIT_NOINPUT
    } else {
        EXIT_ERROR
    }
}

/// Pick the symbol sources and the layout `kerninfo` reports
fn load_symbols(
    args: &Args,
    stabs: StabTable,
) -> Result<(Box<dyn Symbolize>, Option<KernelLayout>)> {
    let Some(path) = &args.kernel else {
        return Ok((Box::new(stabs), None));
    };

    let image = fs::read(path).map_err(|err| UnreadableInput::new(path, err))?;
    let dwarf = DwarfSymbolizer::from_image(&image)
        .with_context(|| format!("Failed to load kernel {}", path.display()))?;
    let layout = dwarf.kernel_layout();
    if layout.is_none() {
        warn!(
            "{} has no _start/etext/edata/end symbols, using the snapshot layout",
            path.display()
        );
    }
    // ELF symbols first, the snapshot's table for anything the ELF lacks
    Ok((Box::new((dwarf, stabs)), layout))
}

fn run(args: &Args) -> Result<()> {
    let text = fs::read_to_string(&args.snapshot)
        .map_err(|err| UnreadableInput::new(&args.snapshot, err))?;
    let snapshot = Snapshot::from_json(&text)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;
    let mut machine = SimulatedMachine::from_snapshot(&snapshot).context("Invalid snapshot")?;
    let stabs = StabTable::from_specs(&snapshot.symbols).context("Invalid symbol table")?;
    info!("Symbol table has {} functions", stabs.len());

    let (symbols, layout) = load_symbols(args, stabs)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut monitor = Monitor::new(&mut machine, &*symbols, &mut out)
        .context("Invalid command table")?
        .with_max_frames(args.max_frames);
    if let Some(layout) = layout {
        monitor = monitor.with_layout(layout);
    }

    if args.commands.is_empty() {
        if !args.quiet {
            monitor.banner()?;
        }
        let mut console = Console::new(io::stdin().lock(), io::stdout());
        monitor.run(&mut console)?;
    } else {
        let mut script = Script::new(args.commands.iter().map(String::as_str));
        monitor.run(&mut script)?;
    }
    Ok(())
}
