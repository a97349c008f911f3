//! # kmon - Kernel Debug Monitor
//!
//! An interactive monitor for inspecting a stopped i386 kernel: its image
//! layout, its call stack, its page tables and its memory. It can also flip
//! permission bits of kernel page mappings.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Console (stdin)                          │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ one line per command
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Monitor (This Crate)                        │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │  Tokenizer   │──▶│  Dispatcher  │──▶│   Commands   │         │
//! │  └──────────────┘   │  (Registry)  │   └──────┬───────┘         │
//! │                     └──────────────┘          │                 │
//! │                          ┌────────────────────┼──────────┐      │
//! │                          ▼                    ▼          ▼      │
//! │                  ┌──────────────┐   ┌────────────┐ ┌─────────┐  │
//! │                  │   Unwinder   │   │  Machine   │ │ Symbols │  │
//! │                  │ (ebp chain)  │──▶│ (traits)   │ │ (STABS, │  │
//! │                  └──────────────┘   └────────────┘ │  DWARF) │  │
//! │                                                    └─────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`monitor`]: tokenizer, command registry, dispatcher and REPL loop
//! - [`commands`]: `help`, `kerninfo`, `backtrace`, `showmappings`, `dump`,
//!   `pmsetperm` and `pmclearperm`
//! - [`unwind`]: iterator over frame-pointer stack frames
//! - [`machine`]: the traits through which kernel state is reached, and a
//!   simulated machine loaded from a JSON snapshot
//! - [`symbolization`]: instruction address to `file:line: function+offset`
//! - [`domain`]: address newtypes and error types
//! - [`cli`]: command-line argument parsing
//!
//! ## Typical Usage
//!
//! ```bash
//! # Interactive session over a snapshot
//! kmon snapshot.json
//!
//! # Symbolize with the kernel's DWARF info and print a backtrace
//! kmon snapshot.json --kernel obj/kern/kernel -c backtrace
//! ```

pub mod cli;
pub mod commands;
pub mod domain;
pub mod machine;
pub mod monitor;
pub mod symbolization;
pub mod unwind;
