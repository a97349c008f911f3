//! `dump`: print the words of a memory range
//!
//! Ranges starting at or above `KERNBASE` are read straight through the
//! direct map, which is physically contiguous. Anything lower goes through
//! the page table one page at a time: each page is translated once, and an
//! unmapped page is reported in place of its words. The ten-words-per-line
//! wrap counts printed words only, so it carries across page boundaries.

use super::parse_range;
use crate::domain::{CommandError, Fault, PhysAddr, VirtAddr};
use crate::machine::Machine;
use crate::monitor::{Context, Flow};
use kmon_common::{page_floor, Trapframe, DUMP_WORDS_PER_LINE, KERNBASE, PGSIZE, WORD_SIZE};
use log::debug;
use std::io::{self, Write};

pub const USAGE: &str = "dump [hex start address] [hex end address]";

/// Shown for a word that could not be read
const UNREADABLE: &str = "????????";

pub fn dump(
    args: &[&str],
    ctx: &mut Context<'_>,
    _tf: Option<&Trapframe>,
) -> Result<Flow, CommandError> {
    let (low, high) = parse_range(args, USAGE)?;
    let words = (high - low) / WORD_SIZE;

    let mut lines = WordLines::new(&mut *ctx.out);
    let result = if VirtAddr(low).is_direct_mapped() {
        dump_direct(&*ctx.machine, &mut lines, low, words)
    } else {
        dump_translated(&*ctx.machine, &mut lines, low, words)
    };
    // Close the last partial line even when a fault cut the dump short
    lines.end_line()?;
    result?;
    Ok(Flow::Continue)
}

fn dump_direct(
    machine: &dyn Machine,
    lines: &mut WordLines<'_>,
    low: u32,
    words: u32,
) -> Result<(), CommandError> {
    let base = low - KERNBASE;
    for i in 0..words {
        let word = machine.read_phys_word(PhysAddr(base + i * WORD_SIZE))?;
        lines.word(word)?;
    }
    Ok(())
}

fn dump_translated(
    machine: &dyn Machine,
    lines: &mut WordLines<'_>,
    low: u32,
    words: u32,
) -> Result<(), CommandError> {
    let word_size = u64::from(WORD_SIZE);
    let end = u64::from(low) + u64::from(words) * word_size;
    let mut va = u64::from(low);

    while va < end {
        #[allow(clippy::cast_possible_truncation)]
        let page = page_floor(va as u32);
        let page_end = u64::from(page) + u64::from(PGSIZE);
        // Words that start inside this page
        let span_end = page_end.min(end);

        match machine.lookup(VirtAddr(page)) {
            Some(pte) if pte.is_present() => {
                debug!("dump: page {page:#010x} -> frame {:#010x}", pte.frame_base());
                while va < span_end {
                    #[allow(clippy::cast_possible_truncation)]
                    let addr = va as u32;
                    if va + word_size <= page_end {
                        lines.word(machine.read_phys_word(PhysAddr(pte.translate(addr)))?)?;
                    } else {
                        // Straddles into the next page, which may live anywhere
                        match machine.read_word(VirtAddr(addr)) {
                            Ok(word) => lines.word(word)?,
                            Err(fault @ Fault::OutOfRange { .. }) => return Err(fault.into()),
                            Err(_) => lines.unreadable()?,
                        }
                    }
                    va += word_size;
                }
            }
            entry => {
                let state = if entry.is_some() { "not present" } else { "not mapped" };
                lines.note(format_args!("{}: {state}", VirtAddr(page)))?;
                va += (span_end - va).div_ceil(word_size) * word_size;
            }
        }
    }
    Ok(())
}

/// Prints words in lines of [`DUMP_WORDS_PER_LINE`]
struct WordLines<'w> {
    out: &'w mut dyn Write,
    on_line: usize,
}

impl<'w> WordLines<'w> {
    fn new(out: &'w mut dyn Write) -> Self {
        Self { out, on_line: 0 }
    }

    fn word(&mut self, word: u32) -> io::Result<()> {
        self.cell(format_args!("{word:08x}"))
    }

    fn unreadable(&mut self) -> io::Result<()> {
        self.cell(format_args!("{UNREADABLE}"))
    }

    fn cell(&mut self, text: std::fmt::Arguments<'_>) -> io::Result<()> {
        if self.on_line > 0 {
            write!(self.out, " ")?;
        }
        write!(self.out, "{text}")?;
        self.on_line += 1;
        if self.on_line == DUMP_WORDS_PER_LINE {
            self.end_line()?;
        }
        Ok(())
    }

    /// A message on a line of its own; the wrap counter starts over after it
    fn note(&mut self, text: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.end_line()?;
        writeln!(self.out, "{text}")
    }

    fn end_line(&mut self) -> io::Result<()> {
        if self.on_line > 0 {
            writeln!(self.out)?;
            self.on_line = 0;
        }
        Ok(())
    }
}
