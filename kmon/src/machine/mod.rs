//! # Kernel State Access
//!
//! The monitor never touches kernel memory directly. Everything it reads or
//! edits goes through the traits in this module, which model the three
//! collaborators a live kernel provides:
//!
//! - [`AddressTranslator`]: the page-table walk (`pgdir_walk` with
//!   `create = 0`). It never allocates; an address without an entry is the
//!   first-class "unmapped" outcome `None`.
//! - [`PhysicalMemory`]: raw physical reads, used by `dump` once a frame has
//!   been resolved.
//! - [`ReadMemory`]: word reads through the virtual address space, used by
//!   the stack unwinder.
//!
//! [`Machine`] bundles them with the registers the monitor needs at entry.
//! [`SimulatedMachine`] implements it on the host from a JSON [`Snapshot`].

pub mod simulated;
pub mod snapshot;

pub use simulated::SimulatedMachine;
pub use snapshot::{KernelLayout, Snapshot};

use crate::domain::{Fault, PhysAddr, VirtAddr};
use kmon_common::{PageTableEntry, Trapframe, WORD_SIZE};

/// Resolves a virtual address to the page-table entry covering it
pub trait AddressTranslator {
    /// Entry covering `va`, if one exists
    ///
    /// An entry is returned even when its Present bit is clear.
    fn lookup(&self, va: VirtAddr) -> Option<PageTableEntry>;

    /// Mutable access to the entry covering `va`, if one exists
    ///
    /// Like [`lookup`](Self::lookup) this never creates a mapping.
    fn lookup_mut(&mut self, va: VirtAddr) -> Option<&mut PageTableEntry>;
}

/// Raw access to physical memory
pub trait PhysicalMemory {
    /// Fill `buf` with the bytes starting at `pa`
    ///
    /// # Errors
    /// Returns [`Fault::OutOfRange`] if any byte lies outside physical memory
    fn read_phys(&self, pa: PhysAddr, buf: &mut [u8]) -> Result<(), Fault>;

    /// Read one little-endian word at `pa`
    ///
    /// # Errors
    /// Returns [`Fault::OutOfRange`] if the word lies outside physical memory
    fn read_phys_word(&self, pa: PhysAddr) -> Result<u32, Fault> {
        let mut bytes = [0u8; WORD_SIZE as usize];
        self.read_phys(pa, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }
}

/// Word reads through the kernel's virtual address space
pub trait ReadMemory {
    /// # Errors
    /// Returns a [`Fault`] if the word cannot be reached
    fn read_word(&self, va: VirtAddr) -> Result<u32, Fault>;
}

/// Everything the monitor needs from the kernel it is inspecting
pub trait Machine: AddressTranslator + PhysicalMemory + ReadMemory {
    /// `%ebp` at the moment the monitor was entered
    fn frame_pointer(&self) -> u32;

    /// Saved register state, when the monitor was entered from a trap
    fn trapframe(&self) -> Option<&Trapframe>;

    /// Boundary symbols of the kernel image
    fn layout(&self) -> &KernelLayout;
}
