//! # Shared Layouts (Kernel ↔ Monitor)
//!
//! Defines the i386 memory-layout constants, page-table entry format and
//! saved register frame that both the kernel and the monitor agree on. All
//! types that mirror hardware or kernel structures are `#[repr(C)]` or
//! `#[repr(transparent)]` so they can be read straight out of kernel memory.
//!
//! ## Key Types
//!
//! - [`PageTableEntry`] - one 32-bit i386 PTE (frame base + flag bits)
//! - [`PteFlags`] - the low 12 flag bits of an entry
//! - [`Permission`] - the single-letter permission codes the monitor edits
//! - [`Trapframe`] - register state saved on entry to the monitor

#![no_std]

use bitflags::bitflags;
use core::fmt;

// ============================================================================
// Memory Layout
// ============================================================================

/// Bytes mapped by a single page-table entry
pub const PGSIZE: u32 = 4096;

/// log2(`PGSIZE`)
pub const PGSHIFT: u32 = 12;

/// Every physical address is mapped at this virtual address (the direct map)
pub const KERNBASE: u32 = 0xF000_0000;

/// User-accessible addresses end here; everything above is kernel-only
pub const ULIM: u32 = 0xEF80_0000;

/// Mask selecting the physical frame base of an entry
pub const PTE_ADDR_MASK: u32 = 0xFFFF_F000;

/// Size of one machine word read by the monitor
pub const WORD_SIZE: u32 = 4;

// ============================================================================
// Monitor Constants
// ============================================================================

/// Width of one console text line; also the command buffer size
pub const CMDBUF_SIZE: usize = 80;

/// Size of the argument list, terminator slot included
pub const MAX_ARGS: usize = 16;

/// Words printed per `dump` output line
pub const DUMP_WORDS_PER_LINE: usize = CMDBUF_SIZE / 8;

// ============================================================================
// Frame-Pointer Chain Layout
// ============================================================================

/// Saved `%ebp` value that marks the outermost frame
///
/// The kernel entry code clears `%ebp` before its first call, so the
/// outermost frame stores zero as its caller's frame pointer.
pub const SENTINEL_FRAME_POINTER: u32 = 0;

/// Argument words shown for every frame, regardless of the real arity
pub const FRAME_ARG_WORDS: usize = 5;

/// Round an address down to its page boundary
#[must_use]
pub const fn page_floor(addr: u32) -> u32 {
    addr & !(PGSIZE - 1)
}

/// Offset of an address within its page
#[must_use]
pub const fn page_offset(addr: u32) -> u32 {
    addr & (PGSIZE - 1)
}

// ============================================================================
// Page-Table Entries
// ============================================================================

bitflags! {
    /// Flag bits of an i386 page-table entry
    ///
    /// Only the low 12 bits are flags; the upper 20 bits hold the frame base.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PteFlags: u32 {
        /// Present
        const P = 0x001;
        /// Writeable
        const W = 0x002;
        /// User
        const U = 0x004;
        /// Write-through
        const PWT = 0x008;
        /// Cache-disable
        const PCD = 0x010;
        /// Accessed
        const A = 0x020;
        /// Dirty
        const D = 0x040;
        /// Page size
        const PS = 0x080;
        /// Global
        const G = 0x100;
    }
}

/// One 32-bit i386 page-table entry
///
/// Stored exactly as the MMU sees it. Bits 9-11 are available to software and
/// are carried through untouched by every mutation in this crate.
#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageTableEntry(pub u32);

impl PageTableEntry {
    /// Build an entry from a frame base and flags
    ///
    /// The frame base is masked to page alignment.
    #[must_use]
    pub const fn new(frame_base: u32, flags: PteFlags) -> Self {
        Self((frame_base & PTE_ADDR_MASK) | flags.bits())
    }

    /// Raw 32-bit value
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Page-aligned physical frame base
    #[must_use]
    pub const fn frame_base(self) -> u32 {
        self.0 & PTE_ADDR_MASK
    }

    /// Known flag bits (unknown low bits are dropped from the view, not the entry)
    #[must_use]
    pub const fn flags(self) -> PteFlags {
        PteFlags::from_bits_truncate(self.0)
    }

    #[must_use]
    pub const fn is_present(self) -> bool {
        self.0 & PteFlags::P.bits() != 0
    }

    #[must_use]
    pub const fn is_writable(self) -> bool {
        self.0 & PteFlags::W.bits() != 0
    }

    #[must_use]
    pub const fn is_user(self) -> bool {
        self.0 & PteFlags::U.bits() != 0
    }

    #[must_use]
    pub const fn is_dirty(self) -> bool {
        self.0 & PteFlags::D.bits() != 0
    }

    /// Whether a permission bit is set
    #[must_use]
    pub const fn has(self, perm: Permission) -> bool {
        self.0 & perm.flag().bits() != 0
    }

    /// Clear one permission bit, then set it again if `set`
    ///
    /// No other bit of the entry changes.
    pub fn apply(&mut self, perm: Permission, set: bool) {
        let bit = perm.flag().bits();
        self.0 &= !bit;
        if set {
            self.0 |= bit;
        }
    }

    /// Physical address backing `va` through this entry
    #[must_use]
    pub const fn translate(self, va: u32) -> u32 {
        self.frame_base() | page_offset(va)
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PageTableEntry({:#010x}, {:?})", self.0, self.flags())
    }
}

// ============================================================================
// Permission Codes
// ============================================================================

/// Permission bit addressed by the `pmsetperm` / `pmclearperm` commands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    /// `P` - present
    Present,
    /// `W` - writable
    Writable,
    /// `U` - user-accessible
    User,
    /// `D` - dirty
    Dirty,
}

impl Permission {
    pub const ALL: [Permission; 4] =
        [Permission::Present, Permission::Writable, Permission::User, Permission::Dirty];

    /// Parse a permission code letter (`P`, `W`, `U` or `D`)
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code {
            'P' => Some(Self::Present),
            'W' => Some(Self::Writable),
            'U' => Some(Self::User),
            'D' => Some(Self::Dirty),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Present => 'P',
            Self::Writable => 'W',
            Self::User => 'U',
            Self::Dirty => 'D',
        }
    }

    /// The entry bit this code addresses
    #[must_use]
    pub const fn flag(self) -> PteFlags {
        match self {
            Self::Present => PteFlags::P,
            Self::Writable => PteFlags::W,
            Self::User => PteFlags::U,
            Self::Dirty => PteFlags::D,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Saved Register State
// ============================================================================

/// General-purpose registers in `pushal` order
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PushRegs {
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    /// Useless value pushed by `pushal`
    pub oesp: u32,
    pub ebx: u32,
    pub edx: u32,
    pub ecx: u32,
    pub eax: u32,
}

/// Register state captured when the monitor was entered
///
/// The monitor treats this as opaque: it is handed to every command and never
/// modified.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Trapframe {
    pub regs: PushRegs,
    pub es: u16,
    #[allow(clippy::pub_underscore_fields)]
    pub _padding1: u16,
    pub ds: u16,
    #[allow(clippy::pub_underscore_fields)]
    pub _padding2: u16,
    pub trapno: u32,
    /// Error code pushed by the hardware, or zero
    pub err: u32,
    pub eip: u32,
    pub cs: u16,
    #[allow(clippy::pub_underscore_fields)]
    pub _padding3: u16,
    pub eflags: u32,
    /// Only valid when crossing from user to kernel
    pub esp: u32,
    pub ss: u16,
    #[allow(clippy::pub_underscore_fields)]
    pub _padding4: u16,
}
