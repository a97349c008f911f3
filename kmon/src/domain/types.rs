//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep virtual and physical addresses apart, so a
//! page-table frame base can never be passed where a virtual address is
//! expected.

use kmon_common::KERNBASE;
use std::fmt;

/// Virtual address in the kernel's 32-bit address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtAddr(pub u32);

impl VirtAddr {
    /// Whether this address lies in the direct-mapped kernel region
    #[must_use]
    pub fn is_direct_mapped(self) -> bool {
        self.0 >= KERNBASE
    }

    /// Physical address behind a direct-mapped virtual address
    ///
    /// Returns `None` below `KERNBASE`, where the page tables must be consulted.
    #[must_use]
    pub fn direct_to_phys(self) -> Option<PhysAddr> {
        self.is_direct_mapped().then(|| PhysAddr(self.0 - KERNBASE))
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl From<u32> for VirtAddr {
    fn from(addr: u32) -> Self {
        VirtAddr(addr)
    }
}

/// Physical address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhysAddr(pub u32);

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Parse a hexadecimal address argument
///
/// Accepts an optional `0x`/`0X` prefix followed by hex digits only. The
/// value must fit in 32 bits.
pub fn parse_hex(text: &str) -> Option<u32> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    // from_str_radix would take a leading sign
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
