//! # Symbol Resolution
//!
//! Converts instruction addresses found on the kernel stack into the
//! function, source file and line they belong to. `backtrace` prints one
//! such resolution per frame, as `file:line: function+offset`.
//!
//! ## Sources of Symbol Information
//!
//! - **`stab_table`**: a STABS-style table shipped with the machine snapshot.
//!   Function names are stored as `name:F(type)` strings and sliced to the
//!   name's length on lookup, the way the kernel's own `debuginfo_eip` does.
//! - **`symbolizer`**: the kernel ELF itself. Function names and start
//!   addresses come from the ELF symbol table (demangled for Rust kernels),
//!   file and line from DWARF via `addr2line`.
//!
//! **Libraries used**:
//! - `gimli`: Low-level DWARF parser
//! - `addr2line`: High-level symbolization library built on gimli
//! - `object`: ELF binary parser
//! - `rustc-demangle`: Rust symbol demangling
//!
//! ## Unknown Addresses
//!
//! An address no source knows about is reported with the same defaults the
//! kernel uses: file and function `<unknown>`, line 0, and the function
//! start equal to the address itself (so the printed offset is `+0`).
//!
//! ## Example
//!
//! ```rust,ignore
//! let symbols = StabTable::from_specs(&snapshot.symbols)?;
//! let info = symbols.resolve(eip).unwrap_or_else(|| SymbolInfo::unknown(eip));
//! println!("{}:{}: {}+{}", info.file, info.line, info.function, info.offset(eip));
//! ```

pub mod stab_table;
pub mod symbolizer;

pub use stab_table::StabTable;
pub use symbolizer::DwarfSymbolizer;

use std::borrow::Cow;

/// Placeholder for a file or function that could not be resolved
pub const UNKNOWN: &str = "<unknown>";

/// Where an instruction address comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolInfo<'a> {
    pub file: Cow<'a, str>,
    pub line: u32,
    /// Function name, already cut to its length
    pub function: Cow<'a, str>,
    pub function_start: u32,
}

impl SymbolInfo<'static> {
    /// Defaults reported for an address nothing knows about
    #[must_use]
    pub fn unknown(eip: u32) -> Self {
        SymbolInfo {
            file: Cow::Borrowed(UNKNOWN),
            line: 0,
            function: Cow::Borrowed(UNKNOWN),
            function_start: eip,
        }
    }
}

impl SymbolInfo<'_> {
    /// Byte offset of `eip` from the start of its function
    #[must_use]
    pub fn offset(&self, eip: u32) -> u32 {
        eip.wrapping_sub(self.function_start)
    }
}

/// Resolves instruction addresses to source locations
pub trait Symbolize {
    /// Source location of `eip`, or `None` if it belongs to no known function
    fn resolve(&self, eip: u32) -> Option<SymbolInfo<'_>>;
}

/// Consult the first source, then the second
///
/// Lets an ELF symbolizer be backed by the snapshot's own table.
impl<A: Symbolize, B: Symbolize> Symbolize for (A, B) {
    fn resolve(&self, eip: u32) -> Option<SymbolInfo<'_>> {
        self.0.resolve(eip).or_else(|| self.1.resolve(eip))
    }
}

impl<S: Symbolize + ?Sized> Symbolize for Box<S> {
    fn resolve(&self, eip: u32) -> Option<SymbolInfo<'_>> {
        (**self).resolve(eip)
    }
}
