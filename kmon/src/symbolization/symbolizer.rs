use super::{SymbolInfo, Symbolize};
use crate::machine::KernelLayout;
use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianRcSlice, RunTimeEndian};
use log::info;
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};
use rustc_demangle::demangle;
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// A text symbol of the kernel image
#[derive(Debug, Clone)]
struct TextSymbol {
    address: u32,
    size: u32,
    name: String,
}

/// Resolved source position, cached per address
#[derive(Debug, Clone)]
struct SourceLine {
    file: String,
    line: u32,
}

/// Symbolizer backed by the kernel ELF's symbol table and DWARF line info
///
/// Function names and start addresses come from the ELF symbol table;
/// file and line come from DWARF. Line lookups are cached, since a
/// backtrace tends to revisit the same return addresses.
pub struct DwarfSymbolizer {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    /// Text symbols sorted by address
    functions: Vec<TextSymbol>,
    layout: Option<KernelLayout>,
    cache: RefCell<HashMap<u32, Option<SourceLine>>>,
}

impl DwarfSymbolizer {
    /// Create a new symbolizer for the given kernel image
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a usable image
    pub fn new<P: AsRef<Path>>(kernel_path: P) -> Result<Self> {
        let binary_data = fs::read(kernel_path.as_ref()).context("Failed to read kernel image")?;
        Self::from_image(&binary_data)
    }

    /// Create a symbolizer from kernel image bytes already in memory
    ///
    /// # Errors
    /// Returns an error if the bytes cannot be parsed, or if DWARF debug info is missing
    pub fn from_image(binary_data: &[u8]) -> Result<Self> {
        let obj_file = object::File::parse(binary_data).context("Failed to parse kernel image")?;

        // Load DWARF debug info
        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        let ctx = Context::from_dwarf(dwarf).context("Failed to load DWARF debug information")?;

        let mut functions: Vec<TextSymbol> = obj_file
            .symbols()
            .filter(|sym| sym.kind() == SymbolKind::Text)
            .filter_map(|sym| {
                let address = u32::try_from(sym.address()).ok()?;
                let size = u32::try_from(sym.size()).unwrap_or(0);
                let name = Self::demangle_symbol(sym.name().ok()?);
                (!name.is_empty()).then_some(TextSymbol { address, size, name })
            })
            .collect();
        functions.sort_by_key(|f| f.address);

        let symbol_addr = |wanted: &str| -> Option<u32> {
            obj_file
                .symbols()
                .find(|sym| sym.name().is_ok_and(|name| name == wanted))
                .and_then(|sym| u32::try_from(sym.address()).ok())
        };
        let layout = match (
            symbol_addr("_start"),
            symbol_addr("etext"),
            symbol_addr("edata"),
            symbol_addr("end"),
        ) {
            (Some(start), Some(etext), Some(edata), Some(end)) => {
                Some(KernelLayout { start, etext, edata, end })
            }
            _ => None,
        };

        info!(
            "Loaded {} text symbols (layout symbols {})",
            functions.len(),
            if layout.is_some() { "found" } else { "missing" }
        );

        Ok(Self { ctx, functions, layout, cache: RefCell::new(HashMap::new()) })
    }

    /// Image boundaries from the `_start`/`etext`/`edata`/`end` symbols
    #[must_use]
    pub fn kernel_layout(&self) -> Option<KernelLayout> {
        self.layout
    }

    /// Demangle a Rust symbol name
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        format!("{:#}", demangle(symbol))
    }

    fn function_for(&self, eip: u32) -> Option<&TextSymbol> {
        let idx = self.functions.partition_point(|f| f.address <= eip);
        let sym = self.functions.get(idx.checked_sub(1)?)?;
        // Assembly labels often carry no size; attribute to the nearest one below.
        if sym.size != 0 && eip - sym.address >= sym.size {
            return None;
        }
        Some(sym)
    }

    fn source_line(&self, eip: u32) -> Option<SourceLine> {
        if let Some(cached) = self.cache.borrow().get(&eip) {
            return cached.clone();
        }

        let resolved = self.ctx.find_location(u64::from(eip)).ok().flatten().and_then(|loc| {
            Some(SourceLine { file: loc.file?.to_string(), line: loc.line.unwrap_or(0) })
        });

        self.cache.borrow_mut().insert(eip, resolved.clone());
        resolved
    }
}

impl Symbolize for DwarfSymbolizer {
    fn resolve(&self, eip: u32) -> Option<SymbolInfo<'_>> {
        let function = self.function_for(eip);
        let source = self.source_line(eip);
        if function.is_none() && source.is_none() {
            return None;
        }

        let (file, line) = source.map_or((Cow::Borrowed(super::UNKNOWN), 0), |s| {
            (Cow::Owned(s.file), s.line)
        });
        let (name, start) =
            function.map_or((super::UNKNOWN, eip), |f| (f.name.as_str(), f.address));

        Some(SymbolInfo { file, line, function: Cow::Borrowed(name), function_start: start })
    }
}

impl std::fmt::Debug for DwarfSymbolizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DwarfSymbolizer")
            .field("functions", &self.functions.len())
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}
