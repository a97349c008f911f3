//! Symbol table in the STABS style the kernel's own debug info uses
//!
//! Each function is recorded with its STABS string (`name:F(type)`), the
//! source file it came from, its address range and a list of line records.
//! The function name is the prefix of the STABS string up to the first `:`;
//! the rest of the string is never copied, only sliced away.

use super::{SymbolInfo, Symbolize};
use crate::domain::SnapshotError;
use crate::machine::snapshot::SymbolSpec;
use std::borrow::Cow;

#[derive(Debug, Clone)]
struct StabFunction {
    stab: String,
    /// Length of the function name within `stab`
    name_len: usize,
    file: String,
    start: u32,
    end: u32,
    /// `(address, line)` sorted by address
    lines: Vec<(u32, u32)>,
}

impl StabFunction {
    fn name(&self) -> &str {
        &self.stab[..self.name_len]
    }

    /// Line of the last line record at or before `eip`
    fn line_for(&self, eip: u32) -> u32 {
        let idx = self.lines.partition_point(|&(addr, _)| addr <= eip);
        if idx == 0 {
            0
        } else {
            self.lines[idx - 1].1
        }
    }
}

/// Function table sorted by start address
#[derive(Debug, Clone, Default)]
pub struct StabTable {
    functions: Vec<StabFunction>,
}

impl StabTable {
    /// Build the table from snapshot symbol entries
    ///
    /// # Errors
    /// Returns an error if an entry has an empty name, an inverted range, or
    /// overlaps another function
    pub fn from_specs(specs: &[SymbolSpec]) -> Result<Self, SnapshotError> {
        let mut functions = Vec::with_capacity(specs.len());

        for (i, spec) in specs.iter().enumerate() {
            let name_len = spec.stab.find(':').unwrap_or(spec.stab.len());
            if name_len == 0 {
                return Err(SnapshotError::invalid(format!("symbols[{i}].stab"), "empty name"));
            }
            if spec.end < spec.start {
                return Err(SnapshotError::invalid(
                    format!("symbols[{i}]"),
                    format!("end {:#x} is below start {:#x}", spec.end, spec.start),
                ));
            }

            let mut lines: Vec<(u32, u32)> = spec.lines.iter().map(|(a, l)| (a.0, *l)).collect();
            lines.sort_unstable_by_key(|&(addr, _)| addr);

            functions.push(StabFunction {
                stab: spec.stab.clone(),
                name_len,
                file: spec.file.clone(),
                start: spec.start,
                end: spec.end,
                lines,
            });
        }

        functions.sort_unstable_by_key(|f| f.start);
        if let Some(pair) = functions.windows(2).find(|w| w[0].end > w[1].start) {
            return Err(SnapshotError::invalid(
                "symbols",
                format!("'{}' overlaps '{}'", pair[0].name(), pair[1].name()),
            ));
        }

        Ok(Self { functions })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Symbolize for StabTable {
    fn resolve(&self, eip: u32) -> Option<SymbolInfo<'_>> {
        let idx = self.functions.partition_point(|f| f.start <= eip);
        let func = self.functions.get(idx.checked_sub(1)?)?;
        if eip >= func.end {
            return None;
        }

        Some(SymbolInfo {
            file: Cow::Borrowed(&func.file),
            line: func.line_for(eip),
            function: Cow::Borrowed(func.name()),
            function_start: func.start,
        })
    }
}
