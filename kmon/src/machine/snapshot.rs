//! Machine snapshot file format
//!
//! A snapshot captures the kernel state the monitor inspects: the page
//! mappings, the contents of interesting physical memory, the frame pointer
//! at entry, the kernel image layout and a STABS-style symbol table. Numbers
//! may be written as JSON integers or as `"0x…"` strings.

use crate::domain::{parse_hex, SnapshotError};
use kmon_common::Trapframe;
use serde::{Deserialize, Deserializer};
use std::fs;
use std::path::Path;

/// Default physical memory size (16 MiB, what QEMU gives a small kernel)
pub const DEFAULT_PHYS_SIZE: u32 = 0x0100_0000;

/// A 32-bit value written either as a JSON integer or a hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawNumber")]
pub struct Hex32(pub u32);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(u64),
    Text(String),
}

impl TryFrom<RawNumber> for Hex32 {
    type Error = String;

    fn try_from(raw: RawNumber) -> Result<Self, Self::Error> {
        match raw {
            RawNumber::Int(n) => {
                u32::try_from(n).map(Hex32).map_err(|_| format!("{n} does not fit in 32 bits"))
            }
            RawNumber::Text(s) => {
                parse_hex(&s).map(Hex32).ok_or_else(|| format!("'{s}' is not a 32-bit hex value"))
            }
        }
    }
}

fn de_hex<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Hex32::deserialize(deserializer).map(|h| h.0)
}

fn de_hex_opt<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Option::<Hex32>::deserialize(deserializer).map(|h| h.map(|h| h.0))
}

fn de_hex_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u32>, D::Error> {
    Vec::<Hex32>::deserialize(deserializer).map(|v| v.into_iter().map(|h| h.0).collect())
}

fn default_phys_size() -> u32 {
    DEFAULT_PHYS_SIZE
}

fn default_true() -> bool {
    true
}

/// Link-time boundary symbols of the kernel image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct KernelLayout {
    #[serde(deserialize_with = "de_hex")]
    pub start: u32,
    #[serde(deserialize_with = "de_hex")]
    pub etext: u32,
    #[serde(deserialize_with = "de_hex")]
    pub edata: u32,
    #[serde(deserialize_with = "de_hex")]
    pub end: u32,
}

impl KernelLayout {
    /// Memory footprint of the image in KiB, rounded up
    #[must_use]
    pub fn footprint_kb(&self) -> u32 {
        self.end.wrapping_sub(self.start).div_ceil(1024)
    }
}

/// One page mapping installed below (or overriding) the direct map
#[derive(Debug, Clone, Deserialize)]
pub struct MappingSpec {
    #[serde(deserialize_with = "de_hex")]
    pub va: u32,
    #[serde(default, deserialize_with = "de_hex_opt")]
    pub pa: Option<u32>,
    /// Permission letters, e.g. `"PWU"`
    #[serde(default)]
    pub perm: String,
    /// Raw entry value; wins over `pa` and `perm`
    #[serde(default, deserialize_with = "de_hex_opt")]
    pub pte: Option<u32>,
}

/// Words to place in memory, addressed physically or through a mapping
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryBlob {
    #[serde(default, deserialize_with = "de_hex_opt")]
    pub pa: Option<u32>,
    #[serde(default, deserialize_with = "de_hex_opt")]
    pub va: Option<u32>,
    #[serde(deserialize_with = "de_hex_vec")]
    pub words: Vec<u32>,
}

/// One function entry of the symbol table
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolSpec {
    /// STABS function string, e.g. `"monitor:F(0,25)"`
    pub stab: String,
    pub file: String,
    #[serde(deserialize_with = "de_hex")]
    pub start: u32,
    #[serde(deserialize_with = "de_hex")]
    pub end: u32,
    /// `(address, line)` pairs
    #[serde(default)]
    pub lines: Vec<(Hex32, u32)>,
}

/// Complete machine snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct Snapshot {
    #[serde(deserialize_with = "de_hex")]
    pub frame_pointer: u32,
    #[serde(default = "default_phys_size", deserialize_with = "de_hex")]
    pub phys_size: u32,
    #[serde(default = "default_true")]
    pub direct_map: bool,
    #[serde(default)]
    pub layout: KernelLayout,
    #[serde(default)]
    pub mappings: Vec<MappingSpec>,
    #[serde(default)]
    pub memory: Vec<MemoryBlob>,
    #[serde(default)]
    pub symbols: Vec<SymbolSpec>,
    #[serde(default)]
    pub trapframe: Option<Trapframe>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid snapshot
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SnapshotError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// Parse a snapshot from JSON text
    ///
    /// # Errors
    /// Returns an error if the text is not a valid snapshot
    pub fn from_json(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }
}
