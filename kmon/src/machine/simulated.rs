//! Host-side stand-in for a live kernel
//!
//! [`SimulatedMachine`] keeps a flat page table keyed by virtual page number
//! and a sparse physical memory. It behaves like the i386 kernel the monitor
//! was written for: everything at or above `KERNBASE` is a direct map of
//! physical memory, everything below goes through the page table.

use super::snapshot::{KernelLayout, Snapshot};
use super::{AddressTranslator, Machine, PhysicalMemory, ReadMemory};
use crate::domain::{Fault, PhysAddr, SnapshotError, VirtAddr};
use kmon_common::{
    page_offset, PageTableEntry, Permission, PteFlags, Trapframe, KERNBASE, PGSHIFT, PGSIZE,
    WORD_SIZE,
};
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

/// Largest physical memory the direct map can cover
pub const MAX_PHYS_SIZE: u32 = 0u32.wrapping_sub(KERNBASE);

/// In-memory kernel state the monitor can inspect
pub struct SimulatedMachine {
    /// Entries keyed by virtual page number
    page_table: BTreeMap<u32, PageTableEntry>,
    /// Backing frames keyed by physical page number; absent frames read as zero
    frames: HashMap<u32, Box<[u8]>>,
    phys_size: u32,
    frame_pointer: u32,
    trapframe: Option<Trapframe>,
    layout: KernelLayout,
}

impl SimulatedMachine {
    /// Create an empty machine with `phys_size` bytes of zeroed RAM
    ///
    /// # Errors
    /// Returns an error if `phys_size` is not page-aligned or exceeds the direct map
    pub fn new(phys_size: u32) -> Result<Self, SnapshotError> {
        if page_offset(phys_size) != 0 {
            return Err(SnapshotError::invalid("phys_size", "must be a multiple of the page size"));
        }
        if phys_size > MAX_PHYS_SIZE {
            return Err(SnapshotError::invalid(
                "phys_size",
                format!("must not exceed {MAX_PHYS_SIZE:#x}"),
            ));
        }

        Ok(Self {
            page_table: BTreeMap::new(),
            frames: HashMap::new(),
            phys_size,
            frame_pointer: 0,
            trapframe: None,
            layout: KernelLayout::default(),
        })
    }

    /// Build a machine from a parsed snapshot
    ///
    /// # Errors
    /// Returns an error if any field of the snapshot is inconsistent
    pub fn from_snapshot(snapshot: &Snapshot) -> Result<Self, SnapshotError> {
        let mut machine = Self::new(snapshot.phys_size)?;
        machine.frame_pointer = snapshot.frame_pointer;
        machine.trapframe = snapshot.trapframe;
        machine.layout = snapshot.layout;

        if snapshot.direct_map {
            machine.install_direct_map();
        }

        for (i, mapping) in snapshot.mappings.iter().enumerate() {
            let pte = match mapping.pte {
                Some(raw) => PageTableEntry(raw),
                None => {
                    let pa = mapping.pa.ok_or_else(|| {
                        SnapshotError::invalid(format!("mappings[{i}]"), "needs `pa` or `pte`")
                    })?;
                    let flags = parse_perm_letters(&mapping.perm).ok_or_else(|| {
                        SnapshotError::invalid(
                            format!("mappings[{i}].perm"),
                            format!("'{}' is not a set of P/W/U/D letters", mapping.perm),
                        )
                    })?;
                    PageTableEntry::new(pa, flags)
                }
            };
            machine.map(VirtAddr(mapping.va), pte);
        }

        for (i, blob) in snapshot.memory.iter().enumerate() {
            let field = format!("memory[{i}]");
            let base = match (blob.pa, blob.va) {
                (Some(pa), None) => PhysAddr(pa),
                (None, Some(va)) => machine
                    .virt_to_phys(VirtAddr(va))
                    .map_err(|e| SnapshotError::invalid(field.clone(), e.to_string()))?,
                _ => return Err(SnapshotError::invalid(field, "needs exactly one of `pa`, `va`")),
            };
            let bytes: Vec<u8> = blob.words.iter().flat_map(|w| w.to_le_bytes()).collect();
            machine
                .write_phys(base, &bytes)
                .map_err(|e| SnapshotError::invalid(field, e.to_string()))?;
        }

        info!(
            "Loaded snapshot: {} page entries, {} KB physical memory, {} resident frames",
            machine.page_table.len(),
            machine.phys_size / 1024,
            machine.frames.len()
        );
        Ok(machine)
    }

    /// Map every physical page at `KERNBASE + pa`, present and writable
    pub fn install_direct_map(&mut self) {
        for pa in (0..self.phys_size).step_by(PGSIZE as usize) {
            self.map(VirtAddr(KERNBASE + pa), PageTableEntry::new(pa, PteFlags::P | PteFlags::W));
        }
    }

    /// Install (or replace) the entry covering `va`
    pub fn map(&mut self, va: VirtAddr, pte: PageTableEntry) {
        self.page_table.insert(va.0 >> PGSHIFT, pte);
    }

    /// Remove the entry covering `va`
    pub fn unmap(&mut self, va: VirtAddr) -> Option<PageTableEntry> {
        self.page_table.remove(&(va.0 >> PGSHIFT))
    }

    pub fn set_frame_pointer(&mut self, ebp: u32) {
        self.frame_pointer = ebp;
    }

    pub fn set_layout(&mut self, layout: KernelLayout) {
        self.layout = layout;
    }

    pub fn set_trapframe(&mut self, tf: Option<Trapframe>) {
        self.trapframe = tf;
    }

    #[must_use]
    pub fn phys_size(&self) -> u32 {
        self.phys_size
    }

    /// Copy `bytes` into physical memory at `pa`
    ///
    /// # Errors
    /// Returns [`Fault::OutOfRange`] if the range leaves physical memory
    pub fn write_phys(&mut self, pa: PhysAddr, bytes: &[u8]) -> Result<(), Fault> {
        self.check_range(pa, bytes.len())?;
        for (i, byte) in bytes.iter().enumerate() {
            let addr = pa.0 + i as u32;
            let frame = self
                .frames
                .entry(addr >> PGSHIFT)
                .or_insert_with(|| vec![0u8; PGSIZE as usize].into_boxed_slice());
            frame[page_offset(addr) as usize] = *byte;
        }
        Ok(())
    }

    /// Store one little-endian word at a virtual address
    ///
    /// # Errors
    /// Returns a [`Fault`] if the address does not resolve to physical memory
    pub fn write_word(&mut self, va: VirtAddr, word: u32) -> Result<(), Fault> {
        for (i, byte) in word.to_le_bytes().into_iter().enumerate() {
            let pa = self.virt_to_phys(VirtAddr(va.0.wrapping_add(i as u32)))?;
            self.write_phys(pa, &[byte])?;
        }
        Ok(())
    }

    /// Translate a virtual address the way the MMU would
    ///
    /// # Errors
    /// Returns [`Fault::NotMapped`] without an entry and [`Fault::NotPresent`]
    /// when the entry's Present bit is clear
    pub fn virt_to_phys(&self, va: VirtAddr) -> Result<PhysAddr, Fault> {
        if let Some(pa) = va.direct_to_phys() {
            return Ok(pa);
        }
        match self.lookup(va) {
            None => Err(Fault::NotMapped { va }),
            Some(pte) if !pte.is_present() => Err(Fault::NotPresent { va }),
            Some(pte) => Ok(PhysAddr(pte.translate(va.0))),
        }
    }

    fn check_range(&self, pa: PhysAddr, len: usize) -> Result<(), Fault> {
        let end = u64::from(pa.0) + len as u64;
        if end > u64::from(self.phys_size) {
            let first_bad = pa.0.max(self.phys_size);
            return Err(Fault::OutOfRange { pa: PhysAddr(first_bad) });
        }
        Ok(())
    }
}

/// Parse permission letters (`P`, `W`, `U`, `D`) into entry flags
fn parse_perm_letters(letters: &str) -> Option<PteFlags> {
    letters.chars().try_fold(PteFlags::empty(), |flags, c| {
        Permission::from_code(c).map(|perm| flags | perm.flag())
    })
}

impl AddressTranslator for SimulatedMachine {
    fn lookup(&self, va: VirtAddr) -> Option<PageTableEntry> {
        let pte = self.page_table.get(&(va.0 >> PGSHIFT)).copied();
        if pte.is_none() {
            debug!("No page table entry for {va}");
        }
        pte
    }

    fn lookup_mut(&mut self, va: VirtAddr) -> Option<&mut PageTableEntry> {
        self.page_table.get_mut(&(va.0 >> PGSHIFT))
    }
}

impl PhysicalMemory for SimulatedMachine {
    fn read_phys(&self, pa: PhysAddr, buf: &mut [u8]) -> Result<(), Fault> {
        self.check_range(pa, buf.len())?;
        for (i, out) in buf.iter_mut().enumerate() {
            let addr = pa.0 + i as u32;
            *out = self
                .frames
                .get(&(addr >> PGSHIFT))
                .map_or(0, |frame| frame[page_offset(addr) as usize]);
        }
        Ok(())
    }
}

impl ReadMemory for SimulatedMachine {
    fn read_word(&self, va: VirtAddr) -> Result<u32, Fault> {
        if page_offset(va.0) <= PGSIZE - WORD_SIZE {
            let pa = self.virt_to_phys(va)?;
            return self.read_phys_word(pa);
        }

        // The word straddles a page boundary; each half may live in a different frame.
        let mut bytes = [0u8; WORD_SIZE as usize];
        for (i, out) in bytes.iter_mut().enumerate() {
            let addr = VirtAddr(va.0.wrapping_add(i as u32));
            let pa = self.virt_to_phys(addr)?;
            self.read_phys(pa, std::slice::from_mut(out))?;
        }
        Ok(u32::from_le_bytes(bytes))
    }
}

impl Machine for SimulatedMachine {
    fn frame_pointer(&self) -> u32 {
        self.frame_pointer
    }

    fn trapframe(&self) -> Option<&Trapframe> {
        self.trapframe.as_ref()
    }

    fn layout(&self) -> &KernelLayout {
        &self.layout
    }
}

impl std::fmt::Debug for SimulatedMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedMachine")
            .field("entries", &self.page_table.len())
            .field("frames", &self.frames.len())
            .field("phys_size", &format_args!("{:#x}", self.phys_size))
            .field("frame_pointer", &format_args!("{:#010x}", self.frame_pointer))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_machine() -> SimulatedMachine {
        SimulatedMachine::new(0x10_0000).unwrap()
    }

    #[test]
    fn test_rejects_unaligned_phys_size() {
        assert!(SimulatedMachine::new(0x1234).is_err());
        assert!(SimulatedMachine::new(MAX_PHYS_SIZE).is_ok());
    }

    #[test]
    fn test_direct_map_reads() {
        let mut m = small_machine();
        m.write_phys(PhysAddr(0x2000), &0xDEAD_BEEFu32.to_le_bytes()).unwrap();
        assert_eq!(m.read_word(VirtAddr(KERNBASE + 0x2000)), Ok(0xDEAD_BEEF));
        // Never-written RAM reads as zero
        assert_eq!(m.read_word(VirtAddr(KERNBASE + 0x3000)), Ok(0));
    }

    #[test]
    fn test_reads_beyond_physical_memory_fault() {
        let m = small_machine();
        assert_eq!(
            m.read_word(VirtAddr(KERNBASE + 0x10_0000)),
            Err(Fault::OutOfRange { pa: PhysAddr(0x10_0000) })
        );
    }

    #[test]
    fn test_translated_reads() {
        let mut m = small_machine();
        m.map(VirtAddr(0x0080_0000), PageTableEntry::new(0x5000, PteFlags::P | PteFlags::U));
        m.write_phys(PhysAddr(0x5010), &7u32.to_le_bytes()).unwrap();

        assert_eq!(m.read_word(VirtAddr(0x0080_0010)), Ok(7));
        assert_eq!(
            m.read_word(VirtAddr(0x0080_1000)),
            Err(Fault::NotMapped { va: VirtAddr(0x0080_1000) })
        );

        m.map(VirtAddr(0x0080_1000), PageTableEntry::new(0x6000, PteFlags::U));
        assert_eq!(
            m.read_word(VirtAddr(0x0080_1000)),
            Err(Fault::NotPresent { va: VirtAddr(0x0080_1000) })
        );
    }

    #[test]
    fn test_word_straddling_discontiguous_pages() {
        let mut m = small_machine();
        m.map(VirtAddr(0x1000), PageTableEntry::new(0x9000, PteFlags::P));
        m.map(VirtAddr(0x2000), PageTableEntry::new(0x4000, PteFlags::P));
        m.write_phys(PhysAddr(0x9FFE), &[0x11, 0x22]).unwrap();
        m.write_phys(PhysAddr(0x4000), &[0x33, 0x44]).unwrap();

        assert_eq!(m.read_word(VirtAddr(0x1FFE)), Ok(0x4433_2211));
    }

    #[test]
    fn test_lookup_never_allocates() {
        let mut m = small_machine();
        assert!(m.lookup(VirtAddr(0x1234_5000)).is_none());
        assert!(m.lookup_mut(VirtAddr(0x1234_5000)).is_none());
        assert!(m.lookup(VirtAddr(0x1234_5000)).is_none());
    }

    #[test]
    fn test_from_snapshot() {
        let snap = Snapshot::from_json(
            r#"{
                "frame_pointer": "0xf010ff78",
                "phys_size": "0x200000",
                "mappings": [
                    { "va": "0xef000000", "pa": "0x11a000", "perm": "PU" },
                    { "va": "0xef001000", "pte": "0x11b067" }
                ],
                "memory": [
                    { "va": "0xf010ff78", "words": ["0xf010ffb8", "0xf0100069"] },
                    { "pa": "0x11a000", "words": [42] }
                ]
            }"#,
        )
        .unwrap();
        let m = SimulatedMachine::from_snapshot(&snap).unwrap();

        assert_eq!(m.frame_pointer(), 0xF010_FF78);
        assert_eq!(m.read_word(VirtAddr(0xF010_FF78)), Ok(0xF010_FFB8));
        assert_eq!(m.read_word(VirtAddr(0xF010_FF7C)), Ok(0xF010_0069));
        assert_eq!(m.read_word(VirtAddr(0xEF00_0000)), Ok(42));

        let pte = m.lookup(VirtAddr(0xEF00_1000)).unwrap();
        assert_eq!(pte.bits(), 0x0011_B067);

        // Direct map covers the whole physical range
        let kern = m.lookup(VirtAddr(KERNBASE + 0x1F_F000)).unwrap();
        assert_eq!(kern.frame_base(), 0x1F_F000);
        assert!(m.lookup(VirtAddr(KERNBASE + 0x20_0000)).is_none());
    }

    #[test]
    fn test_from_snapshot_rejects_bad_perm() {
        let snap = Snapshot::from_json(
            r#"{ "frame_pointer": 0, "mappings": [ { "va": 0, "pa": 0, "perm": "PX" } ] }"#,
        )
        .unwrap();
        let err = SimulatedMachine::from_snapshot(&snap).unwrap_err();
        assert!(err.to_string().contains("mappings[0].perm"));
    }

    #[test]
    fn test_from_snapshot_rejects_blob_outside_memory() {
        let snap = Snapshot::from_json(
            r#"{ "frame_pointer": 0, "phys_size": "0x1000",
                 "memory": [ { "pa": "0xffe", "words": [1] } ] }"#,
        )
        .unwrap();
        let err = SimulatedMachine::from_snapshot(&snap).unwrap_err();
        assert!(err.to_string().contains("memory[0]"));
    }
}
