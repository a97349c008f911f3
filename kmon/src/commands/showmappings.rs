//! `showmappings`: one table row per page of a virtual range

use super::parse_range;
use crate::domain::{CommandError, VirtAddr};
use crate::monitor::{Context, Flow};
use kmon_common::{page_floor, Trapframe, PGSIZE};

pub const USAGE: &str = "showmappings [hex start virtual address] [hex end virtual address]";

const HEADER: &str = "Virtual/Physical Address|   Permission bits     |\n    \
                      VA     |    PA      |  P |  R/W |  U/S |  D |";

pub fn showmappings(
    args: &[&str],
    ctx: &mut Context<'_>,
    _tf: Option<&Trapframe>,
) -> Result<Flow, CommandError> {
    let (low, high) = parse_range(args, USAGE)?;

    writeln!(ctx.out, "{HEADER}")?;
    // u64 so the last page below 4 GiB does not wrap the cursor
    let mut page = u64::from(page_floor(low));
    while page < u64::from(high) {
        #[allow(clippy::cast_possible_truncation)]
        let va = page as u32;
        match ctx.machine.lookup(VirtAddr(va)) {
            Some(pte) => writeln!(
                ctx.out,
                "{va:>11x}| {:>11x}| {:>2} | {:>4} | {:>4} | {:>2} |",
                pte.frame_base(),
                u8::from(pte.is_present()),
                u8::from(pte.is_writable()),
                u8::from(pte.is_user()),
                u8::from(pte.is_dirty()),
            )?,
            None => writeln!(ctx.out, "{va:>11x}| not mapped")?,
        }
        page += u64::from(PGSIZE);
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::run;
    use crate::machine::SimulatedMachine;
    use kmon_common::{PageTableEntry, PteFlags};

    fn rows(out: &str) -> Vec<&str> {
        out.lines().skip(2).collect()
    }

    #[test]
    fn test_mapped_then_unmapped_page() {
        let mut machine = SimulatedMachine::new(0x10_0000).unwrap();
        machine.map(
            VirtAddr(0xEF00_0000),
            PageTableEntry::new(0x0011_A000, PteFlags::P | PteFlags::W),
        );

        let (out, status) = run(&mut machine, "showmappings ef000000 ef002000");
        assert_eq!(status, 0);
        assert!(out.starts_with(HEADER));
        assert_eq!(
            rows(&out),
            vec!["   ef000000|      11a000|  1 |    1 |    0 |  0 |", "   ef001000| not mapped"]
        );
    }

    #[test]
    fn test_not_present_entry_shows_its_bits() {
        let mut machine = SimulatedMachine::new(0x10_0000).unwrap();
        machine.map(VirtAddr(0x0080_0000), PageTableEntry::new(0x5000, PteFlags::U | PteFlags::D));

        let (out, _) = run(&mut machine, "showmappings 800000 800001");
        assert_eq!(rows(&out), vec!["     800000|        5000|  0 |    0 |    1 |  1 |"]);
    }

    #[test]
    fn test_range_bounds() {
        let mut machine = SimulatedMachine::new(0x10_0000).unwrap();
        machine.install_direct_map();

        // Empty range prints only the header
        let (out, _) = run(&mut machine, "showmappings f0000000 f0000000");
        assert!(rows(&out).is_empty());

        // Unaligned start still reports the page containing it
        let (out, _) = run(&mut machine, "showmappings f0000800 f0001001");
        let rows = rows(&out);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("   f0000000|           0|  1 |    1 |"));
        assert!(rows[1].starts_with("   f0001000|        1000|"));
    }

    #[test]
    fn test_top_of_address_space_terminates() {
        let mut machine = SimulatedMachine::new(0x1000).unwrap();
        let (out, _) = run(&mut machine, "showmappings ffffe000 ffffffff");
        assert_eq!(rows(&out).len(), 2);
    }

    #[test]
    fn test_usage_errors() {
        let mut machine = SimulatedMachine::new(0x1000).unwrap();
        for line in [
            "showmappings",
            "showmappings 1000",
            "showmappings 2000 1000",
            "showmappings zz 1000",
            "showmappings +ef000000 +ef001000",
        ] {
            let (out, status) = run(&mut machine, line);
            assert_eq!(status, 1, "{line}");
            assert!(out.starts_with("Wrong arguments: "), "{line}");
            assert!(out.ends_with(&format!("Usage :\n    {USAGE}\n")), "{line}");
        }
    }
}
