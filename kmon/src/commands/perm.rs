//! `pmsetperm` / `pmclearperm`: flip one permission bit of a kernel mapping
//!
//! Only addresses at or above `ULIM` may be edited. The targeted bit is
//! cleared first and then, when setting, put back; every other bit of the
//! entry, including the frame base and the software bits, is left alone.

use crate::domain::{parse_hex, CommandError, VirtAddr};
use crate::machine::AddressTranslator;
use crate::monitor::{Context, Flow};
use kmon_common::{PageTableEntry, Permission, Trapframe, ULIM};
use log::info;

pub const SET_USAGE: &str = "pmsetperm [hex virtual address] [P|W|D|U]";
pub const CLEAR_USAGE: &str = "pmclearperm [hex virtual address] [P|W|D|U]";

pub fn pmsetperm(
    args: &[&str],
    ctx: &mut Context<'_>,
    _tf: Option<&Trapframe>,
) -> Result<Flow, CommandError> {
    edit_from_args(args, ctx, true, SET_USAGE)
}

pub fn pmclearperm(
    args: &[&str],
    ctx: &mut Context<'_>,
    _tf: Option<&Trapframe>,
) -> Result<Flow, CommandError> {
    edit_from_args(args, ctx, false, CLEAR_USAGE)
}

fn edit_from_args(
    args: &[&str],
    ctx: &mut Context<'_>,
    set: bool,
    usage: &'static str,
) -> Result<Flow, CommandError> {
    let [_, addr, code] = args else {
        return Err(CommandError::usage(
            usage,
            format!("expected 2 arguments, got {}", args.len().saturating_sub(1)),
        ));
    };
    let va = parse_hex(addr).ok_or_else(|| {
        CommandError::usage(usage, format!("'{addr}' is not a 32-bit hex address"))
    })?;

    let mut chars = code.chars();
    let perm = match (chars.next().and_then(Permission::from_code), chars.next()) {
        (Some(perm), None) => perm,
        _ => {
            return Err(CommandError::usage(usage, format!("'{code}' is not one of P, W, D, U")))
        }
    };

    let (before, after) = edit_permission(&mut *ctx.machine, VirtAddr(va), perm, set)
        .map_err(|err| match err {
            CommandError::NotMapped(va) => {
                CommandError::usage(usage, format!("{va} is not mapped"))
            }
            other => other,
        })?;
    info!("{}: {} {before:?} -> {after:?}", args[0], VirtAddr(va));
    Ok(Flow::Continue)
}

/// Set or clear one permission bit of the entry covering `va`
///
/// Returns the entry before and after the edit.
///
/// # Errors
/// Fails if `va` is below `ULIM` or has no page-table entry
pub fn edit_permission<T: AddressTranslator + ?Sized>(
    translator: &mut T,
    va: VirtAddr,
    perm: Permission,
    set: bool,
) -> Result<(PageTableEntry, PageTableEntry), CommandError> {
    if va.0 < ULIM {
        return Err(CommandError::usage(
            if set { SET_USAGE } else { CLEAR_USAGE },
            format!("{va} is not a kernel-only address"),
        ));
    }
    let pte = translator.lookup_mut(va).ok_or(CommandError::NotMapped(va))?;
    let before = *pte;
    pte.apply(perm, set);
    Ok((before, *pte))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::run;
    use crate::machine::SimulatedMachine;
    use kmon_common::{PteFlags, KERNBASE};

    const VA: VirtAddr = VirtAddr(0xEFFF_8000);

    fn machine_with(pte: u32) -> SimulatedMachine {
        let mut machine = SimulatedMachine::new(0x10_0000).unwrap();
        machine.map(VA, PageTableEntry(pte));
        machine
    }

    #[test]
    fn test_set_then_clear_restores_entry() {
        // Frame base plus software bits 9-11, every permission bit clear
        let original = 0x0011_AE00;
        for perm in Permission::ALL {
            let mut machine = machine_with(original);
            let (_, after) = edit_permission(&mut machine, VA, perm, true).unwrap();
            assert!(after.has(perm));
            assert_eq!(after.bits(), original | perm.flag().bits());

            edit_permission(&mut machine, VA, perm, false).unwrap();
            assert_eq!(machine.lookup(VA).unwrap().bits(), original, "{perm}");
        }
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut machine = machine_with(0x0011_A005);
        let (_, once) = edit_permission(&mut machine, VA, Permission::Writable, false).unwrap();
        let (_, twice) = edit_permission(&mut machine, VA, Permission::Writable, false).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.bits(), 0x0011_A005);
    }

    #[test]
    fn test_commands_edit_entry() {
        let mut machine = machine_with(0x0011_A001);

        let (out, status) = run(&mut machine, "pmsetperm efff8000 W");
        assert_eq!((out.as_str(), status), ("", 0));
        assert_eq!(machine.lookup(VA).unwrap().flags(), PteFlags::P | PteFlags::W);

        let (out, status) = run(&mut machine, "pmclearperm 0xefff8abc P");
        assert_eq!((out.as_str(), status), ("", 0));
        assert_eq!(machine.lookup(VA).unwrap().bits(), 0x0011_A002);
    }

    #[test]
    fn test_rejects_bad_arguments_without_change() {
        let mut machine = machine_with(0x0011_A001);
        machine.map(VirtAddr(0x0080_0000), PageTableEntry(0x5007));
        // Mapped, but user-visible (UPAGES sits just below ULIM)
        machine.map(VirtAddr(0xEF00_0000), PageTableEntry(0x0011_B005));

        for line in [
            "pmsetperm efff8000",
            "pmsetperm efff8000 W extra",
            "pmsetperm efff8000 X",
            "pmsetperm efff8000 w",
            "pmsetperm efff8000 WU",
            "pmsetperm nothex W",
            "pmsetperm +efff8000 W",
            "pmsetperm 800000 W",
            "pmsetperm ef000000 W",
            "pmsetperm ef7ff000 W",
        ] {
            let (out, status) = run(&mut machine, line);
            assert_eq!(status, 1, "{line}");
            assert!(out.ends_with(&format!("Usage :\n    {SET_USAGE}\n")), "{line}: {out}");
        }
        assert_eq!(machine.lookup(VA).unwrap().bits(), 0x0011_A001);
        assert_eq!(machine.lookup(VirtAddr(0x0080_0000)).unwrap().bits(), 0x5007);
        assert_eq!(machine.lookup(VirtAddr(0xEF00_0000)).unwrap().bits(), 0x0011_B005);
    }

    #[test]
    fn test_lowest_kernel_only_page_is_editable() {
        let mut machine = machine_with(0x0011_A001);
        machine.map(VirtAddr(ULIM), PageTableEntry(0x0011_C001));

        let (out, status) = run(&mut machine, "pmsetperm ef800000 D");
        assert_eq!((out.as_str(), status), ("", 0));
        assert!(machine.lookup(VirtAddr(ULIM)).unwrap().is_dirty());

        let err =
            edit_permission(&mut machine, VirtAddr(ULIM - 1), Permission::Dirty, true).unwrap_err();
        assert!(matches!(err, CommandError::Usage { usage: SET_USAGE, .. }));
    }

    #[test]
    fn test_unmapped_address_is_reported() {
        let mut machine = machine_with(0x0011_A001);
        let (out, status) = run(&mut machine, "pmclearperm f0000000 P");
        assert_eq!(status, 1);
        assert_eq!(
            out,
            format!(
                "Wrong arguments: {} is not mapped\nUsage :\n    {CLEAR_USAGE}\n",
                VirtAddr(KERNBASE)
            )
        );
        assert!(machine.lookup(VirtAddr(KERNBASE)).is_none());
    }
}
