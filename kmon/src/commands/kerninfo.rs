use crate::domain::CommandError;
use crate::monitor::{Context, Flow};
use kmon_common::{Trapframe, KERNBASE};

/// `kerninfo`: print the image boundary symbols and the image footprint
pub fn kerninfo(
    _args: &[&str],
    ctx: &mut Context<'_>,
    _tf: Option<&Trapframe>,
) -> Result<Flow, CommandError> {
    let layout = ctx.layout;
    writeln!(ctx.out, "Special kernel symbols:")?;
    for (name, virt) in [
        ("_start", layout.start),
        ("etext", layout.etext),
        ("edata", layout.edata),
        ("end", layout.end),
    ] {
        let phys = virt.wrapping_sub(KERNBASE);
        writeln!(ctx.out, "  {name:<6} {virt:08x} (virt)  {phys:08x} (phys)")?;
    }
    writeln!(ctx.out, "Kernel executable memory footprint: {}KB", layout.footprint_kb())?;
    Ok(Flow::Continue)
}
