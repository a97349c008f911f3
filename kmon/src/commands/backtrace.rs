//! `backtrace`: walk the frame-pointer chain from the monitor's own frame

use crate::domain::CommandError;
use crate::monitor::{Context, Flow};
use crate::symbolization::SymbolInfo;
use crate::unwind::FrameWalker;
use kmon_common::Trapframe;

pub fn backtrace(
    _args: &[&str],
    ctx: &mut Context<'_>,
    _tf: Option<&Trapframe>,
) -> Result<Flow, CommandError> {
    writeln!(ctx.out, "Stack backtrace:")?;

    let mut walker = FrameWalker::new(&*ctx.machine, ctx.machine.frame_pointer(), ctx.max_frames);
    for frame in walker.by_ref() {
        let frame = frame?;
        let eip = frame.return_address;
        let args = frame.args.map(|word| format!("{word:08x}")).join(" ");
        writeln!(ctx.out, "  ebp {:x} eip {eip:x} args {args}", frame.frame_pointer)?;

        let info = ctx.symbols.resolve(eip).unwrap_or_else(|| SymbolInfo::unknown(eip));
        writeln!(
            ctx.out,
            "        {}:{}: {}+{}",
            info.file,
            info.line,
            info.function,
            info.offset(eip)
        )?;
    }

    if walker.truncated() {
        writeln!(ctx.out, "  ... stopped after {} frames", ctx.max_frames)?;
    }
    Ok(Flow::Continue)
}
