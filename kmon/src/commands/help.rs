use crate::domain::CommandError;
use crate::monitor::{Context, Flow};
use kmon_common::Trapframe;

/// `help`: list every command with its description, in registration order
pub fn help(
    _args: &[&str],
    ctx: &mut Context<'_>,
    _tf: Option<&Trapframe>,
) -> Result<Flow, CommandError> {
    for cmd in ctx.registry.commands() {
        writeln!(ctx.out, "{} - {}", cmd.name, cmd.desc)?;
    }
    Ok(Flow::Continue)
}
