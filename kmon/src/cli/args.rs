//! CLI argument definitions

use crate::monitor::DEFAULT_MAX_FRAMES;
use clap::builder::RangedU64ValueParser;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kmon",
    about = "Interactive kernel debug monitor over a machine snapshot",
    after_help = "\
EXAMPLES:
    kmon snapshot.json                              Interactive session
    kmon snapshot.json --kernel obj/kern/kernel     Symbolize from the kernel ELF
    kmon snapshot.json -c kerninfo -c backtrace     Run commands and exit"
)]
pub struct Args {
    /// Machine snapshot (JSON) to inspect
    #[arg(value_name = "SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Kernel ELF with debug info, for symbols and image layout
    #[arg(short, long, value_name = "PATH")]
    pub kernel: Option<PathBuf>,

    /// Stop a backtrace after N frames
    #[arg(
        long,
        value_name = "N",
        default_value_t = DEFAULT_MAX_FRAMES,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_frames: usize,

    /// Run this command instead of reading stdin (repeatable)
    #[arg(short = 'c', long = "command", value_name = "CMD")]
    pub commands: Vec<String>,

    /// Do not print the welcome banner
    #[arg(short, long)]
    pub quiet: bool,
}
