//! Line input for the monitor loop

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

/// Longest line the console hands to the monitor; the rest is dropped
pub const BUFLEN: usize = 1024;

/// Source of command lines
pub trait LineReader {
    /// Block until a line is available
    ///
    /// Returns `Ok(None)` at end of input. The line excludes its terminator.
    ///
    /// # Errors
    /// Returns an error if the underlying input fails
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>>;
}

/// Interactive console: prints the prompt, then reads one line
pub struct Console<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineReader for Console<R, W> {
    fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.prompt_out, "{prompt}")?;
        self.prompt_out.flush()?;

        let mut raw = Vec::new();
        if self.input.read_until(b'\n', &mut raw)? == 0 {
            return Ok(None);
        }
        while matches!(raw.last(), Some(b'\n' | b'\r')) {
            raw.pop();
        }
        raw.truncate(BUFLEN);
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }
}

/// Fixed list of lines, read without a prompt
///
/// Used for `--command` and for driving the monitor from tests.
#[derive(Debug, Default)]
pub struct Script {
    lines: VecDeque<String>,
}

impl Script {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { lines: lines.into_iter().map(Into::into).collect() }
    }
}

impl LineReader for Script {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        Ok(self.lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_console_prompts_and_strips_terminator() {
        let mut prompts = Vec::new();
        let mut console = Console::new(Cursor::new("help\r\nkerninfo"), &mut prompts);

        assert_eq!(console.read_line("K> ").unwrap().as_deref(), Some("help"));
        assert_eq!(console.read_line("K> ").unwrap().as_deref(), Some("kerninfo"));
        assert_eq!(console.read_line("K> ").unwrap(), None);
        drop(console);
        assert_eq!(String::from_utf8(prompts).unwrap(), "K> K> K> ");
    }

    #[test]
    fn test_console_truncates_long_lines() {
        let long = "x".repeat(BUFLEN + 100);
        let mut console = Console::new(Cursor::new(long), io::sink());
        assert_eq!(console.read_line("").unwrap().map(|l| l.len()), Some(BUFLEN));
    }

    #[test]
    fn test_script_yields_lines_in_order() {
        let mut script = Script::new(["a", "b"]);
        assert_eq!(script.read_line("K> ").unwrap().as_deref(), Some("a"));
        assert_eq!(script.read_line("K> ").unwrap().as_deref(), Some("b"));
        assert_eq!(script.read_line("K> ").unwrap(), None);
    }
}
