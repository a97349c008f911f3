//! Frame-pointer stack unwinding
//!
//! With frame pointers enabled every i386 function starts with
//! `push %ebp; mov %esp, %ebp`, so the word at `%ebp` is the caller's saved
//! `%ebp` and the word above it is the return address. Arguments pushed by
//! the caller follow. Walking the saved `%ebp` links from the current frame
//! recovers the call chain, up to the outermost frame whose saved `%ebp` is
//! the sentinel.
//!
//! ```text
//!   higher addresses
//!   +-----------------+
//!   | arg 5           |  ebp + 24
//!   | ...             |
//!   | arg 1           |  ebp + 8
//!   | return address  |  ebp + 4
//!   | saved ebp       |  ebp      <- frame pointer
//!   +-----------------+
//! ```

use crate::domain::{Fault, VirtAddr};
use crate::machine::ReadMemory;
use kmon_common::{FRAME_ARG_WORDS, SENTINEL_FRAME_POINTER, WORD_SIZE};
use log::warn;

/// One logical stack frame recovered from the frame-pointer chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackFrame {
    /// `%ebp` of this frame
    pub frame_pointer: u32,
    /// Caller's `%ebp`, stored at `frame_pointer`
    pub saved_frame_pointer: u32,
    /// Where this frame's function returns to
    pub return_address: u32,
    /// The words above the return address
    ///
    /// Always five, whatever the callee's real arity; surplus words are
    /// whatever the caller's frame holds there.
    pub args: [u32; FRAME_ARG_WORDS],
}

/// Iterator over the frames of a frame-pointer chain, innermost first
///
/// Stops after the frame whose saved frame pointer is the sentinel, at the
/// first memory fault (yielded as an error), or after `max_frames` frames.
pub struct FrameWalker<'m, M: ReadMemory + ?Sized> {
    memory: &'m M,
    next: Option<u32>,
    remaining: usize,
    truncated: bool,
}

impl<'m, M: ReadMemory + ?Sized> FrameWalker<'m, M> {
    /// Start walking at `frame_pointer`
    ///
    /// A zero frame pointer means there is no frame at all.
    pub fn new(memory: &'m M, frame_pointer: u32, max_frames: usize) -> Self {
        Self {
            memory,
            next: (frame_pointer != SENTINEL_FRAME_POINTER).then_some(frame_pointer),
            remaining: max_frames,
            truncated: false,
        }
    }

    /// Whether the walk stopped at `max_frames` before reaching the sentinel
    #[must_use]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    fn read_frame(&self, fp: u32) -> Result<StackFrame, Fault> {
        let word = |index: u32| self.memory.read_word(VirtAddr(fp.wrapping_add(index * WORD_SIZE)));

        let saved_frame_pointer = word(0)?;
        let return_address = word(1)?;
        let mut args = [0u32; FRAME_ARG_WORDS];
        for (slot, index) in args.iter_mut().zip(2u32..) {
            *slot = word(index)?;
        }

        Ok(StackFrame { frame_pointer: fp, saved_frame_pointer, return_address, args })
    }
}

impl<M: ReadMemory + ?Sized> Iterator for FrameWalker<'_, M> {
    type Item = Result<StackFrame, Fault>;

    fn next(&mut self) -> Option<Self::Item> {
        let fp = self.next?;

        if self.remaining == 0 {
            warn!("Stopping backtrace at frame pointer {fp:#010x}: frame limit reached");
            self.truncated = true;
            self.next = None;
            return None;
        }
        self.remaining -= 1;

        match self.read_frame(fp) {
            Ok(frame) => {
                self.next = (frame.saved_frame_pointer != SENTINEL_FRAME_POINTER)
                    .then_some(frame.saved_frame_pointer);
                Some(Ok(frame))
            }
            Err(fault) => {
                warn!("Backtrace stopped by memory fault: {fault}");
                self.next = None;
                Some(Err(fault))
            }
        }
    }
}
