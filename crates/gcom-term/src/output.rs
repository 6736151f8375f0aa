// SPDX-License-Identifier: MIT
//
// Output buffering and stateful style tracking.
//
// Two components keep terminal I/O small:
//
//   OutputBuffer: accumulates ANSI bytes in memory so a whole refresh goes
//   out in one write() syscall at flush time.
//
//   StyleWriter: remembers the last style it emitted and skips the SGR
//   sequence when the next glyph uses the same one. A run of same-coloured
//   text costs one SGR plus its characters.
//
// The last-style memory is dropped on every cursor move and after a reset:
// the backend resets attributes when it repositions, so the next glyph
// always re-selects its style.

use std::io::{self, Write};

use crate::ansi;
use crate::style::Style;

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// Bytes waiting for the next flush.
///
/// A full 80×24 redraw with a colour change on every cell is about 16 KB,
/// so that is what gets reserved up front.
#[derive(Default)]
pub struct OutputBuffer {
    bytes: Vec<u8>,
}

const FRAME_BYTES: usize = 16 * 1024;

impl OutputBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: Vec::with_capacity(FRAME_BYTES),
        }
    }

    /// Pending bytes, oldest first.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Append one glyph, UTF-8 encoded.
    pub fn write_char(&mut self, ch: char) {
        self.bytes
            .extend_from_slice(ch.encode_utf8(&mut [0; 4]).as_bytes());
    }

    /// Hand everything pending to `w` in one write, then flush `w`.
    ///
    /// # Errors
    ///
    /// Returns an error if `w` fails; the bytes stay pending.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        if self.bytes.is_empty() {
            return Ok(());
        }
        w.write_all(&self.bytes)?;
        w.flush()?;
        self.bytes.clear();
        Ok(())
    }
}

impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    /// No-op; see [`flush_to`](OutputBuffer::flush_to).
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ─── StyleWriter ─────────────────────────────────────────────────────────────

/// Glyph writer that only emits SGR when the style actually changes.
pub struct StyleWriter {
    last: Option<Style>,
}

impl StyleWriter {
    /// A writer with no remembered style; the first glyph always emits SGR.
    #[must_use]
    pub const fn new() -> Self {
        Self { last: None }
    }

    /// Forget the remembered style. Call after any cursor move or reset.
    #[inline]
    pub const fn invalidate(&mut self) {
        self.last = None;
    }

    /// The style the terminal is known to be in, if any.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> Option<Style> {
        self.last
    }

    /// Append `ch` drawn in `style`, selecting the style first if needed.
    pub fn write_glyph(&mut self, out: &mut OutputBuffer, style: Style, ch: char) {
        if self.last != Some(style) {
            // Writes into a Vec cannot fail.
            ansi::style(out, style).ok();
            self.last = Some(style);
        }
        out.write_char(ch);
    }
}

impl Default for StyleWriter {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
