// SPDX-License-Identifier: MIT
//
// Backend: the device the compositor draws on.
//
// The compositor only needs a handful of primitives: put the cursor
// somewhere, write one styled glyph there (advancing the cursor one
// column), flush, and read keys. `Backend` names exactly that surface so
// the same `Display` can drive a real terminal or an in-memory screen.
//
//   TerminalBackend (terminal.rs): raw-mode tty, ANSI output.
//   MemoryBackend (here):          a grid plus an operation log. Tests
//                                   assert on what was drawn and on how
//                                   many moves/writes it took.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crate::cell::{Cell, Visible, glyph_of};
use crate::input::KeyEvent;
use crate::panel::GridSize;
use crate::style::Style;

// ─── Contract ────────────────────────────────────────────────────────────────

/// Cursor position and visibility as the backend last left them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorState {
    pub x: u16,
    pub y: u16,
    pub visible: bool,
}

/// Character-cell output device with keyboard input.
pub trait Backend {
    /// Position the cursor at a 0-indexed grid coordinate.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be written.
    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()>;

    /// Show or hide the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be written.
    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()>;

    /// Where the cursor is and whether it is shown.
    fn cursor(&self) -> CursorState;

    /// Write `ch` in `style` at the cursor and advance it one column.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be written.
    fn write_cell(&mut self, style: Style, ch: char) -> io::Result<()>;

    /// Push everything written so far to the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be written.
    fn flush(&mut self) -> io::Result<()>;

    /// Block until one key is available.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be read, or
    /// [`io::ErrorKind::UnexpectedEof`] when no more input will come.
    fn read_key(&mut self) -> io::Result<KeyEvent>;

    /// Wait at most `timeout` for a key to become available.
    ///
    /// # Errors
    ///
    /// Returns an error if input cannot be polled.
    fn has_input(&mut self, timeout: Duration) -> io::Result<bool>;

    /// Set the window title.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be written.
    fn set_title(&mut self, title: &str) -> io::Result<()>;

    /// The device's size in cells, if it can be determined.
    fn terminal_size(&self) -> Option<GridSize>;
}

/// A display can drive a backend it only borrows.
impl<B: Backend + ?Sized> Backend for &mut B {
    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        (**self).move_cursor(x, y)
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        (**self).set_cursor_visible(visible)
    }

    fn cursor(&self) -> CursorState {
        (**self).cursor()
    }

    fn write_cell(&mut self, style: Style, ch: char) -> io::Result<()> {
        (**self).write_cell(style, ch)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn read_key(&mut self) -> io::Result<KeyEvent> {
        (**self).read_key()
    }

    fn has_input(&mut self, timeout: Duration) -> io::Result<bool> {
        (**self).has_input(timeout)
    }

    fn set_title(&mut self, title: &str) -> io::Result<()> {
        (**self).set_title(title)
    }

    fn terminal_size(&self) -> Option<GridSize> {
        (**self).terminal_size()
    }
}

// ─── MemoryBackend ───────────────────────────────────────────────────────────

/// One primitive as received by a [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Move { x: u16, y: u16 },
    Write { x: u16, y: u16, style: Style, ch: char },
    CursorVisible(bool),
    Flush,
    Title(String),
    /// A blocking key read, whether or not a key was left.
    ReadKey,
    /// A timed wait for input.
    HasInput,
}

/// In-memory backend: a screen grid, an operation log, and scripted keys.
///
/// Writes past the right or bottom edge are recorded in the log but land
/// nowhere on the screen, like a terminal clipping at its margin.
pub struct MemoryBackend {
    size: GridSize,
    screen: Vec<Visible>,
    cursor: CursorState,
    ops: Vec<Op>,
    keys: VecDeque<KeyEvent>,
    title: Option<String>,
}

impl MemoryBackend {
    /// A blank screen of the given size with the cursor visible at the origin.
    #[must_use]
    pub fn new(size: GridSize) -> Self {
        Self {
            size,
            screen: vec![Cell::TRANSPARENT.visible(); size.area()],
            cursor: CursorState {
                x: 0,
                y: 0,
                visible: true,
            },
            ops: Vec::new(),
            keys: VecDeque::new(),
            title: None,
        }
    }

    /// Queue keys for `read_key` to return, in order.
    #[must_use]
    pub fn with_keys(mut self, keys: impl IntoIterator<Item = KeyEvent>) -> Self {
        self.keys.extend(keys);
        self
    }

    /// Queue one more key.
    pub fn push_key(&mut self, key: KeyEvent) {
        self.keys.push_back(key);
    }

    /// Every primitive received, oldest first.
    #[must_use]
    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Forget the operation log (the screen is kept).
    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Number of `Write` operations in the log.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Write { .. })).count()
    }

    /// Number of `Move` operations in the log.
    #[must_use]
    pub fn moves(&self) -> usize {
        self.ops.iter().filter(|op| matches!(op, Op::Move { .. })).count()
    }

    /// The glyph on screen at `(x, y)`; `None` off screen.
    #[must_use]
    pub fn screen_char(&self, x: u16, y: u16) -> Option<char> {
        self.screen_index(x, y).map(|i| self.screen[i].character())
    }

    /// The style on screen at `(x, y)`; `None` off screen.
    #[must_use]
    pub fn screen_style(&self, x: u16, y: u16) -> Option<Style> {
        self.screen_index(x, y).map(|i| self.screen[i].style)
    }

    /// One screen row as text.
    #[must_use]
    pub fn row_text(&self, y: u16) -> String {
        (0..self.size.width)
            .filter_map(|x| self.screen_char(x, y))
            .collect()
    }

    /// The last title set, if any.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn screen_index(&self, x: u16, y: u16) -> Option<usize> {
        (x < self.size.width && y < self.size.height)
            .then(|| usize::from(y) * usize::from(self.size.width) + usize::from(x))
    }
}

impl Backend for MemoryBackend {
    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        self.cursor.x = x;
        self.cursor.y = y;
        self.ops.push(Op::Move { x, y });
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        self.cursor.visible = visible;
        self.ops.push(Op::CursorVisible(visible));
        Ok(())
    }

    fn cursor(&self) -> CursorState {
        self.cursor
    }

    fn write_cell(&mut self, style: Style, ch: char) -> io::Result<()> {
        let CursorState { x, y, .. } = self.cursor;
        if let Some(i) = self.screen_index(x, y) {
            self.screen[i] = Visible {
                glyph: glyph_of(ch),
                style,
            };
        }
        self.ops.push(Op::Write { x, y, style, ch });
        self.cursor.x = x.saturating_add(1);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ops.push(Op::Flush);
        Ok(())
    }

    fn read_key(&mut self) -> io::Result<KeyEvent> {
        self.ops.push(Op::ReadKey);
        self.keys
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted keys left"))
    }

    fn has_input(&mut self, _timeout: Duration) -> io::Result<bool> {
        self.ops.push(Op::HasInput);
        Ok(!self.keys.is_empty())
    }

    fn set_title(&mut self, title: &str) -> io::Result<()> {
        self.title = Some(title.to_owned());
        self.ops.push(Op::Title(title.to_owned()));
        Ok(())
    }

    fn terminal_size(&self) -> Option<GridSize> {
        Some(self.size)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
