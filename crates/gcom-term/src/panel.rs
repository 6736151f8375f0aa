// SPDX-License-Identifier: MIT
//
// Panel: an independently drawable, composited screen region.
//
// A panel has an origin and a declared size on the global grid. Callers
// draw in local coordinates; the panel adds its origin and clips to its
// declared rectangle. Writes outside that rectangle are silently dropped,
// which lets code write at a fixed column into panels of different widths.
//
// Storage:
//
//   The cell array covers the whole global grid, not just w×h. Local to
//   global translation is then a plain offset add, and the compositor can
//   read any panel at any screen coordinate without bounds gymnastics.
//   Cells outside the declared rectangle are transparent forever; nothing
//   can write them.
//
//   Flat `Vec<Cell>`, row-major, like every frame buffer: the compositor
//   sweeps rows left to right, so a row is a contiguous slice.
//
// Panels start fully transparent. `centered` is the one exception: modal
// popups want an opaque blank background before anything is drawn on them.

use std::fmt;

use crate::cell::{Cell, glyph_of};
use crate::markup::{self, MarkupError};
use crate::style::Style;

// ─── Geometry ────────────────────────────────────────────────────────────────

/// Dimensions of the character grid shared by the display and all panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridSize {
    /// Columns.
    pub width: u16,
    /// Rows.
    pub height: u16,
}

impl GridSize {
    /// The classic 80×24 terminal.
    pub const DEFAULT: Self = Self::new(80, 24);

    #[inline]
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    /// Total number of cells.
    #[inline]
    #[must_use]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether a signed point lies on the grid.
    #[inline]
    #[must_use]
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < i32::from(self.width) && y < i32::from(self.height)
    }

    /// Whether `other` fits inside this grid.
    #[inline]
    #[must_use]
    pub const fn fits(self, other: Self) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A rectangle on the global grid.
///
/// The origin is signed: a panel may be placed partly off-grid and
/// simply loses the part that doesn't fit.
///
/// ```
/// use gcom_term::panel::Rect;
///
/// let r = Rect::new(10, 5, 20, 3);
/// assert!(r.contains(10, 5));
/// assert!(r.contains(29, 7));
/// assert!(!r.contains(30, 5));
/// assert!(!r.contains(10, 8));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn right(self) -> i32 {
        self.x + self.width as i32
    }

    /// Bottom edge (exclusive).
    #[inline]
    #[must_use]
    pub const fn bottom(self) -> i32 {
        self.y + self.height as i32
    }

    /// Whether a global point is inside.
    #[inline]
    #[must_use]
    pub const fn contains(self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

// ─── Border glyphs ───────────────────────────────────────────────────────────

const TOP_LEFT: char = '┌';
const TOP_RIGHT: char = '┐';
const BOTTOM_LEFT: char = '└';
const BOTTOM_RIGHT: char = '┘';
const HORIZONTAL: char = '─';
const VERTICAL: char = '│';

// ─── Panel ───────────────────────────────────────────────────────────────────

/// A rectangular drawing surface with a transparency mask.
///
/// # Example
///
/// ```
/// use gcom_term::panel::{GridSize, Panel};
/// use gcom_term::style::Style;
///
/// let mut p = Panel::new(GridSize::DEFAULT, 60, 0, 20, 24);
/// p.puts(1, 1, Style::DEFAULT, "Goblin-COM");
/// assert_eq!(p.getc(1, 1), Some('G'));
/// assert_eq!(p.getc(0, 0), None); // never drawn: transparent
/// assert_eq!(p.getc(25, 1), None); // outside the panel
/// ```
#[derive(Clone)]
pub struct Panel {
    rect: Rect,
    grid: GridSize,
    cells: Vec<Cell>,
}

impl Panel {
    // ─── Construction ────────────────────────────────────────────────────

    /// A fully transparent panel at `(x, y)` with declared size `w × h`.
    ///
    /// # Panics
    ///
    /// Panics if `w` or `h` exceeds the grid.
    #[must_use]
    pub fn new(grid: GridSize, x: i32, y: i32, w: u16, h: u16) -> Self {
        assert!(
            grid.fits(GridSize::new(w, h)),
            "panel {w}x{h} does not fit a {}x{} grid",
            grid.width,
            grid.height
        );
        Self {
            rect: Rect::new(x, y, w, h),
            grid,
            cells: vec![Cell::TRANSPARENT; grid.area()],
        }
    }

    /// An opaque blank panel of size `w × h` centred on the grid.
    ///
    /// # Panics
    ///
    /// Panics if `w` or `h` exceeds the grid.
    #[must_use]
    pub fn centered(grid: GridSize, w: u16, h: u16) -> Self {
        let x = i32::from(grid.width / 2) - i32::from(w / 2);
        let y = i32::from(grid.height / 2) - i32::from(h / 2);
        let mut panel = Self::new(grid, x, y, w, h);
        panel.fill(Style::DEFAULT, ' ');
        panel
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Left edge on the global grid.
    #[inline]
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.rect.x
    }

    /// Top edge on the global grid.
    #[inline]
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.rect.y
    }

    /// Declared width.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.rect.width
    }

    /// Declared height.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.rect.height
    }

    /// Declared rectangle in global coordinates.
    #[inline]
    #[must_use]
    pub const fn rect(&self) -> Rect {
        self.rect
    }

    /// The grid this panel was built for.
    #[inline]
    #[must_use]
    pub const fn grid(&self) -> GridSize {
        self.grid
    }

    /// Whether a local coordinate is writable (inside the declared
    /// rectangle and on the grid).
    #[inline]
    #[must_use]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    /// The cell at a local coordinate, if writable.
    #[must_use]
    pub fn cell(&self, x: i32, y: i32) -> Option<Cell> {
        self.index(x, y).map(|i| self.cells[i])
    }

    /// The cell at a global grid coordinate.
    ///
    /// Off-grid coordinates read as transparent.
    #[inline]
    #[must_use]
    pub fn global(&self, gx: u16, gy: u16) -> Cell {
        if gx < self.grid.width && gy < self.grid.height {
            self.cells[usize::from(gy) * usize::from(self.grid.width) + usize::from(gx)]
        } else {
            Cell::TRANSPARENT
        }
    }

    /// Translate a local coordinate to a cell index, clipping to the
    /// declared rectangle and the grid.
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let gx = x.checked_add(self.rect.x)?;
        let gy = y.checked_add(self.rect.y)?;
        if !self.rect.contains(gx, gy) || !self.grid.contains(gx, gy) {
            return None;
        }
        // Both are non-negative and below u16 bounds after the grid check.
        #[allow(clippy::cast_sign_loss)]
        Some(gy as usize * usize::from(self.grid.width) + gx as usize)
    }

    // ─── Single cells ────────────────────────────────────────────────────

    /// Draw `ch` at a local coordinate. Out-of-bounds writes are no-ops.
    pub fn putc(&mut self, x: i32, y: i32, style: Style, ch: char) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = Cell {
                glyph: glyph_of(ch),
                style,
                transparent: false,
            };
        }
    }

    /// Restyle a cell, keeping its glyph. The cell becomes opaque.
    pub fn attr(&mut self, x: i32, y: i32, style: Style) {
        if let Some(i) = self.index(x, y) {
            let cell = &mut self.cells[i];
            cell.style = style;
            cell.transparent = false;
        }
    }

    /// Make one cell transparent again.
    pub fn erase(&mut self, x: i32, y: i32) {
        if let Some(i) = self.index(x, y) {
            self.cells[i] = Cell::TRANSPARENT;
        }
    }

    /// The glyph drawn at a local coordinate.
    ///
    /// `None` outside the panel or where nothing is drawn.
    #[must_use]
    pub fn getc(&self, x: i32, y: i32) -> Option<char> {
        self.cell(x, y)
            .filter(|c| c.is_opaque())
            .map(Cell::character)
    }

    // ─── Text ────────────────────────────────────────────────────────────

    /// Draw a string in one style, one cell per codepoint.
    ///
    /// Returns the number of columns advanced (codepoints, not bytes),
    /// including those clipped away.
    pub fn puts(&mut self, x: i32, y: i32, style: Style, text: &str) -> usize {
        let mut advanced = 0;
        for (cx, ch) in (x..).zip(text.chars()) {
            self.putc(cx, y, style, ch);
            advanced += 1;
        }
        advanced
    }

    /// Draw a markup string, starting in the default style.
    ///
    /// The markup is fully resolved before anything is drawn, so an error
    /// leaves the panel untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::TooDeep`] when directives nest too deeply.
    pub fn print(&mut self, x: i32, y: i32, text: &str) -> Result<usize, MarkupError> {
        let cells = markup::render(text, Style::DEFAULT)?;
        for (cx, &(ch, style)) in (x..).zip(&cells) {
            self.putc(cx, y, style, ch);
        }
        Ok(cells.len())
    }

    /// Format arguments, then draw the result as markup.
    ///
    /// Remember that `format_args!` needs literal braces doubled:
    ///
    /// ```
    /// use gcom_term::panel::{GridSize, Panel};
    ///
    /// let mut p = Panel::new(GridSize::DEFAULT, 0, 0, 20, 1);
    /// let gold = 42;
    /// p.printf(0, 0, format_args!("Gold: Yk{{{gold}}}")).unwrap();
    /// assert_eq!(p.getc(6, 0), Some('4'));
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::TooDeep`] when directives nest too deeply.
    pub fn printf(
        &mut self,
        x: i32,
        y: i32,
        args: fmt::Arguments<'_>,
    ) -> Result<usize, MarkupError> {
        self.print(x, y, &markup::format(args))
    }

    /// Number of cells a markup string occupies when drawn.
    #[inline]
    #[must_use]
    pub fn strlen(text: &str) -> usize {
        markup::visible_len(text)
    }

    // ─── Whole panel ─────────────────────────────────────────────────────

    /// Draw the same cell over the whole declared rectangle.
    pub fn fill(&mut self, style: Style, ch: char) {
        for y in 0..i32::from(self.rect.height) {
            for x in 0..i32::from(self.rect.width) {
                self.putc(x, y, style, ch);
            }
        }
    }

    /// Make the whole declared rectangle transparent.
    pub fn clear(&mut self) {
        for y in 0..i32::from(self.rect.height) {
            for x in 0..i32::from(self.rect.width) {
                self.erase(x, y);
            }
        }
    }

    /// Frame the panel's edges with box-drawing glyphs.
    ///
    /// Panels narrower or shorter than two cells have no room for a frame
    /// and are left alone.
    pub fn border(&mut self, style: Style) {
        if self.rect.width < 2 || self.rect.height < 2 {
            return;
        }
        let right = i32::from(self.rect.width) - 1;
        let bottom = i32::from(self.rect.height) - 1;
        for x in 1..right {
            self.putc(x, 0, style, HORIZONTAL);
            self.putc(x, bottom, style, HORIZONTAL);
        }
        for y in 1..bottom {
            self.putc(0, y, style, VERTICAL);
            self.putc(right, y, style, VERTICAL);
        }
        self.putc(0, 0, style, TOP_LEFT);
        self.putc(right, 0, style, TOP_RIGHT);
        self.putc(0, bottom, style, BOTTOM_LEFT);
        self.putc(right, bottom, style, BOTTOM_RIGHT);
    }
}

impl fmt::Debug for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opaque = self.cells.iter().filter(|c| c.is_opaque()).count();
        f.debug_struct("Panel")
            .field("rect", &self.rect)
            .field("grid", &self.grid)
            .field("opaque_cells", &opaque)
            .finish()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
