// SPDX-License-Identifier: MIT
//
// Cell: the atomic unit of a panel.
//
// Every grid position of every panel is a Cell: a 16-bit glyph, a style, and
// a transparency flag. Transparent cells are "not drawn here"; the
// compositor looks through them to the panel beneath.
//
// Glyph restriction:
//
//   The grid is a fixed array of single-width cells and the compositor
//   tracks the terminal cursor by counting one column per write. A glyph
//   that the terminal draws two columns wide (CJK, most emoji) or zero
//   columns wide (combining marks, controls) would silently shift every
//   following cell on the row. Such characters, and anything outside the
//   Basic Multilingual Plane, are stored as `?`. Box-drawing, block and
//   accented Latin glyphs are all single-width BMP characters and pass
//   through untouched.
//
// Size: 2 (glyph) + 4 (style) + 1 (transparent) → 8 bytes with padding.
// An 80×24 panel is under 16 KB.

use unicode_width::UnicodeWidthChar;

use crate::style::Style;

/// Stored in place of glyphs that cannot occupy exactly one cell.
pub const SUBSTITUTE: char = '?';

const SPACE: u16 = b' ' as u16;

/// Convert a character to the 16-bit glyph stored in a cell.
///
/// ```
/// use gcom_term::cell::glyph_of;
///
/// assert_eq!(glyph_of('A'), 0x41);
/// assert_eq!(glyph_of('─'), 0x2500);
/// assert_eq!(glyph_of('日'), u16::from(b'?')); // two columns wide
/// assert_eq!(glyph_of('🔥'), u16::from(b'?')); // outside the BMP
/// ```
#[must_use]
pub fn glyph_of(ch: char) -> u16 {
    if ch.is_control() {
        return SUBSTITUTE as u16;
    }
    match (u16::try_from(u32::from(ch)), ch.width()) {
        (Ok(glyph), Some(1)) => glyph,
        _ => SUBSTITUTE as u16,
    }
}

/// A stored glyph back as a `char`.
///
/// Glyphs only ever come from [`glyph_of`], so they are never surrogates;
/// the fallback exists for hand-built cells.
#[inline]
#[must_use]
pub fn char_of(glyph: u16) -> char {
    char::from_u32(u32::from(glyph)).unwrap_or(SUBSTITUTE)
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// One grid position of a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// BMP codepoint of a single-width character.
    pub glyph: u16,
    /// Colours the glyph is drawn with.
    pub style: Style,
    /// `true` = defer to the panel beneath.
    pub transparent: bool,
}

impl Cell {
    /// What every panel cell starts as: see-through.
    pub const TRANSPARENT: Self = Self {
        glyph: SPACE,
        style: Style::DEFAULT,
        transparent: true,
    };

    /// An opaque blank: space in the default style.
    pub const BLANK: Self = Self {
        glyph: SPACE,
        style: Style::DEFAULT,
        transparent: false,
    };

    /// An opaque cell holding `ch` in `style`.
    #[inline]
    #[must_use]
    pub fn new(ch: char, style: Style) -> Self {
        Self {
            glyph: glyph_of(ch),
            style,
            transparent: false,
        }
    }

    /// The glyph as a `char`.
    #[inline]
    #[must_use]
    pub fn character(self) -> char {
        char_of(self.glyph)
    }

    /// Whether this cell is drawn (not transparent).
    #[inline]
    #[must_use]
    pub const fn is_opaque(self) -> bool {
        !self.transparent
    }

    /// The part of the cell that reaches the screen.
    #[inline]
    #[must_use]
    pub const fn visible(self) -> Visible {
        Visible {
            glyph: self.glyph,
            style: self.style,
        }
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::TRANSPARENT
    }
}

// ─── Visible ─────────────────────────────────────────────────────────────────

/// A composited screen position: what the terminal shows there.
///
/// This is what the display's committed-frame cache stores and compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visible {
    pub glyph: u16,
    pub style: Style,
}

impl Visible {
    /// The glyph as a `char`.
    #[inline]
    #[must_use]
    pub fn character(self) -> char {
        char_of(self.glyph)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
