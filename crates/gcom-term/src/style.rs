// SPDX-License-Identifier: MIT
//
// Style: the colour half of every cell.
//
// The palette is the classic eight ANSI colours. Brightness is a separate
// flag for foreground and background rather than eight more colours, which
// is how the SGR encoding works (30–37 vs 90–97) and how the markup letters
// work (lower-case normal, upper-case bright).
//
// Styles are small `Copy` values compared by value. Panels store them per
// cell, the compositor compares them against the committed frame, and the
// terminal backend compares them against the last SGR it emitted.

use std::fmt;

// ─── Color ───────────────────────────────────────────────────────────────────

/// One of the eight terminal colours.
///
/// The discriminant is the ANSI colour index, so `30 + color as u8` is the
/// foreground SGR code and `40 + color as u8` the background one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

impl Color {
    /// All colours in ANSI index order.
    pub const ALL: [Self; 8] = [
        Self::Black,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
        Self::White,
    ];

    /// ANSI colour index (0–7).
    #[inline]
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Decode a markup colour letter.
    ///
    /// The alphabet is `k r g y b m c w`. Lower-case selects the normal
    /// colour, upper-case the bright one. Returns `(color, bright)`.
    ///
    /// ```
    /// use gcom_term::style::Color;
    ///
    /// assert_eq!(Color::from_letter('r'), Some((Color::Red, false)));
    /// assert_eq!(Color::from_letter('K'), Some((Color::Black, true)));
    /// assert_eq!(Color::from_letter('x'), None);
    /// ```
    #[must_use]
    pub const fn from_letter(letter: char) -> Option<(Self, bool)> {
        let color = match letter.to_ascii_lowercase() {
            'k' => Self::Black,
            'r' => Self::Red,
            'g' => Self::Green,
            'y' => Self::Yellow,
            'b' => Self::Blue,
            'm' => Self::Magenta,
            'c' => Self::Cyan,
            'w' => Self::White,
            _ => return None,
        };
        Some((color, letter.is_ascii_uppercase()))
    }

    /// The markup letter for this colour at the given brightness.
    #[must_use]
    pub const fn letter(self, bright: bool) -> char {
        let lower = match self {
            Self::Black => 'k',
            Self::Red => 'r',
            Self::Green => 'g',
            Self::Yellow => 'y',
            Self::Blue => 'b',
            Self::Magenta => 'm',
            Self::Cyan => 'c',
            Self::White => 'w',
        };
        if bright {
            lower.to_ascii_uppercase()
        } else {
            lower
        }
    }
}

// ─── Style ───────────────────────────────────────────────────────────────────

/// Foreground and background colour with independent brightness.
///
/// Two styles are equal iff all four fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub fg_bright: bool,
    pub bg_bright: bool,
}

impl Style {
    /// Bright white on black: the style of blank screen and plain text.
    pub const DEFAULT: Self = Self {
        fg: Color::White,
        bg: Color::Black,
        fg_bright: true,
        bg_bright: false,
    };

    /// A style with both colours at normal brightness.
    #[inline]
    #[must_use]
    pub const fn new(fg: Color, bg: Color) -> Self {
        Self {
            fg,
            bg,
            fg_bright: false,
            bg_bright: false,
        }
    }

    /// Build a style from two markup letters (foreground, background).
    ///
    /// ```
    /// use gcom_term::style::{Color, Style};
    ///
    /// let s = Style::from_letters('Y', 'k').unwrap();
    /// assert_eq!(s.fg, Color::Yellow);
    /// assert!(s.fg_bright);
    /// assert_eq!(s.bg, Color::Black);
    /// assert!(!s.bg_bright);
    /// ```
    #[must_use]
    pub const fn from_letters(fg: char, bg: char) -> Option<Self> {
        let Some((fg, fg_bright)) = Color::from_letter(fg) else {
            return None;
        };
        let Some((bg, bg_bright)) = Color::from_letter(bg) else {
            return None;
        };
        Some(Self {
            fg,
            bg,
            fg_bright,
            bg_bright,
        })
    }

    /// Set foreground brightness.
    #[inline]
    #[must_use]
    pub const fn with_fg_bright(self, fg_bright: bool) -> Self {
        Self { fg_bright, ..self }
    }

    /// Set background brightness.
    #[inline]
    #[must_use]
    pub const fn with_bg_bright(self, bg_bright: bool) -> Self {
        Self { bg_bright, ..self }
    }

    /// SGR parameter for the foreground (30–37 normal, 90–97 bright).
    #[inline]
    #[must_use]
    pub const fn fg_code(self) -> u8 {
        30 + self.fg.index() + if self.fg_bright { 60 } else { 0 }
    }

    /// SGR parameter for the background (40–47 normal, 100–107 bright).
    #[inline]
    #[must_use]
    pub const fn bg_code(self) -> u8 {
        40 + self.bg.index() + if self.bg_bright { 60 } else { 0 }
    }
}

impl Default for Style {
    #[inline]
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Formats as the two-letter markup directive that selects this style.
impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.fg.letter(self.fg_bright),
            self.bg.letter(self.bg_bright)
        )
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
