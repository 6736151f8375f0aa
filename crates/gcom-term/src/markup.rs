// SPDX-License-Identifier: MIT
//
// Inline style markup.
//
// Formatted text is plain characters interleaved with style scopes:
//
//   "Gold: Yk{120} wk{(+4)}"
//          ^^ directive: two colour letters (fg, bg) then `{`
//
// Everything up to the matching `}` is drawn in that style. Scopes nest;
// closing one restores the enclosing style. The colour alphabet is
// `k r g y b m c w`, upper-case meaning bright (see `Color::from_letter`).
//
// Braces that are not part of a directive are literal text:
//
//   - `{` not immediately preceded by two colour letters is a glyph.
//   - `}` while no scope is open is a glyph.
//
// Unterminated scopes at end of input are closed implicitly: the text they
// covered is drawn in their style and nothing else happens. Nothing after
// the end of a format string can observe the difference, so this is the
// least surprising reading of a truncated string.
//
// The scanner steps through the string one `char` at a time, never by
// byte, so a continuation byte of a multi-byte glyph can never be mistaken
// for a directive letter. At each position it looks three characters
// ahead: "Rk" is only text once we know the next character is not `{`.

use std::fmt;

use thiserror::Error;

use crate::style::Style;

/// Maximum number of simultaneously open style scopes.
pub const MAX_DEPTH: usize = 8;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Markup that cannot be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MarkupError {
    /// More than [`MAX_DEPTH`] style scopes were open at once.
    #[error("markup nests deeper than {limit} style scopes (at byte {offset})")]
    TooDeep {
        /// The nesting limit that was exceeded.
        limit: usize,
        /// Byte offset of the directive that overflowed.
        offset: usize,
    },
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// One lexical element of a markup string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// A directive opening a style scope, at this byte offset.
    Open(Style, usize),
    /// The `}` closing the innermost open scope.
    Close,
    /// A visible character (including literal braces).
    Glyph(char),
}

/// Splits a markup string into [`Token`]s.
///
/// Tracks how many scopes are open so it can tell a closing `}` from a
/// literal one. The count is unbounded; the depth limit is enforced by
/// [`render`], which owns the style stack.
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
    open: usize,
}

impl<'a> Tokens<'a> {
    #[must_use]
    pub const fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            open: 0,
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let rest = &self.text[self.pos..];
        let first = rest.chars().next()?;

        // Directive: letter, letter, `{`.
        let mut ahead = rest.chars();
        if let (Some(fg), Some(bg), Some('{')) = (ahead.next(), ahead.next(), ahead.next()) {
            if let Some(style) = Style::from_letters(fg, bg) {
                let offset = self.pos;
                // Letters are ASCII, so the directive is exactly three bytes.
                self.pos += 3;
                self.open += 1;
                return Some(Token::Open(style, offset));
            }
        }

        self.pos += first.len_utf8();
        if first == '}' && self.open > 0 {
            self.open -= 1;
            return Some(Token::Close);
        }
        Some(Token::Glyph(first))
    }
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// Bounded stack of enclosing styles.
struct StyleStack {
    styles: Vec<Style>,
}

impl StyleStack {
    fn new(base: Style) -> Self {
        let mut styles = Vec::with_capacity(MAX_DEPTH + 1);
        styles.push(base);
        Self { styles }
    }

    fn current(&self) -> Style {
        // The base style is never popped.
        self.styles[self.styles.len() - 1]
    }

    fn push(&mut self, style: Style, offset: usize) -> Result<(), MarkupError> {
        if self.styles.len() > MAX_DEPTH {
            return Err(MarkupError::TooDeep {
                limit: MAX_DEPTH,
                offset,
            });
        }
        self.styles.push(style);
        Ok(())
    }

    fn pop(&mut self) {
        if self.styles.len() > 1 {
            self.styles.pop();
        }
    }
}

/// Resolve a markup string into the `(glyph, style)` sequence it draws.
///
/// `base` is the ambient style for text outside any directive.
///
/// # Errors
///
/// Returns [`MarkupError::TooDeep`] if more than [`MAX_DEPTH`] scopes are
/// open at once. Nothing is returned in that case, so callers can treat
/// rendering as all-or-nothing.
///
/// ```
/// use gcom_term::markup::render;
/// use gcom_term::style::Style;
///
/// let cells = render("Rk{X}y", Style::DEFAULT).unwrap();
/// assert_eq!(cells[0], ('X', Style::from_letters('R', 'k').unwrap()));
/// assert_eq!(cells[1], ('y', Style::DEFAULT));
/// ```
pub fn render(text: &str, base: Style) -> Result<Vec<(char, Style)>, MarkupError> {
    let mut stack = StyleStack::new(base);
    let mut out = Vec::with_capacity(text.len());
    for token in Tokens::new(text) {
        match token {
            Token::Open(style, offset) => stack.push(style, offset)?,
            Token::Close => stack.pop(),
            Token::Glyph(ch) => out.push((ch, stack.current())),
        }
    }
    Ok(out)
}

/// Number of cells a markup string occupies when drawn.
///
/// Directives and their closing braces take no space; literal braces and
/// every other codepoint take one cell each.
///
/// ```
/// use gcom_term::markup::visible_len;
///
/// assert_eq!(visible_len("Rk{hi}"), 2);
/// assert_eq!(visible_len("{literal}"), 9);
/// assert_eq!(visible_len("Use Rk{←↑→↓}"), 8);
/// ```
#[must_use]
pub fn visible_len(text: &str) -> usize {
    Tokens::new(text)
        .filter(|t| matches!(t, Token::Glyph(_)))
        .count()
}

/// Format arguments into a markup string.
#[must_use]
pub fn format(args: fmt::Arguments<'_>) -> String {
    fmt::format(args)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
