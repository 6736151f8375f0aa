// SPDX-License-Identifier: MIT
//
// Key decoding: raw terminal bytes to structured key events.
//
// Terminal input in raw mode is a byte stream: printable characters arrive
// as UTF-8, control keys as C0 bytes, and navigation keys as escape
// sequences (`ESC [ A` for Up, `ESC [ 5 ~` for Page Up, `ESC O P` for F1).
// This module turns that stream into `KeyEvent`s.
//
// The parser keeps a small byte buffer because an escape sequence can be
// split across two `read()` calls. Feed bytes with [`Parser::advance`].
// A lone ESC is ambiguous (Escape key, or the start of a sequence whose
// tail hasn't arrived yet); the parser holds it until the caller has
// waited a moment with no new input and calls [`Parser::flush`].
//
// Ctrl-C arrives as an ordinary key (`Char('c')` + CTRL): raw mode turns
// off signal generation and the application decides what it means.

use bitflags::bitflags;

// ─── Key Types ──────────────────────────────────────────────────────────────

/// A keypress with its modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Which key was pressed.
    pub code: KeyCode,
    /// Active modifier keys.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// A key with no modifiers.
    #[inline]
    #[must_use]
    pub const fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::empty(),
        }
    }

    /// A key with Ctrl held.
    #[inline]
    #[must_use]
    pub const fn ctrl(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::CTRL,
        }
    }

    /// Whether this is Ctrl-C.
    #[inline]
    #[must_use]
    pub fn is_interrupt(self) -> bool {
        self.code == KeyCode::Char('c') && self.modifiers.contains(Modifiers::CTRL)
    }
}

/// Identity of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    /// A Unicode character.
    Char(char),
    // ── Named keys ──────────────────────────────────────────────
    Enter,
    Tab,
    Backspace,
    Escape,
    Delete,
    Insert,
    // ── Navigation ──────────────────────────────────────────────
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    // ── Function keys ───────────────────────────────────────────
    /// F1 through F20.
    F(u8),
}

impl KeyCode {
    /// Grid step for movement keys, as `(dx, dy)`.
    ///
    /// Arrows move orthogonally. The four keys around them on a numeric
    /// keypad move diagonally: Home ↖, Page Up ↗, End ↙, Page Down ↘.
    ///
    /// ```
    /// use gcom_term::input::KeyCode;
    ///
    /// assert_eq!(KeyCode::Left.direction(), Some((-1, 0)));
    /// assert_eq!(KeyCode::PageDown.direction(), Some((1, 1)));
    /// assert_eq!(KeyCode::Enter.direction(), None);
    /// ```
    #[must_use]
    pub const fn direction(self) -> Option<(i32, i32)> {
        match self {
            Self::Up => Some((0, -1)),
            Self::Down => Some((0, 1)),
            Self::Left => Some((-1, 0)),
            Self::Right => Some((1, 0)),
            Self::Home => Some((-1, -1)),
            Self::PageUp => Some((1, -1)),
            Self::End => Some((-1, 1)),
            Self::PageDown => Some((1, 1)),
            _ => None,
        }
    }
}

bitflags! {
    /// Keyboard modifier flags.
    ///
    /// Bit layout follows the xterm CSI modifier encoding, where the
    /// parameter is `1 + bitmask`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0000_0001;
        const ALT   = 0b0000_0010;
        const CTRL  = 0b0000_0100;
    }
}

// ─── Parser ─────────────────────────────────────────────────────────────────

/// Incremental key parser.
///
/// Feed raw bytes via [`advance`](Parser::advance); incomplete sequences are
/// kept and completed by later calls.
pub struct Parser {
    buf: Vec<u8>,
}

impl Parser {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(16),
        }
    }

    /// Feed bytes from stdin and return every key that can be decoded.
    pub fn advance(&mut self, data: &[u8]) -> Vec<KeyEvent> {
        self.buf.extend_from_slice(data);
        let mut keys = Vec::new();
        let mut pos = 0;

        while pos < self.buf.len() {
            match try_parse(&self.buf[pos..]) {
                Parsed::Key(key, consumed) => {
                    keys.push(key);
                    pos += consumed;
                }
                Parsed::Incomplete => break,
                Parsed::Skip(n) => pos += n,
            }
        }

        if pos > 0 {
            self.buf.drain(..pos);
        }
        keys
    }

    /// Are there unconsumed bytes that might complete with more data?
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Resolve pending bytes after an input timeout.
    ///
    /// A held ESC becomes the Escape key; the bytes after it are decoded
    /// afresh, so `ESC [` typed slowly yields Escape then `[`.
    pub fn flush(&mut self) -> Vec<KeyEvent> {
        let pending = std::mem::take(&mut self.buf);
        let mut keys = Vec::new();
        let mut rest = pending.as_slice();
        while let Some(&first) = rest.first() {
            if first == 0x1B {
                keys.push(KeyEvent::plain(KeyCode::Escape));
                rest = &rest[1..];
                continue;
            }
            match try_parse(rest) {
                Parsed::Key(key, consumed) => {
                    keys.push(key);
                    rest = &rest[consumed..];
                }
                // A truncated UTF-8 sequence can never complete now.
                Parsed::Incomplete | Parsed::Skip(_) => rest = &rest[1..],
            }
        }
        keys
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Stateless Parsing Functions ────────────────────────────────────────────

/// Result of trying to parse one key from the front of a buffer.
enum Parsed {
    /// A key, consuming `usize` bytes.
    Key(KeyEvent, usize),
    /// Need more bytes.
    Incomplete,
    /// Unrecognised byte(s); skip `usize` bytes.
    Skip(usize),
}

fn try_parse(buf: &[u8]) -> Parsed {
    let Some(&lead) = buf.first() else {
        return Parsed::Skip(0);
    };

    match lead {
        0x1B => parse_escape(buf),
        0x00 => Parsed::Key(KeyEvent::ctrl(KeyCode::Char('@')), 1),
        b @ (0x01..=0x07 | 0x0B..=0x0C | 0x0E..=0x1A) => {
            Parsed::Key(KeyEvent::ctrl(KeyCode::Char((b + b'a' - 1) as char)), 1)
        }
        0x08 | 0x7F => Parsed::Key(KeyEvent::plain(KeyCode::Backspace), 1),
        0x09 => Parsed::Key(KeyEvent::plain(KeyCode::Tab), 1),
        0x0A | 0x0D => Parsed::Key(KeyEvent::plain(KeyCode::Enter), 1),
        b @ 0x20..=0x7E => Parsed::Key(KeyEvent::plain(KeyCode::Char(b as char)), 1),
        0xC0..=0xFF => parse_utf8(buf),
        _ => Parsed::Skip(1),
    }
}

// ── Escape sequences ────────────────────────────────────────────────────────

fn parse_escape(buf: &[u8]) -> Parsed {
    debug_assert_eq!(buf[0], 0x1B);

    if buf.len() < 2 {
        return Parsed::Incomplete;
    }

    match buf[1] {
        b'[' => parse_csi(buf),
        b'O' => parse_ss3(buf),
        0x1B => Parsed::Key(
            KeyEvent {
                code: KeyCode::Escape,
                modifiers: Modifiers::ALT,
            },
            2,
        ),
        b @ 0x20..=0x7E => Parsed::Key(
            KeyEvent {
                code: KeyCode::Char(b as char),
                modifiers: Modifiers::ALT,
            },
            2,
        ),
        _ => Parsed::Key(KeyEvent::plain(KeyCode::Escape), 1),
    }
}

// ── CSI (Control Sequence Introducer) ───────────────────────────────────────

fn parse_csi(buf: &[u8]) -> Parsed {
    // Scan for the final byte (0x40..=0x7E). Parameter bytes are
    // 0x30..=0x3F, intermediates 0x20..=0x2F.
    let mut end = 2;
    while end < buf.len() {
        let b = buf[end];
        if (0x40..=0x7E).contains(&b) {
            break;
        }
        if !(0x20..=0x3F).contains(&b) {
            return Parsed::Skip(end + 1);
        }
        end += 1;
    }

    if end >= buf.len() {
        return Parsed::Incomplete;
    }

    let final_byte = buf[end];
    let params = parse_params(&buf[2..end]);
    let consumed = end + 1;
    let modifiers = params.get(1).map_or(Modifiers::empty(), |&p| decode_modifiers(p));

    if final_byte == b'~' {
        let code = match params.first().copied().unwrap_or(0) {
            1 | 7 => KeyCode::Home,
            2 => KeyCode::Insert,
            3 => KeyCode::Delete,
            4 | 8 => KeyCode::End,
            5 => KeyCode::PageUp,
            6 => KeyCode::PageDown,
            11 => KeyCode::F(1),
            12 => KeyCode::F(2),
            13 => KeyCode::F(3),
            14 => KeyCode::F(4),
            15 => KeyCode::F(5),
            17 => KeyCode::F(6),
            18 => KeyCode::F(7),
            19 => KeyCode::F(8),
            20 => KeyCode::F(9),
            21 => KeyCode::F(10),
            23 => KeyCode::F(11),
            24 => KeyCode::F(12),
            _ => return Parsed::Skip(consumed),
        };
        return Parsed::Key(KeyEvent { code, modifiers }, consumed);
    }

    let code = match final_byte {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        b'Z' => {
            return Parsed::Key(
                KeyEvent {
                    code: KeyCode::Tab,
                    modifiers: Modifiers::SHIFT,
                },
                consumed,
            );
        }
        _ => return Parsed::Skip(consumed),
    };

    Parsed::Key(KeyEvent { code, modifiers }, consumed)
}

// ── SS3 (Single Shift 3) ───────────────────────────────────────────────────

fn parse_ss3(buf: &[u8]) -> Parsed {
    if buf.len() < 3 {
        return Parsed::Incomplete;
    }

    let code = match buf[2] {
        b'A' => KeyCode::Up,
        b'B' => KeyCode::Down,
        b'C' => KeyCode::Right,
        b'D' => KeyCode::Left,
        b'H' => KeyCode::Home,
        b'F' => KeyCode::End,
        b'P' => KeyCode::F(1),
        b'Q' => KeyCode::F(2),
        b'R' => KeyCode::F(3),
        b'S' => KeyCode::F(4),
        _ => return Parsed::Skip(3),
    };

    Parsed::Key(KeyEvent::plain(code), 3)
}

// ── UTF-8 ──────────────────────────────────────────────────────────────────

fn parse_utf8(buf: &[u8]) -> Parsed {
    let expected = utf8_char_len(buf[0]);

    if expected == 0 {
        return Parsed::Skip(1);
    }
    if buf.len() < expected {
        return Parsed::Incomplete;
    }

    std::str::from_utf8(&buf[..expected]).map_or(Parsed::Skip(1), |s| {
        s.chars().next().map_or(Parsed::Skip(expected), |ch| {
            Parsed::Key(KeyEvent::plain(KeyCode::Char(ch)), expected)
        })
    })
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Parse semicolon-separated CSI parameters. Empty input gives no params.
fn parse_params(raw: &[u8]) -> Vec<u16> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(|&b| b == b';')
        .map(|part| {
            part.iter()
                .take_while(|b| b.is_ascii_digit())
                .fold(0u16, |acc, &b| acc.saturating_mul(10).saturating_add(u16::from(b - b'0')))
        })
        .collect()
}

/// xterm sends modifiers as `1 + mask`; a missing parameter means none.
#[allow(clippy::cast_possible_truncation)] // only the low bits carry flags
const fn decode_modifiers(param: u16) -> Modifiers {
    Modifiers::from_bits_truncate(param.saturating_sub(1) as u8)
}

/// Length of the UTF-8 sequence a lead byte starts; 0 if it cannot lead.
const fn utf8_char_len(lead: u8) -> usize {
    match lead.leading_ones() {
        0 => 1,
        n @ 2..=4 => n as usize,
        _ => 0,
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
