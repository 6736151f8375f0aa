// SPDX-License-Identifier: MIT
//
// Terminal control: raw mode, alternate screen, RAII cleanup, and the
// real-terminal `Backend`.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr), ioctl (TIOCGWINSZ), isatty, and raw fd writes. These are the
// POSIX interfaces for terminal control; each unsafe block is minimal.
#![allow(unsafe_code)]
//
// `Terminal` owns the tty's raw state: it enters raw mode via termios,
// switches to the alternate screen, and guarantees cleanup on drop, even if
// the game panics mid-refresh.
//
// The panic hook bypasses Rust's stdout lock and writes a pre-built restore
// sequence straight to fd 1, so a panic while the lock is held (during a
// flush) cannot deadlock. Then the original hook prints its message to a
// working terminal.
//
// `TerminalBackend` puts the compositor's primitives on top: cursor moves
// and styled glyphs go into an `OutputBuffer` (one write per flush), SGR is
// emitted only when the style changes, and keys come from stdin through the
// escape-sequence `Parser`.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Mutex, Once};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::ansi;
use crate::backend::{Backend, CursorState};
use crate::input::{KeyEvent, Parser};
use crate::output::{OutputBuffer, StyleWriter};
use crate::panel::GridSize;
use crate::reader::{self, ESCAPE_TIMEOUT, READ_BUF_SIZE};
use crate::style::Style;

// ─── Queries ────────────────────────────────────────────────────────────────

/// Size of the terminal on stdout; `None` if stdout is not a terminal.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<GridSize> {
    let mut ws = std::mem::MaybeUninit::<libc::winsize>::zeroed();
    let ok = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, ws.as_mut_ptr()) } == 0;
    let ws = unsafe { ws.assume_init() };
    (ok && ws.ws_col > 0 && ws.ws_row > 0).then(|| GridSize::new(ws.ws_col, ws.ws_row))
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<GridSize> {
    None
}

/// Whether stdin is a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) == 1 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── Raw Mode ───────────────────────────────────────────────────────────────

/// The cooked-mode settings raw mode replaced. Restoring them ends raw mode.
#[cfg(unix)]
struct RawMode {
    saved: libc::termios,
}

#[cfg(unix)]
impl RawMode {
    /// Put stdin in raw mode. `Ok(None)` when stdin is not a terminal.
    fn enable() -> io::Result<Option<Self>> {
        if !is_tty() {
            return Ok(None);
        }

        let mut current = std::mem::MaybeUninit::<libc::termios>::uninit();
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, current.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let saved = unsafe { current.assume_init() };

        // cfmakeraw clears ISIG too: Ctrl-C arrives as a key.
        let mut raw = saved;
        unsafe { libc::cfmakeraw(&raw mut raw) };
        // Block for one byte at a time; timeouts are poll()'s job.
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;

        set_termios(&raw)?;
        remember_mode(Some(saved));
        Ok(Some(Self { saved }))
    }

    fn disable(self) -> io::Result<()> {
        remember_mode(None);
        set_termios(&self.saved)
    }
}

#[cfg(unix)]
fn set_termios(termios: &libc::termios) -> io::Result<()> {
    if unsafe { libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, termios) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

// ─── Panic Restore ──────────────────────────────────────────────────────────

/// Copy of the active `RawMode`'s saved settings, for the panic hook.
#[cfg(unix)]
static SAVED_MODE: Mutex<Option<libc::termios>> = Mutex::new(None);

#[cfg(unix)]
fn remember_mode(mode: Option<libc::termios>) {
    if let Ok(mut slot) = SAVED_MODE.lock() {
        *slot = mode;
    }
}

/// Reset SGR, show the cursor, then leave the alternate screen.
const RESTORE_SEQUENCE: &[u8] = b"\x1b[0m\x1b[?25h\x1b[?1049l";

static PANIC_HOOK: Once = Once::new();

/// Chain a panic hook that puts the terminal back before the message prints.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_after_panic();
            previous(info);
        }));
    });
}

/// Best effort. Writes straight to fd 1: the panic may have struck while
/// stdout's lock was held.
fn restore_after_panic() {
    #[cfg(unix)]
    {
        let _ = unsafe {
            libc::write(
                libc::STDOUT_FILENO,
                RESTORE_SEQUENCE.as_ptr().cast::<libc::c_void>(),
                RESTORE_SEQUENCE.len(),
            )
        };
        let saved = SAVED_MODE.try_lock().ok().and_then(|slot| *slot);
        if let Some(saved) = saved {
            let _ = set_termios(&saved);
        }
    }

    #[cfg(not(unix))]
    {
        let mut out = io::stdout();
        let _ = out.write_all(RESTORE_SEQUENCE);
        let _ = out.flush();
    }
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Owner of the tty's raw state.
///
/// [`enter`](Self::enter) switches to raw mode on the alternate screen;
/// dropping the handle (or panicking) switches back.
///
/// ```no_run
/// use gcom_term::terminal::Terminal;
///
/// let mut term = Terminal::new()?;
/// term.enter()?;
/// // ... draw, read keys ...
/// # Ok::<(), std::io::Error>(())
/// ```
pub struct Terminal {
    #[cfg(unix)]
    raw: Option<RawMode>,
    size: GridSize,
    active: bool,
}

impl Terminal {
    /// A handle for the current terminal, not yet entered.
    ///
    /// The size falls back to 80×24 when stdout is not a terminal.
    ///
    /// # Errors
    ///
    /// Currently infallible; returns `Result` so platform setup can fail.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            raw: None,
            size: get_size().unwrap_or(GridSize::DEFAULT),
            active: false,
        })
    }

    /// Size as of creation or the last [`refresh_size`](Self::refresh_size).
    #[inline]
    #[must_use]
    pub const fn size(&self) -> GridSize {
        self.size
    }

    /// Ask the OS again; keeps the old size if the query fails.
    pub fn refresh_size(&mut self) -> GridSize {
        self.size = get_size().unwrap_or(self.size);
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Raw mode, alternate screen, cleared. A second call does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the mode switch or the output fails.
    pub fn enter(&mut self) -> io::Result<()> {
        if self.active {
            return Ok(());
        }
        install_panic_hook();

        #[cfg(unix)]
        {
            self.raw = RawMode::enable()?;
        }

        let mut out = io::stdout().lock();
        ansi::enter_alt_screen(&mut out)?;
        ansi::clear_screen(&mut out)?;
        out.flush()?;

        self.active = true;
        debug!(width = self.size.width, height = self.size.height, "terminal entered");
        Ok(())
    }

    /// Undo [`enter`](Self::enter). A second call does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the output or the mode switch fails.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }

        {
            let mut out = io::stdout().lock();
            ansi::reset(&mut out)?;
            ansi::cursor_show(&mut out)?;
            ansi::exit_alt_screen(&mut out)?;
            out.flush()?;
        }

        #[cfg(unix)]
        if let Some(raw) = self.raw.take() {
            raw.disable()?;
        }

        self.active = false;
        debug!("terminal left");
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

// ─── TerminalBackend ────────────────────────────────────────────────────────

/// [`Backend`] for the process's controlling terminal.
///
/// Output is buffered until [`flush`](Backend::flush). The style is
/// forgotten after every cursor move, so the first glyph after a move
/// always re-selects its colours.
pub struct TerminalBackend {
    terminal: Terminal,
    out: OutputBuffer,
    writer: StyleWriter,
    parser: Parser,
    keys: VecDeque<KeyEvent>,
    cursor: CursorState,
}

impl TerminalBackend {
    /// Take over the terminal: raw mode, alternate screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be switched into raw mode.
    pub fn new() -> io::Result<Self> {
        let mut terminal = Terminal::new()?;
        terminal.enter()?;
        Ok(Self {
            terminal,
            out: OutputBuffer::new(),
            writer: StyleWriter::new(),
            parser: Parser::new(),
            keys: VecDeque::new(),
            cursor: CursorState {
                x: 0,
                y: 0,
                visible: true,
            },
        })
    }

    /// The underlying terminal handle.
    #[must_use]
    pub const fn terminal(&self) -> &Terminal {
        &self.terminal
    }

    /// Read stdin until at least one key is decoded or `timeout` expires.
    ///
    /// The timeout is a deadline for the whole call: chunks that decode to
    /// nothing (an unknown sequence) do not restart it. Bytes left in the
    /// parser (a lone ESC, a half-received sequence) get [`ESCAPE_TIMEOUT`]
    /// to complete before they are taken as typed.
    fn fill_keys(&mut self, timeout: Option<Duration>) -> io::Result<bool> {
        let mut buf = [0u8; READ_BUF_SIZE];
        let deadline = timeout.map(|t| Instant::now() + t);

        while self.keys.is_empty() {
            let wait = next_wait(deadline, self.parser.has_pending(), Instant::now());
            if !reader::wait_readable(wait)? {
                let keys = self.parser.flush();
                self.keys.extend(keys);
                break;
            }

            let n = reader::read_chunk(&mut buf)?;
            if n == 0 {
                let keys = self.parser.flush();
                self.keys.extend(keys);
                if self.keys.is_empty() {
                    return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed"));
                }
                break;
            }

            let keys = self.parser.advance(&buf[..n]);
            self.keys.extend(keys);
        }

        Ok(!self.keys.is_empty())
    }
}

/// How long the next `poll()` may block: whatever is left until `deadline`
/// (forever without one), cut to [`ESCAPE_TIMEOUT`] while the parser holds
/// a partial sequence.
fn next_wait(deadline: Option<Instant>, pending: bool, now: Instant) -> Option<Duration> {
    let left = deadline.map(|d| d.saturating_duration_since(now));
    if pending {
        Some(left.map_or(ESCAPE_TIMEOUT, |l| l.min(ESCAPE_TIMEOUT)))
    } else {
        left
    }
}

impl Backend for TerminalBackend {
    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        ansi::cursor_to(&mut self.out, x, y)?;
        self.writer.invalidate();
        self.cursor.x = x;
        self.cursor.y = y;
        Ok(())
    }

    fn set_cursor_visible(&mut self, visible: bool) -> io::Result<()> {
        if visible {
            ansi::cursor_show(&mut self.out)?;
        } else {
            ansi::cursor_hide(&mut self.out)?;
        }
        self.cursor.visible = visible;
        Ok(())
    }

    fn cursor(&self) -> CursorState {
        self.cursor
    }

    fn write_cell(&mut self, style: Style, ch: char) -> io::Result<()> {
        self.writer.write_glyph(&mut self.out, style, ch);
        self.cursor.x = self.cursor.x.saturating_add(1);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush_to(&mut io::stdout().lock())
    }

    fn read_key(&mut self) -> io::Result<KeyEvent> {
        loop {
            if let Some(key) = self.keys.pop_front() {
                return Ok(key);
            }
            self.fill_keys(None)?;
        }
    }

    fn has_input(&mut self, timeout: Duration) -> io::Result<bool> {
        if !self.keys.is_empty() {
            return Ok(true);
        }
        self.fill_keys(Some(timeout))
    }

    fn set_title(&mut self, title: &str) -> io::Result<()> {
        ansi::set_title(&mut self.out, title)
    }

    fn terminal_size(&self) -> Option<GridSize> {
        get_size()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
