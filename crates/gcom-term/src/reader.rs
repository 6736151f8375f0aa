// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Stdin reading: Raw byte chunks from the terminal.
//
// The compositor's input model is synchronous: `getch` blocks for a key,
// `poll_key` waits a bounded time for one. Both reduce to two primitives
// on stdin's file descriptor:
//
//   wait_readable(timeout): poll() until bytes are available or the
//                             timeout expires.
//   read_chunk(buf):        one read() of whatever is there.
//
// The key parser needs the timeout as well: a lone ESC byte is the Escape
// key only if nothing follows it within a few milliseconds.

use std::io;
use std::time::Duration;

/// Byte chunk size for one read. A keypress is 1-6 bytes; a paste can be
/// kilobytes.
pub const READ_BUF_SIZE: usize = 4096;

/// How long a lone ESC may wait for the rest of an escape sequence.
pub const ESCAPE_TIMEOUT: Duration = Duration::from_millis(25);

/// Wait until stdin is readable or `timeout` expires.
///
/// `None` waits forever. Returns `true` when bytes are available.
///
/// # Errors
///
/// Returns the OS error if `poll()` fails for a reason other than a signal.
#[cfg(unix)]
pub fn wait_readable(timeout: Option<Duration>) -> io::Result<bool> {
    let millis = timeout.map_or(-1, |t| i32::try_from(t.as_millis()).unwrap_or(i32::MAX));
    let mut pfd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };

    let ready = unsafe { libc::poll(&raw mut pfd, 1, millis) };

    if ready < 0 {
        let err = io::Error::last_os_error();
        // A signal (SIGWINCH) interrupting the wait is not an error.
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(ready > 0)
}

/// Non-unix fallback: report input as available and let the read block.
#[cfg(not(unix))]
pub fn wait_readable(_timeout: Option<Duration>) -> io::Result<bool> {
    Ok(true)
}

/// Read whatever stdin has into `buf`.
///
/// Returns the number of bytes read; `0` means end of input.
///
/// # Errors
///
/// Returns the OS error if `read()` fails.
#[cfg(unix)]
pub fn read_chunk(buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
        if n >= 0 {
            #[allow(clippy::cast_sign_loss)] // n >= 0 checked above.
            return Ok(n as usize);
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
pub fn read_chunk(buf: &mut [u8]) -> io::Result<usize> {
    use std::io::Read;
    io::stdin().lock().read(buf)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
