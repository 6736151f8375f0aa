// SPDX-License-Identifier: MIT
//
// gcom-term: layered panel compositor for Goblin-COM.
//
// The screen is a fixed grid of single-width character cells. Code that
// draws (the map, the side bar, popups) owns a Panel: a grid-sized layer
// with its own transparency mask and a declared rectangle it may write in.
// Panels are pushed onto the Display's stack; a refresh resolves the
// topmost opaque cell at every coordinate, compares it with what the
// terminal is already showing, and sends only the difference.
//
// Text can carry inline colour markup (`Rk{alert}`), parsed into per-cell
// styles without ever splitting a multi-byte glyph.
//
// No TUI framework underneath: the terminal backend speaks ANSI directly
// over a raw-mode tty, and an in-memory backend stands in for it in tests.

pub mod ansi;
pub mod backend;
pub mod cell;
pub mod display;
pub mod error;
pub mod input;
pub mod markup;
pub mod output;
pub mod panel;
pub mod reader;
pub mod style;
pub mod terminal;

pub use backend::{Backend, MemoryBackend};
pub use display::{Display, DisplayConfig, PanelId, RenderStats};
pub use error::{Error, Result};
pub use input::{KeyCode, KeyEvent, Modifiers};
pub use panel::{GridSize, Panel};
pub use style::{Color, Style};
pub use terminal::TerminalBackend;
