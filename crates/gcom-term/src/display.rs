// SPDX-License-Identifier: MIT
//
// Display: the panel compositor.
//
// The display owns a stack of panels and a cache of what the backend is
// showing. Drawing never touches the backend directly: callers write into
// panels, and `refresh` reconciles the screen with the stack.
//
// The stack:
//
//   base panel:    full-grid, opaque everywhere, never popped. Every
//                    coordinate resolves to at least this panel, so
//                    compositing always terminates.
//   pushed panels: owned by the display while pushed (push moves the
//                    panel in, pop hands it back). A `PanelId` names one
//                    push; once that panel is popped the id goes stale and
//                    lookups return `None`.
//
// The refresh pass, for every coordinate in row-major order:
//
//   1. Walk the stack from the top; the first opaque cell is visible.
//   2. Equal to the cached value? Skip.
//   3. Otherwise move the cursor (only if the last write didn't leave it
//      here), write the glyph, record it in the cache.
//
// Then one flush. The cache only ever holds what was written, so a refresh
// with nothing changed issues no writes at all, and a one-cell change costs
// one write plus at most one move. `invalidate` empties the cache when
// something else has scribbled on the screen.
//
// Reading input refreshes first. A key is never read against a stale
// frame.

use std::time::Duration;

use tracing::{debug, trace};

use crate::backend::Backend;
use crate::cell::{Cell, Visible};
use crate::error::Result;
use crate::input::KeyEvent;
use crate::panel::{GridSize, Panel};
use crate::style::Style;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Settings fixed when a [`Display`] is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Grid every panel on this display is built for.
    pub grid: GridSize,
    /// Window title to set at startup.
    pub title: Option<String>,
    /// Hide the cursor while the display is alive.
    pub hide_cursor: bool,
}

impl DisplayConfig {
    /// Defaults on a given grid.
    #[must_use]
    pub const fn new(grid: GridSize) -> Self {
        Self {
            grid,
            title: None,
            hide_cursor: true,
        }
    }

    /// Set the window title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self::new(GridSize::DEFAULT)
    }
}

// ─── Handles ─────────────────────────────────────────────────────────────────

/// Names one pushed panel for as long as it stays pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelId {
    /// Position in the stack; the base panel is depth 0.
    depth: usize,
    generation: u64,
}

impl PanelId {
    /// Stack position: 1 for the first panel pushed above the base.
    #[inline]
    #[must_use]
    pub const fn depth(self) -> usize {
        self.depth
    }
}

struct Layer {
    id: PanelId,
    panel: Panel,
}

// ─── RenderStats ─────────────────────────────────────────────────────────────

/// What one refresh cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    /// Glyphs written to the backend.
    pub cells_written: usize,
    /// Coordinates that already showed the right thing.
    pub cells_skipped: usize,
    /// Cursor moves issued.
    pub moves: usize,
}

impl RenderStats {
    /// Total coordinates visited (written + skipped).
    #[inline]
    #[must_use]
    pub const fn total_cells(&self) -> usize {
        self.cells_written + self.cells_skipped
    }
}

// ─── Display ─────────────────────────────────────────────────────────────────

/// Panel stack plus the committed frame, driving a [`Backend`].
///
/// ```
/// use gcom_term::backend::MemoryBackend;
/// use gcom_term::display::{Display, DisplayConfig};
/// use gcom_term::panel::{GridSize, Panel};
/// use gcom_term::style::Style;
///
/// let grid = GridSize::new(20, 5);
/// let mut display = Display::new(MemoryBackend::new(grid), DisplayConfig::new(grid))?;
///
/// let mut popup = Panel::centered(grid, 8, 3);
/// popup.puts(1, 1, Style::DEFAULT, "hello");
/// let (_popup, stats) = display.scoped(popup, |d, _| d.refresh());
/// assert_eq!(stats?.cells_written, 5);
///
/// assert_eq!(display.backend().row_text(2), "       hello        ");
/// # Ok::<(), gcom_term::Error>(())
/// ```
pub struct Display<B: Backend> {
    backend: B,
    grid: GridSize,
    base: Panel,
    layers: Vec<Layer>,
    /// Last value written at each coordinate; `None` = unknown.
    cache: Vec<Option<Visible>>,
    generation: u64,
}

impl<B: Backend> Display<B> {
    /// Take over `backend`: hide the cursor and set the title as
    /// configured, then draw the blank base panel.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails during setup.
    pub fn new(backend: B, config: DisplayConfig) -> Result<Self> {
        let grid = config.grid;
        let mut base = Panel::new(grid, 0, 0, grid.width, grid.height);
        base.fill(Style::DEFAULT, ' ');

        let mut display = Self {
            backend,
            grid,
            base,
            layers: Vec::new(),
            cache: vec![None; grid.area()],
            generation: 0,
        };

        if config.hide_cursor {
            display.backend.set_cursor_visible(false)?;
        }
        if let Some(title) = &config.title {
            display.backend.set_title(title)?;
        }
        display.refresh()?;

        debug!(width = grid.width, height = grid.height, "display initialised");
        Ok(display)
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// The grid size every panel must be built for.
    #[inline]
    #[must_use]
    pub const fn grid(&self) -> GridSize {
        self.grid
    }

    /// The backend being driven.
    #[inline]
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend.
    ///
    /// Drawing through it behind the display's back desynchronises the
    /// cache; call [`invalidate`](Self::invalidate) afterwards.
    #[inline]
    pub const fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The permanent bottom panel.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> &Panel {
        &self.base
    }

    /// Number of panels pushed above the base.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// The id of the topmost pushed panel, if any.
    #[must_use]
    pub fn top(&self) -> Option<PanelId> {
        self.layers.last().map(|l| l.id)
    }

    // ─── Stack ───────────────────────────────────────────────────────────

    /// Put `panel` on top of the stack.
    ///
    /// # Panics
    ///
    /// Panics if the panel was built for a different grid size.
    pub fn push(&mut self, panel: Panel) -> PanelId {
        assert_eq!(
            panel.grid(),
            self.grid,
            "panel built for a different grid than the display"
        );
        self.generation += 1;
        let id = PanelId {
            depth: self.layers.len() + 1,
            generation: self.generation,
        };
        debug!(depth = id.depth, rect = ?panel.rect(), "panel pushed");
        self.layers.push(Layer { id, panel });
        id
    }

    /// Take the topmost panel off the stack and hand it back.
    ///
    /// # Panics
    ///
    /// Panics if only the base panel is left.
    pub fn pop(&mut self) -> Panel {
        let Some(layer) = self.layers.pop() else {
            panic!("pop of base panel");
        };
        debug!(depth = layer.id.depth, "panel popped");
        layer.panel
    }

    /// Push `panel`, run `f`, pop it again.
    ///
    /// Returns the panel (with whatever `f` drew on it) and `f`'s result.
    ///
    /// # Panics
    ///
    /// Panics if `f` leaves a different panel on top than it was given.
    pub fn scoped<R>(
        &mut self,
        panel: Panel,
        f: impl FnOnce(&mut Self, PanelId) -> R,
    ) -> (Panel, R) {
        let id = self.push(panel);
        let result = f(self, id);
        assert_eq!(
            self.top(),
            Some(id),
            "scoped panel is no longer on top of the stack"
        );
        (self.pop(), result)
    }

    /// A pushed panel; `None` once it has been popped.
    #[must_use]
    pub fn panel(&self, id: PanelId) -> Option<&Panel> {
        self.layer_index(id).map(|i| &self.layers[i].panel)
    }

    /// A pushed panel, for drawing; `None` once it has been popped.
    pub fn panel_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.layer_index(id).map(|i| &mut self.layers[i].panel)
    }

    fn layer_index(&self, id: PanelId) -> Option<usize> {
        let i = id.depth.checked_sub(1)?;
        self.layers
            .get(i)
            .filter(|layer| layer.id == id)
            .map(|_| i)
    }

    // ─── Compositing ─────────────────────────────────────────────────────

    /// What the screen should show at a grid coordinate.
    ///
    /// `None` off the grid.
    #[must_use]
    pub fn resolve(&self, x: u16, y: u16) -> Option<Visible> {
        (x < self.grid.width && y < self.grid.height).then(|| self.composite(x, y))
    }

    /// Topmost opaque cell at an on-grid coordinate.
    fn composite(&self, x: u16, y: u16) -> Visible {
        self.layers
            .iter()
            .rev()
            .map(|layer| &layer.panel)
            .chain(std::iter::once(&self.base))
            .map(|panel| panel.global(x, y))
            .find(|cell| cell.is_opaque())
            // The base is opaque everywhere; this is what it holds.
            .unwrap_or(Cell::BLANK)
            .visible()
    }

    /// Bring the backend in line with the panel stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails. Cells written before the
    /// failure stay recorded, the rest are retried next refresh.
    pub fn refresh(&mut self) -> Result<RenderStats> {
        let mut stats = RenderStats::default();
        // Where the backend cursor is known to be; unknown at the start.
        let mut cursor: Option<(u16, u16)> = None;
        let width = usize::from(self.grid.width);

        for y in 0..self.grid.height {
            for x in 0..self.grid.width {
                let visible = self.composite(x, y);
                let i = usize::from(y) * width + usize::from(x);

                if self.cache[i] == Some(visible) {
                    stats.cells_skipped += 1;
                    continue;
                }

                if cursor != Some((x, y)) {
                    self.backend.move_cursor(x, y)?;
                    stats.moves += 1;
                }
                self.backend.write_cell(visible.style, visible.character())?;
                self.cache[i] = Some(visible);
                stats.cells_written += 1;
                cursor = x.checked_add(1).map(|next| (next, y));
            }
        }

        self.backend.flush()?;
        trace!(
            written = stats.cells_written,
            skipped = stats.cells_skipped,
            moves = stats.moves,
            "refresh"
        );
        Ok(stats)
    }

    /// Forget what the screen shows; the next refresh redraws everything.
    pub fn invalidate(&mut self) {
        self.cache.fill(None);
        debug!("display invalidated");
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Refresh, then block for one key.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh or the read fails.
    pub fn getch(&mut self) -> Result<KeyEvent> {
        self.refresh()?;
        Ok(self.backend.read_key()?)
    }

    /// Refresh, then wait at most `timeout` for a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh, the wait or the read fails.
    pub fn poll_key(&mut self, timeout: Duration) -> Result<Option<KeyEvent>> {
        self.refresh()?;
        if self.backend.has_input(timeout)? {
            Ok(Some(self.backend.read_key()?))
        } else {
            Ok(None)
        }
    }

    /// Set the window title.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        self.backend.set_title(title)?;
        Ok(())
    }
}

impl<B: Backend> Drop for Display<B> {
    /// Restore the cursor, then insist the stack is back to the base.
    ///
    /// # Panics
    ///
    /// Panics if panels are still pushed, unless already unwinding.
    fn drop(&mut self) {
        // Park the cursor below the grid so the shell prompt lands cleanly.
        let _ = self.backend.set_cursor_visible(true);
        let _ = self.backend.move_cursor(0, self.grid.height);
        let _ = self.backend.flush();

        if !self.layers.is_empty() && !std::thread::panicking() {
            panic!(
                "display dropped with {} panels still pushed",
                self.layers.len()
            );
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, Op};
    use crate::input::KeyCode;
    use crate::style::Color;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const GRID: GridSize = GridSize::new(8, 4);

    fn display() -> Display<MemoryBackend> {
        Display::new(MemoryBackend::new(GRID), DisplayConfig::new(GRID)).unwrap()
    }

    fn red() -> Style {
        Style::new(Color::Red, Color::Black)
    }

    // ── Setup ───────────────────────────────────────────────────────────

    #[test]
    fn new_draws_the_blank_base() {
        let d = display();
        let b = d.backend();
        assert_eq!(b.writes(), GRID.area());
        for y in 0..GRID.height {
            assert_eq!(b.row_text(y), "        ");
        }
        assert_eq!(b.screen_style(3, 2), Some(Style::DEFAULT));
        assert!(!b.cursor().visible);
        assert_eq!(d.depth(), 0);
    }

    #[test]
    fn new_sets_configured_title() {
        let d = Display::new(
            MemoryBackend::new(GRID),
            DisplayConfig::new(GRID).with_title("Goblin-COM"),
        )
        .unwrap();
        assert_eq!(d.backend().title(), Some("Goblin-COM"));
    }

    #[test]
    fn cursor_stays_visible_when_configured() {
        let config = DisplayConfig {
            hide_cursor: false,
            ..DisplayConfig::new(GRID)
        };
        let d = Display::new(MemoryBackend::new(GRID), config).unwrap();
        assert!(d.backend().cursor().visible);
    }

    #[test]
    fn base_is_opaque_everywhere() {
        let d = display();
        for y in 0..GRID.height {
            for x in 0..GRID.width {
                assert!(d.base().global(x, y).is_opaque());
            }
        }
    }

    // ── Compositing ─────────────────────────────────────────────────────

    #[test]
    fn topmost_opaque_cell_wins() {
        let mut d = display();
        let mut low = Panel::new(GRID, 0, 0, 4, 2);
        low.fill(red(), 'L');
        let mut high = Panel::new(GRID, 2, 0, 4, 2);
        high.putc(0, 0, Style::DEFAULT, 'H');
        d.push(low);
        d.push(high);
        d.refresh().unwrap();

        // High is transparent except (2,0).
        assert_eq!(d.backend().row_text(0), "LLHL    ");
        assert_eq!(d.backend().row_text(1), "LLLL    ");
        assert_eq!(d.backend().screen_style(0, 0), Some(red()));
        assert_eq!(d.resolve(2, 0).map(Visible::character), Some('H'));
        d.pop();
        d.pop();
    }

    #[test]
    fn opaque_panel_hides_everything_beneath() {
        let mut d = display();
        let mut low = Panel::new(GRID, 0, 0, 8, 4);
        low.fill(red(), 'x');
        d.push(low);
        let top = d.push(Panel::centered(GRID, 4, 2));
        d.refresh().unwrap();

        let rect = d.panel(top).unwrap().rect();
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                let (x, y) = (u16::try_from(x).unwrap(), u16::try_from(y).unwrap());
                let v = d.resolve(x, y).unwrap();
                assert_eq!(v, Cell::BLANK.visible());
            }
        }
        assert_eq!(d.backend().row_text(1), "xx    xx");
        d.pop();
        d.pop();
    }

    #[test]
    fn resolve_off_grid_is_none() {
        let d = display();
        assert_eq!(d.resolve(8, 0), None);
        assert_eq!(d.resolve(0, 4), None);
    }

    // ── Diffing ─────────────────────────────────────────────────────────

    #[test]
    fn second_refresh_writes_nothing() {
        let mut d = display();
        d.backend_mut().clear_ops();
        let stats = d.refresh().unwrap();
        assert_eq!(stats.cells_written, 0);
        assert_eq!(stats.moves, 0);
        assert_eq!(stats.total_cells(), GRID.area());
        assert_eq!(d.backend().ops(), &[Op::Flush]);
    }

    #[test]
    fn single_change_is_one_write_and_one_move() {
        let mut d = display();
        let id = d.push(Panel::new(GRID, 0, 0, 8, 4));
        d.refresh().unwrap();
        d.backend_mut().clear_ops();

        d.panel_mut(id).unwrap().putc(5, 2, red(), '@');
        let stats = d.refresh().unwrap();

        assert_eq!(stats.cells_written, 1);
        assert_eq!(stats.moves, 1);
        assert_eq!(
            d.backend().ops(),
            &[
                Op::Move { x: 5, y: 2 },
                Op::Write {
                    x: 5,
                    y: 2,
                    style: red(),
                    ch: '@'
                },
                Op::Flush,
            ]
        );
        d.pop();
    }

    #[test]
    fn adjacent_changes_share_one_move() {
        let mut d = display();
        let id = d.push(Panel::new(GRID, 0, 0, 8, 4));
        d.backend_mut().clear_ops();
        d.panel_mut(id).unwrap().puts(2, 1, red(), "abc");
        let stats = d.refresh().unwrap();
        assert_eq!(stats.cells_written, 3);
        assert_eq!(stats.moves, 1);
        assert_eq!(d.backend().row_text(1), "  abc   ");
        d.pop();
    }

    #[test]
    fn row_wrap_needs_a_move() {
        let mut d = display();
        let id = d.push(Panel::new(GRID, 0, 0, 8, 4));
        d.backend_mut().clear_ops();
        let p = d.panel_mut(id).unwrap();
        p.putc(7, 0, red(), 'a');
        p.putc(0, 1, red(), 'b');
        let stats = d.refresh().unwrap();
        assert_eq!(stats.cells_written, 2);
        assert_eq!(stats.moves, 2);
        d.pop();
    }

    #[test]
    fn style_only_change_is_rewritten() {
        let mut d = display();
        let id = d.push(Panel::new(GRID, 0, 0, 8, 4));
        d.backend_mut().clear_ops();
        d.panel_mut(id).unwrap().attr(1, 1, red());
        let stats = d.refresh().unwrap();
        assert_eq!(stats.cells_written, 1);
        assert_eq!(d.backend().screen_style(1, 1), Some(red()));
        assert_eq!(d.backend().screen_char(1, 1), Some(' '));
        d.pop();
    }

    #[test]
    fn invalidate_forces_full_redraw() {
        let mut d = display();
        d.invalidate();
        d.backend_mut().clear_ops();
        let stats = d.refresh().unwrap();
        assert_eq!(stats.cells_written, GRID.area());
        // One move per row: writes run left to right across each row.
        assert_eq!(stats.moves, usize::from(GRID.height));
        assert_eq!(d.refresh().unwrap().cells_written, 0);
    }

    // ── Stack discipline ────────────────────────────────────────────────

    #[test]
    fn pop_restores_prior_head() {
        let mut d = display();
        let first = d.push(Panel::new(GRID, 0, 0, 2, 2));
        let second = d.push(Panel::new(GRID, 1, 1, 2, 2));
        assert_eq!(d.top(), Some(second));
        assert_eq!(second.depth(), 2);

        let popped = d.pop();
        assert_eq!(popped.rect(), Panel::new(GRID, 1, 1, 2, 2).rect());
        assert_eq!(d.top(), Some(first));
        assert_eq!(d.depth(), 1);
        d.pop();
        assert_eq!(d.top(), None);
    }

    #[test]
    fn popped_ids_go_stale() {
        let mut d = display();
        let old = d.push(Panel::new(GRID, 0, 0, 2, 2));
        d.pop();
        let new = d.push(Panel::new(GRID, 0, 0, 2, 2));
        assert_eq!(old.depth(), new.depth());
        assert!(d.panel(old).is_none());
        assert!(d.panel_mut(old).is_none());
        assert!(d.panel(new).is_some());
        d.pop();
    }

    #[test]
    #[should_panic(expected = "pop of base panel")]
    fn popping_the_base_panics() {
        let mut d = display();
        d.pop();
    }

    #[test]
    #[should_panic(expected = "different grid")]
    fn pushing_a_foreign_panel_panics() {
        let mut d = display();
        d.push(Panel::new(GridSize::new(4, 4), 0, 0, 2, 2));
    }

    #[test]
    fn scoped_pushes_runs_and_pops() {
        let mut d = display();
        let popup = Panel::centered(GRID, 4, 2);
        let (popup, depth) = d.scoped(popup, |d, id| {
            d.panel_mut(id).unwrap().puts(0, 0, red(), "ok");
            d.refresh().unwrap();
            d.depth()
        });
        assert_eq!(depth, 1);
        assert_eq!(d.depth(), 0);
        assert_eq!(popup.getc(0, 0), Some('o'));
        assert_eq!(d.backend().row_text(1), "  ok    ");

        d.refresh().unwrap();
        assert_eq!(d.backend().row_text(1), "        ");
    }

    #[test]
    #[should_panic(expected = "no longer on top")]
    fn scoped_rejects_unbalanced_closure() {
        let mut d = display();
        let _ = d.scoped(Panel::new(GRID, 0, 0, 1, 1), |d, _| {
            d.push(Panel::new(GRID, 0, 0, 1, 1));
        });
    }

    // ── Scenarios ───────────────────────────────────────────────────────

    #[test]
    fn replacing_a_panel_reveals_what_is_beneath() {
        let mut d = display();

        let mut first = Panel::new(GRID, 0, 0, 4, 3);
        first.fill(Style::DEFAULT, ' ');
        first.putc(0, 0, red(), 'A');
        d.push(first);
        d.refresh().unwrap();
        assert_eq!(d.backend().screen_char(0, 0), Some('A'));
        d.pop();

        let mut second = Panel::new(GRID, 0, 0, 2, 2);
        second.fill(Style::new(Color::Green, Color::Black), 'B');
        d.push(second);
        d.refresh().unwrap();

        assert_eq!(d.backend().screen_char(0, 0), Some('B'));
        assert_eq!(
            d.backend().screen_style(0, 0),
            Some(Style::new(Color::Green, Color::Black))
        );
        // Outside the second panel: back to the base.
        assert_eq!(d.backend().screen_char(3, 2), Some(' '));
        assert_eq!(d.backend().screen_style(3, 2), Some(Style::DEFAULT));
        d.pop();
    }

    #[test]
    fn markup_reaches_the_screen_styled() {
        let mut d = display();
        let mut p = Panel::new(GRID, 0, 0, 8, 1);
        p.print(0, 0, "Rk{X}plain").unwrap();
        d.push(p);
        d.refresh().unwrap();

        let b = d.backend();
        assert_eq!(b.row_text(0), "Xplain  ");
        assert_eq!(b.screen_style(0, 0), Style::from_letters('R', 'k'));
        for x in 1..6 {
            assert_eq!(b.screen_style(x, 0), Some(Style::DEFAULT));
        }
        d.pop();
    }

    // ── Input ───────────────────────────────────────────────────────────

    #[test]
    fn getch_refreshes_before_reading() {
        let backend = MemoryBackend::new(GRID).with_keys([KeyEvent::plain(KeyCode::Char('q'))]);
        let mut d = Display::new(backend, DisplayConfig::new(GRID)).unwrap();
        let id = d.push(Panel::new(GRID, 0, 0, 8, 4));
        d.panel_mut(id).unwrap().puts(0, 0, red(), "hi");
        d.backend_mut().clear_ops();

        let key = d.getch().unwrap();

        assert_eq!(key.code, KeyCode::Char('q'));
        assert_eq!(d.backend().row_text(0), "hi      ");
        // Both glyphs are written and flushed before the read.
        let ops = d.backend().ops();
        assert_eq!(ops.last(), Some(&Op::ReadKey));
        assert_eq!(ops[ops.len() - 2], Op::Flush);
        assert_eq!(d.backend().writes(), 2);
        d.pop();
    }

    #[test]
    fn getch_without_input_is_eof() {
        let mut d = display();
        d.backend_mut().clear_ops();
        let err = d.getch().unwrap_err();
        assert!(err.is_eof());
        assert_eq!(d.backend().ops(), &[Op::Flush, Op::ReadKey]);
    }

    #[test]
    fn poll_key_times_out_empty() {
        let mut d = display();
        d.backend_mut().clear_ops();
        assert_eq!(d.poll_key(Duration::ZERO).unwrap(), None);
        assert_eq!(d.backend().ops(), &[Op::Flush, Op::HasInput]);

        d.backend_mut().push_key(KeyEvent::plain(KeyCode::Up));
        let key = d.poll_key(Duration::ZERO).unwrap().unwrap();
        assert_eq!(key.code, KeyCode::Up);
    }

    #[test]
    fn poll_key_refreshes_before_waiting() {
        let mut d = display();
        let id = d.push(Panel::new(GRID, 0, 0, 8, 4));
        d.panel_mut(id).unwrap().putc(3, 1, red(), '@');
        d.backend_mut().push_key(KeyEvent::plain(KeyCode::Enter));
        d.backend_mut().clear_ops();

        let key = d.poll_key(Duration::ZERO).unwrap();

        assert_eq!(key.map(|k| k.code), Some(KeyCode::Enter));
        assert_eq!(
            d.backend().ops(),
            &[
                Op::Move { x: 3, y: 1 },
                Op::Write {
                    x: 3,
                    y: 1,
                    style: red(),
                    ch: '@',
                },
                Op::Flush,
                Op::HasInput,
                Op::ReadKey,
            ]
        );
        d.pop();
    }

    // ── Shutdown ────────────────────────────────────────────────────────

    #[test]
    fn drop_shows_cursor_below_the_grid() {
        let mut backend = MemoryBackend::new(GRID);
        {
            let _display = Display::new(&mut backend, DisplayConfig::new(GRID)).unwrap();
        }
        let ops = backend.ops();
        let tail = &ops[ops.len() - 3..];
        assert_eq!(
            tail,
            &[
                Op::CursorVisible(true),
                Op::Move { x: 0, y: GRID.height },
                Op::Flush,
            ]
        );
        assert!(backend.cursor().visible);
    }

    #[test]
    #[should_panic(expected = "panels still pushed")]
    fn drop_with_pushed_panels_panics() {
        let mut d = display();
        d.push(Panel::new(GRID, 0, 0, 1, 1));
    }

    #[test]
    fn drop_with_pushed_panels_restores_before_panicking() {
        let mut backend = MemoryBackend::new(GRID);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let mut d = Display::new(&mut backend, DisplayConfig::new(GRID)).unwrap();
            d.push(Panel::new(GRID, 0, 0, 1, 1));
        }));
        assert!(result.is_err());

        let ops = backend.ops();
        assert_eq!(
            &ops[ops.len() - 3..],
            &[
                Op::CursorVisible(true),
                Op::Move { x: 0, y: GRID.height },
                Op::Flush,
            ]
        );
    }

    #[test]
    fn drop_while_unwinding_does_not_abort() {
        let result = std::panic::catch_unwind(|| {
            let mut d = display();
            d.push(Panel::new(GRID, 0, 0, 1, 1));
            panic!("caller bug");
        });
        assert!(result.is_err());
    }

    // ── Properties ──────────────────────────────────────────────────────

    fn arb_panel() -> impl Strategy<Value = Panel> {
        (
            0i32..8,
            0i32..4,
            1u16..=8,
            1u16..=4,
            prop::collection::vec((0i32..8, 0i32..4, prop::char::range('a', 'z')), 0..16),
        )
            .prop_map(|(x, y, w, h, writes)| {
                let mut p = Panel::new(GRID, x, y, w, h);
                for (cx, cy, ch) in writes {
                    p.putc(cx, cy, Style::DEFAULT, ch);
                }
                p
            })
    }

    /// Topmost `getc` hit, looked up through each panel's local coordinates.
    fn expected_char(panels: &[Panel], gx: u16, gy: u16) -> char {
        panels
            .iter()
            .rev()
            .find_map(|p| p.getc(i32::from(gx) - p.x(), i32::from(gy) - p.y()))
            .unwrap_or(' ')
    }

    proptest! {
        #[test]
        fn screen_matches_topmost_opaque_panel(panels in prop::collection::vec(arb_panel(), 0..5)) {
            let mut d = display();
            for p in panels.clone() {
                d.push(p);
            }
            d.refresh().unwrap();

            for gy in 0..GRID.height {
                for gx in 0..GRID.width {
                    let want = expected_char(&panels, gx, gy);
                    prop_assert_eq!(d.resolve(gx, gy).map(Visible::character), Some(want));
                    prop_assert_eq!(d.backend().screen_char(gx, gy), Some(want));
                }
            }
            while d.depth() > 0 {
                d.pop();
            }
        }

        #[test]
        fn refresh_writes_exactly_the_changed_cells(
            panels in prop::collection::vec(arb_panel(), 1..4),
            edits in prop::collection::vec((0i32..8, 0i32..4, prop::char::range('A', 'Z')), 0..10),
        ) {
            let mut d = display();
            let mut top = None;
            for p in panels {
                top = Some(d.push(p));
            }
            d.refresh().unwrap();

            let before: Vec<_> = (0..GRID.height)
                .flat_map(|y| (0..GRID.width).map(move |x| (x, y)))
                .map(|(x, y)| d.resolve(x, y))
                .collect();
            let panel = d.panel_mut(top.unwrap()).unwrap();
            for (x, y, ch) in edits {
                panel.putc(x, y, Style::DEFAULT, ch);
            }
            let changed = (0..GRID.height)
                .flat_map(|y| (0..GRID.width).map(move |x| (x, y)))
                .zip(&before)
                .filter(|&((x, y), old)| d.resolve(x, y) != *old)
                .count();

            d.backend_mut().clear_ops();
            let stats = d.refresh().unwrap();
            prop_assert_eq!(stats.cells_written, changed);
            prop_assert_eq!(d.backend().writes(), changed);
            prop_assert!(stats.moves <= stats.cells_written);
            prop_assert_eq!(d.refresh().unwrap().cells_written, 0);

            while d.depth() > 0 {
                d.pop();
            }
        }
    }
}
