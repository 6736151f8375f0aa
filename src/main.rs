// SPDX-License-Identifier: MIT
//
// gcom: interactive demonstration of the Goblin-COM panel compositor.
//
// Wires gcom-term's Display to the real terminal and exercises every layer
// of the stack:
//
//   ┌──────────────────────────────────────────┬──────────────┐
//   │ world (animated water)                   │ side menu    │
//   │   + overlay (cursor highlight, select)   │ (markup)     │
//   │                                          │              │
//   │            ┌──────────────┐              │              │
//   │            │ popup        │              │              │
//   │            └──────────────┘              │              │
//   └──────────────────────────────────────────┴──────────────┘
//
// Keys:
//
//   s        select a map location (arrows/Home/End/PgUp/PgDn, Enter)
//   p        popup message
//   R        invalidate: redraw every cell
//   q, Esc   quit (asks first); Ctrl-C quits at once
//
// Everything but `main` is generic over the backend, so the tests below
// drive it through the in-memory backend with scripted keys.
//
// Logging: set GCOM_LOG=<file> to write tracing output there. The terminal
// belongs to the UI, so nothing is ever logged to it.

use std::env;
use std::fs::File;
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use gcom_term::backend::Backend;
use gcom_term::display::{Display, DisplayConfig, PanelId};
use gcom_term::input::{KeyCode, KeyEvent};
use gcom_term::panel::{GridSize, Panel};
use gcom_term::style::{Color, Style};
use gcom_term::terminal::{self, TerminalBackend};
use gcom_term::Result;
use tracing::{Level, debug, info};

// ─── Layout ─────────────────────────────────────────────────────────────────

const GRID: GridSize = GridSize::DEFAULT;
const SIDEMENU_WIDTH: u16 = 20;
const MAP_WIDTH: u16 = GRID.width - SIDEMENU_WIDTH;
const MAP_HEIGHT: u16 = GRID.height;

const FPS: u64 = 15;
const PERIOD: Duration = Duration::from_micros(1_000_000 / FPS);

const TITLE: &str = "Goblin-COM";

fn water_style() -> Style {
    Style::new(Color::White, Color::Blue)
}

fn highlight_style() -> Style {
    Style::new(Color::White, Color::Red).with_fg_bright(true)
}

// ─── Keys ───────────────────────────────────────────────────────────────────

fn is_exit_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Char('q' | 'Q') | KeyCode::Escape) || key.is_interrupt()
}

fn is_confirm_key(key: KeyEvent) -> bool {
    matches!(key.code, KeyCode::Enter | KeyCode::Char(' '))
}

// ─── Drawing ────────────────────────────────────────────────────────────────

/// Rolling waves: every fourth diagonal carries a crest, shifted each frame.
fn draw_water(world: &mut Panel, frame: u64) {
    let style = water_style();
    for y in 0..i32::from(world.height()) {
        for x in 0..i32::from(world.width()) {
            let phase = u64::from(x.unsigned_abs() + y.unsigned_abs()) + frame;
            let ch = if phase % 4 == 0 { '~' } else { ' ' };
            world.putc(x, y, style, ch);
        }
    }
}

fn draw_sidemenu(menu: &mut Panel, frame: u64) -> Result<()> {
    let title = Style::new(Color::White, Color::Black);
    menu.fill(title, ' ');
    menu.border(title);
    menu.puts(5, 1, title, TITLE);

    menu.printf(2, 3, format_args!("Frame: Yk{{{frame}}}"))?;
    menu.printf(2, 4, format_args!("Rate:  Yk{{{FPS}}}wk{{/s}}"))?;

    let mut y = 8;
    for line in [
        "Kk{♦}   wk{Rk{S}elect}    Kk{♦}",
        "Kk{♦}   wk{Rk{P}opup}     Kk{♦}",
        "Kk{♦}   wk{Rk{R}edraw}    Kk{♦}",
        "Kk{♦}   wk{Rk{Q}uit}      Kk{♦}",
    ] {
        menu.print(2, y, line)?;
        y += 1;
    }
    Ok(())
}

/// A side panel that covers the menu with one centred message.
///
/// Returns the panel and the row the message is on.
fn sideinfo(message: &str) -> Result<(Panel, i32)> {
    let dim = Style::new(Color::Black, Color::Black).with_fg_bright(true);
    let mut info = Panel::new(GRID, i32::from(MAP_WIDTH), 0, SIDEMENU_WIDTH, GRID.height);
    info.fill(dim, '░');
    info.border(dim);

    let y = i32::from(GRID.height / 2) - 1;
    let len = i32::try_from(Panel::strlen(message)).unwrap_or(i32::MAX);
    let x = i32::from(info.width() / 2) - len / 2 - 1;
    info.print(x, y, message)?;
    Ok((info, y))
}

/// A centred, opaque panel just large enough for one line of markup.
fn popup_panel(message: &str) -> Result<Panel> {
    let len = u16::try_from(Panel::strlen(message)).unwrap_or(u16::MAX);
    let width = len.saturating_add(2).min(GRID.width);
    let mut popup = Panel::centered(GRID, width, 3);
    popup.print(1, 1, message)?;
    Ok(popup)
}

// ─── Demo ───────────────────────────────────────────────────────────────────

/// The running demonstration: the two permanent panels and the animation.
struct Demo {
    world: PanelId,
    menu: PanelId,
    frame: u64,
    cursor: (i32, i32),
}

impl Demo {
    /// Push the world and the side menu.
    fn open<B: Backend>(display: &mut Display<B>) -> Result<Self> {
        let world = display.push(Panel::new(GRID, 0, 0, MAP_WIDTH, MAP_HEIGHT));
        let menu = display.push(Panel::new(
            GRID,
            i32::from(MAP_WIDTH),
            0,
            SIDEMENU_WIDTH,
            GRID.height,
        ));
        let mut demo = Self {
            world,
            menu,
            frame: 0,
            cursor: (i32::from(MAP_WIDTH / 2), i32::from(MAP_HEIGHT / 2)),
        };
        if let Err(e) = demo.draw(display) {
            demo.close(display);
            return Err(e);
        }
        Ok(demo)
    }

    /// Pop the side menu and the world, in reverse push order.
    fn close<B: Backend>(self, display: &mut Display<B>) {
        debug_assert_eq!(display.top(), Some(self.menu));
        display.pop();
        display.pop();
    }

    fn draw<B: Backend>(&mut self, display: &mut Display<B>) -> Result<()> {
        if let Some(world) = display.panel_mut(self.world) {
            draw_water(world, self.frame);
        }
        if let Some(menu) = display.panel_mut(self.menu) {
            draw_sidemenu(menu, self.frame)?;
        }
        Ok(())
    }

    /// Animate until a key arrives.
    fn getch<B: Backend>(&mut self, display: &mut Display<B>) -> Result<KeyEvent> {
        loop {
            self.draw(display)?;
            if let Some(key) = display.poll_key(PERIOD)? {
                return Ok(key);
            }
            self.frame += 1;
        }
    }

    /// Main loop. Returns when the player quits.
    fn run<B: Backend>(&mut self, display: &mut Display<B>) -> Result<()> {
        loop {
            let key = self.getch(display)?;
            if key.is_interrupt() {
                return Ok(());
            }
            match key.code {
                KeyCode::Char('s') => {
                    if let Some((x, y)) = self.select_position(display)? {
                        let message = format!("Selected Yk{{{x}}},Yk{{{y}}}");
                        self.popup_message(display, &message)?;
                    }
                }
                KeyCode::Char('p') => {
                    self.popup_message(display, "Rk{Cool} beans!")?;
                }
                KeyCode::Char('R') => display.invalidate(),
                KeyCode::Char('q' | 'Q') | KeyCode::Escape => {
                    if self.popup_quit(display)? {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }

    /// Show `message` until it is dismissed.
    fn popup_message<B: Backend>(&mut self, display: &mut Display<B>, message: &str) -> Result<()> {
        let popup = popup_panel(message)?;
        let (_, result) = display.scoped(popup, |display, _| loop {
            match self.getch(display) {
                Ok(key) if is_exit_key(key) || is_confirm_key(key) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(e),
            }
        });
        result
    }

    /// Ask before quitting. `true` = quit.
    fn popup_quit<B: Backend>(&mut self, display: &mut Display<B>) -> Result<bool> {
        let popup = popup_panel("Really quit? (Rk{y}/Rk{n})")?;
        let (_, key) = display.scoped(popup, |display, _| self.getch(display));
        let key = key?;
        Ok(matches!(key.code, KeyCode::Char('y' | 'Y')) || key.is_interrupt())
    }

    /// Move a highlight over the map; Enter picks the cell under it.
    fn select_position<B: Backend>(
        &mut self,
        display: &mut Display<B>,
    ) -> Result<Option<(i32, i32)>> {
        let (mut info, row) = sideinfo("Yk{Select Location}")?;
        info.print(5, row + 1, "Use Rk{←↑→↓}")?;

        let (_, picked) = display.scoped(info, |display, _| {
            let overlay = Panel::new(GRID, 0, 0, MAP_WIDTH, MAP_HEIGHT);
            let (_, picked) = display.scoped(overlay, |display, overlay| {
                self.select_loop(display, overlay)
            });
            picked
        });
        let picked = picked?;
        debug!(?picked, "selection finished");
        Ok(picked)
    }

    fn select_loop<B: Backend>(
        &mut self,
        display: &mut Display<B>,
        overlay: PanelId,
    ) -> Result<Option<(i32, i32)>> {
        loop {
            self.highlight(display, overlay);
            let key = self.getch(display)?;
            if is_exit_key(key) {
                return Ok(None);
            }
            if key.code == KeyCode::Enter {
                return Ok(Some(self.cursor));
            }
            if let Some((dx, dy)) = key.code.direction() {
                if let Some(panel) = display.panel_mut(overlay) {
                    panel.erase(self.cursor.0, self.cursor.1);
                }
                self.cursor = (
                    (self.cursor.0 + dx).clamp(0, i32::from(MAP_WIDTH) - 1),
                    (self.cursor.1 + dy).clamp(0, i32::from(MAP_HEIGHT) - 1),
                );
            }
        }
    }

    /// Draw the highlight over whatever glyph the world shows at the cursor.
    fn highlight<B: Backend>(&self, display: &mut Display<B>, overlay: PanelId) {
        let (x, y) = self.cursor;
        let glyph = display
            .panel(self.world)
            .and_then(|world| world.getc(x, y))
            .unwrap_or(' ');
        if let Some(panel) = display.panel_mut(overlay) {
            panel.putc(x, y, highlight_style(), glyph);
        }
    }
}

// ─── Entry Point ────────────────────────────────────────────────────────────

/// Send tracing output to the file named by `GCOM_LOG`, if set.
fn init_logging() {
    let Ok(path) = env::var("GCOM_LOG") else {
        return;
    };
    let file = match File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("gcom: cannot open log file {path}: {e}");
            return;
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_max_level(Level::TRACE)
        .try_init();
}

fn run() -> Result<()> {
    let backend = TerminalBackend::new()?;
    let mut display = Display::new(backend, DisplayConfig::new(GRID).with_title(TITLE))?;
    let mut demo = Demo::open(&mut display)?;
    let result = demo.run(&mut display);
    info!(frames = demo.frame, "demo finished");
    demo.close(&mut display);
    result
}

fn main() {
    init_logging();

    if !terminal::is_tty() {
        eprintln!("gcom: stdin is not a terminal");
        process::exit(1);
    }
    if let Some(size) = terminal::get_size() {
        if !size.fits(GRID) {
            eprintln!(
                "gcom: terminal is {}x{}, need at least {}x{}",
                size.width, size.height, GRID.width, GRID.height
            );
            process::exit(1);
        }
    }

    if let Err(e) = run() {
        if !e.is_eof() {
            eprintln!("gcom: {e}");
            process::exit(1);
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use gcom_term::backend::MemoryBackend;
    use gcom_term::input::Modifiers;
    use pretty_assertions::assert_eq;

    // ── Helpers ───────────────────────────────────────────────────────────

    fn press(ch: char) -> KeyEvent {
        KeyEvent::plain(KeyCode::Char(ch))
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::plain(code)
    }

    /// Run the demo against scripted keys. The script must end the run:
    /// with no key pending the demo animates forever.
    ///
    /// Returns the backend and the final highlight position.
    fn run_with(keys: Vec<KeyEvent>) -> (MemoryBackend, (i32, i32)) {
        let mut backend = MemoryBackend::new(GRID).with_keys(keys);
        let cursor = {
            let mut display =
                Display::new(&mut backend, DisplayConfig::new(GRID).with_title(TITLE)).unwrap();
            let mut demo = Demo::open(&mut display).unwrap();
            demo.run(&mut display).unwrap();
            let cursor = demo.cursor;
            demo.close(&mut display);
            assert_eq!(display.depth(), 0);
            cursor
        };
        (backend, cursor)
    }

    // ── Layout ────────────────────────────────────────────────────────────

    #[test]
    fn map_and_menu_tile_the_grid() {
        assert_eq!(MAP_WIDTH + SIDEMENU_WIDTH, GRID.width);
    }

    #[test]
    fn sidemenu_draws_title_and_markup() {
        let mut menu = Panel::new(GRID, i32::from(MAP_WIDTH), 0, SIDEMENU_WIDTH, GRID.height);
        draw_sidemenu(&mut menu, 7).unwrap();
        let row = |y: i32| -> String {
            (0..i32::from(SIDEMENU_WIDTH))
                .map(|x| menu.getc(x, y).unwrap_or(' '))
                .collect()
        };
        assert_eq!(row(1), "│    Goblin-COM    │");
        assert!(row(3).contains("Frame: 7"));
        assert_eq!(
            menu.cell(9, 3).map(|c| c.style),
            Style::from_letters('Y', 'k')
        );
        assert!(row(8).contains("Select"));
    }

    #[test]
    fn water_animates() {
        let mut a = Panel::new(GRID, 0, 0, MAP_WIDTH, MAP_HEIGHT);
        let mut b = a.clone();
        draw_water(&mut a, 0);
        draw_water(&mut b, 1);
        assert_eq!(a.getc(0, 0), Some('~'));
        assert_eq!(b.getc(0, 0), Some(' '));
        assert_eq!(b.getc(3, 0), Some('~'));
    }

    #[test]
    fn sideinfo_centres_its_message() {
        let (info, y) = sideinfo("Yk{Select Location}").unwrap();
        assert_eq!(y, 11);
        // 20 wide, 15 visible: starts at 10 - 7 - 1 = 2.
        assert_eq!(info.getc(1, y), Some('░'));
        assert_eq!(info.getc(2, y), Some('S'));
        assert_eq!(info.getc(16, y), Some('n'));
    }

    #[test]
    fn popup_fits_its_message() {
        let popup = popup_panel("Rk{Cool} beans!").unwrap();
        assert_eq!(popup.width(), 13);
        assert_eq!(popup.height(), 3);
        assert_eq!(popup.getc(1, 1), Some('C'));
    }

    // ── Keys ──────────────────────────────────────────────────────────────

    #[test]
    fn exit_keys() {
        assert!(is_exit_key(press('q')));
        assert!(is_exit_key(press('Q')));
        assert!(is_exit_key(key(KeyCode::Escape)));
        assert!(is_exit_key(KeyEvent {
            code: KeyCode::Char('c'),
            modifiers: Modifiers::CTRL,
        }));
        assert!(!is_exit_key(press('c')));
    }

    // ── Runs ──────────────────────────────────────────────────────────────

    #[test]
    fn quit_after_confirmation() {
        let (backend, _) = run_with(vec![press('q'), press('y')]);
        assert_eq!(backend.title(), Some(TITLE));
        assert!(backend.cursor().visible);
    }

    #[test]
    fn declined_quit_keeps_running() {
        let (mut backend, _) =
            run_with(vec![press('q'), press('n'), key(KeyCode::Escape), press('Y')]);
        // Both prompts consumed their answer.
        assert!(!backend.has_input(Duration::ZERO).unwrap());
    }

    #[test]
    fn ctrl_c_quits_immediately() {
        let (backend, _) = run_with(vec![KeyEvent::ctrl(KeyCode::Char('c'))]);
        assert!(!(0..GRID.height).any(|y| backend.row_text(y).contains("Really quit?")));
    }

    #[test]
    fn quit_prompt_is_on_screen_when_answered() {
        let (backend, _) = run_with(vec![press('p'), key(KeyCode::Enter), press('q'), press('y')]);
        // The prompt sits on the middle row of a centred 3-row popup.
        assert!(backend.row_text(GRID.height / 2).contains("Really quit? (y/n)"));
        assert!(!(0..GRID.height).any(|y| backend.row_text(y).contains("Cool beans!")));
    }

    #[test]
    fn select_moves_the_highlight() {
        let (_, cursor) = run_with(vec![
            press('s'),
            key(KeyCode::Right),
            key(KeyCode::PageDown),
            key(KeyCode::Enter),
            key(KeyCode::Enter),
            press('q'),
            press('y'),
        ]);
        // Start (30, 12), right then down-right.
        assert_eq!(cursor, (32, 13));
    }

    #[test]
    fn highlight_is_clamped_to_the_map() {
        let mut keys = vec![press('s')];
        keys.extend(std::iter::repeat_n(key(KeyCode::Home), 40));
        keys.extend([key(KeyCode::Escape), press('q'), press('y')]);
        let (_, cursor) = run_with(keys);
        assert_eq!(cursor, (0, 0));
    }

    #[test]
    fn invalidate_redraws_the_whole_grid() {
        let mut backend = MemoryBackend::new(GRID).with_keys([press('R'), press('q'), press('y')]);
        {
            let mut display = Display::new(&mut backend, DisplayConfig::new(GRID)).unwrap();
            let mut demo = Demo::open(&mut display).unwrap();
            display.refresh().unwrap();
            display.backend_mut().clear_ops();
            demo.run(&mut display).unwrap();
            demo.close(&mut display);
        }
        assert!(backend.writes() >= GRID.area());
    }
}
