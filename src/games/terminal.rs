use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use log::debug;
use std::io::{self, Stdout, Write};
use std::time::Duration;

/// Raw mode, alternate screen and mouse capture for the whole session.
/// Everything is undone on drop, including on error paths.
pub struct TerminalGuard
{
    stdout: Stdout,
    key_release: bool,
}

impl TerminalGuard
{
    pub fn enter() -> io::Result<Self>
    {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(stdout, EnterAlternateScreen, Hide, EnableMouseCapture)?;

        let key_release = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if key_release {
            execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        debug!("Terminal session started (key release events: {key_release})");

        Ok(Self { stdout, key_release })
    }

    /// Whether the terminal reports key releases, which lets screens track
    /// held keys exactly.
    pub fn reports_key_release(&self) -> bool
    {
        self.key_release
    }

    pub fn draw_lines(&mut self, lines: &[String]) -> Result<(), String>
    {
        let output = format!("{}\r\n", lines.join("\r\n"));
        queue!(self.stdout, MoveTo(0, 0), Clear(ClearType::All))
            .map_err(|err| err.to_string())?;
        self.stdout
            .write_all(output.as_bytes())
            .map_err(|err| err.to_string())?;
        self.stdout.flush().map_err(|err| err.to_string())?;
        Ok(())
    }
}

impl Drop for TerminalGuard
{
    fn drop(&mut self)
    {
        if self.key_release {
            let _ = execute!(self.stdout, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(self.stdout, DisableMouseCapture, Show, LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
    }
}

pub fn size() -> (u16, u16)
{
    terminal::size().unwrap_or((80, 24))
}

/// Block until Space is pressed, discarding anything queued before.
pub fn wait_for_space() -> Result<(), String>
{
    while event::poll(Duration::from_millis(0)).map_err(|err| err.to_string())? {
        let _ = event::read().map_err(|err| err.to_string())?;
    }

    loop {
        if event::poll(Duration::from_millis(50)).map_err(|err| err.to_string())? {
            if let Event::Key(KeyEvent {
                code: KeyCode::Char(' '),
                kind: KeyEventKind::Press,
                ..
            }) = event::read().map_err(|err| err.to_string())?
            {
                break;
            }
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rgb
{
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb
{
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };
    pub const GRAY: Rgb = Rgb { r: 136, g: 136, b: 136 };
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell
{
    ch: char,
    fg: Option<Rgb>,
    bg: Option<Rgb>,
}

const BLANK: Cell = Cell {
    ch: ' ',
    fg: None,
    bg: None,
};

/// Character grid that renders to ANSI-colored lines.
pub struct Canvas
{
    width: usize,
    rows: Vec<Vec<Cell>>,
}

impl Canvas
{
    pub fn new(width: usize, height: usize) -> Self
    {
        Self {
            width,
            rows: vec![vec![BLANK; width]; height],
        }
    }

    pub fn put(&mut self, col: i64, row: i64, ch: char, fg: Option<Rgb>, bg: Option<Rgb>)
    {
        if col < 0 || row < 0 {
            return;
        }
        let (col, row) = (col as usize, row as usize);
        if row >= self.rows.len() || col >= self.width {
            return;
        }
        let cell = &mut self.rows[row][col];
        cell.ch = ch;
        if fg.is_some() {
            cell.fg = fg;
        }
        if bg.is_some() {
            cell.bg = bg;
        }
    }

    /// Fill `[col0, col1) x [row0, row1)` with a background color.
    pub fn fill(&mut self, col0: i64, row0: i64, col1: i64, row1: i64, bg: Rgb)
    {
        for row in row0..row1 {
            for col in col0..col1 {
                self.put(col, row, ' ', None, Some(bg));
            }
        }
    }

    pub fn text(&mut self, col: i64, row: i64, text: &str, fg: Option<Rgb>)
    {
        for (offset, ch) in text.chars().enumerate() {
            self.put(col + offset as i64, row, ch, fg, None);
        }
    }

    pub fn lines(&self) -> Vec<String>
    {
        self.rows.iter().map(|row| render_row(row)).collect()
    }
}

fn render_row(row: &[Cell]) -> String
{
    let mut line = String::with_capacity(row.len() + 16);
    let mut active: (Option<Rgb>, Option<Rgb>) = (None, None);
    for cell in row {
        if (cell.fg, cell.bg) != active {
            line.push_str("\x1b[0m");
            if let Some(color) = cell.fg {
                line.push_str(&format!("\x1b[38;2;{};{};{}m", color.r, color.g, color.b));
            }
            if let Some(color) = cell.bg {
                line.push_str(&format!("\x1b[48;2;{};{};{}m", color.r, color.g, color.b));
            }
            active = (cell.fg, cell.bg);
        }
        line.push(cell.ch);
    }
    if active != (None, None) {
        line.push_str("\x1b[0m");
    }
    line
}
