use super::terminal::{self, Canvas, Rgb, TerminalGuard};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const FIELD_WIDTH: i32 = 1900;
pub const FIELD_HEIGHT: i32 = 950;
pub const PADDLE_WIDTH: i32 = 15;
pub const PADDLE_HEIGHT: i32 = 150;
pub const PADDLE_STEP: i32 = 15;
pub const BALL_SIZE: i32 = 10;
pub const WIN_SCORE: u32 = 10;
const LEFT_PADDLE_X: i32 = 5;
const RIGHT_PADDLE_X: i32 = 1880;
const PADDLE_START_Y: i32 = 400;
const BALL_START: (i32, i32) = (945, 470);
const BALL_VELOCITY: (i32, i32) = (-14, -3);
const TICK_MS: u64 = 33;
/// Without release events a key counts as held this long after its last
/// press or repeat.
const HOLD_WINDOW: Duration = Duration::from_millis(120);
const HEADER_LINES: u16 = 2;
const FOOTER_LINES: u16 = 1;

const FIELD_BG: Rgb = Rgb { r: 0, g: 0, b: 0 };

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect
{
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect
{
    pub fn overlaps(&self, other: &Rect) -> bool
    {
        self.x < other.x + other.w
            && other.x < self.x + self.w
            && self.y < other.y + other.h
            && other.y < self.y + self.h
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side
{
    Left,
    Right,
}

impl Side
{
    fn index(self) -> usize
    {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paddle
{
    pub x: i32,
    pub y: i32,
}

impl Paddle
{
    pub fn bounds(&self) -> Rect
    {
        Rect {
            x: self.x,
            y: self.y,
            w: PADDLE_WIDTH,
            h: PADDLE_HEIGHT,
        }
    }

    fn shift(&mut self, dy: i32)
    {
        self.y = (self.y + dy).clamp(0, FIELD_HEIGHT - PADDLE_HEIGHT);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ball
{
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
}

impl Ball
{
    pub fn bounds(&self) -> Rect
    {
        Rect {
            x: self.x,
            y: self.y,
            w: BALL_SIZE,
            h: BALL_SIZE,
        }
    }
}

/// Paddle directions requested for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Controls
{
    pub left_up: bool,
    pub left_down: bool,
    pub right_up: bool,
    pub right_down: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickEvent
{
    Rally,
    Point(Side),
    Finished(Side),
}

pub struct Match
{
    left: Paddle,
    right: Paddle,
    ball: Ball,
    scores: [u32; 2],
    winner: Option<Side>,
    rng: StdRng,
}

impl Match
{
    pub fn new() -> Self
    {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self
    {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self
    {
        Self {
            left: Paddle {
                x: LEFT_PADDLE_X,
                y: PADDLE_START_Y,
            },
            right: Paddle {
                x: RIGHT_PADDLE_X,
                y: PADDLE_START_Y,
            },
            ball: Ball {
                x: BALL_START.0,
                y: BALL_START.1,
                dx: BALL_VELOCITY.0,
                dy: BALL_VELOCITY.1,
            },
            scores: [0, 0],
            winner: None,
            rng,
        }
    }

    pub fn paddle(&self, side: Side) -> &Paddle
    {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn ball(&self) -> &Ball
    {
        &self.ball
    }

    pub fn score(&self, side: Side) -> u32
    {
        self.scores[side.index()]
    }

    pub fn winner(&self) -> Option<Side>
    {
        self.winner
    }

    /// One fixed-interval update. A finished match no longer changes.
    pub fn tick(&mut self, controls: Controls) -> TickEvent
    {
        if let Some(winner) = self.winner {
            return TickEvent::Finished(winner);
        }

        move_paddle(&mut self.left, controls.left_up, controls.left_down);
        move_paddle(&mut self.right, controls.right_up, controls.right_down);

        self.ball.x += self.ball.dx;
        self.ball.y += self.ball.dy;

        let floor = FIELD_HEIGHT - BALL_SIZE;
        if self.ball.y <= 0 || self.ball.y >= floor {
            self.ball.dy = -self.ball.dy;
            self.ball.y = self.ball.y.clamp(0, floor);
        }

        let ball = self.ball.bounds();
        if self.ball.dx < 0 && ball.overlaps(&self.left.bounds()) {
            self.ball.dx = -self.ball.dx;
        } else if self.ball.dx > 0 && ball.overlaps(&self.right.bounds()) {
            self.ball.dx = -self.ball.dx;
        }

        let scorer = if self.ball.x + BALL_SIZE <= 0 {
            Some(Side::Right)
        } else if self.ball.x >= FIELD_WIDTH {
            Some(Side::Left)
        } else {
            None
        };

        let Some(scorer) = scorer else {
            return TickEvent::Rally;
        };

        self.scores[scorer.index()] += 1;
        self.recenter();
        info!(
            "Point to {:?}: {} - {}",
            scorer, self.scores[0], self.scores[1]
        );

        if self.scores[scorer.index()] >= WIN_SCORE {
            self.winner = Some(scorer);
            return TickEvent::Finished(scorer);
        }
        TickEvent::Point(scorer)
    }

    /// Back to the center, still heading towards the side that conceded.
    fn recenter(&mut self)
    {
        self.ball.x = BALL_START.0;
        self.ball.y = BALL_START.1;
        let dy = self.ball.dy.abs().max(1);
        self.ball.dy = if self.rng.gen_bool(0.5) { dy } else { -dy };
    }
}

impl Default for Match
{
    fn default() -> Self
    {
        Self::new()
    }
}

fn move_paddle(paddle: &mut Paddle, up: bool, down: bool)
{
    if up {
        paddle.shift(-PADDLE_STEP);
    }
    if down {
        paddle.shift(PADDLE_STEP);
    }
}

/// Keys currently held. With release reporting a key is held until its
/// release arrives; otherwise it expires `HOLD_WINDOW` after the last press.
struct HeldKeys
{
    pressed: HashMap<KeyCode, Instant>,
    reports_release: bool,
}

impl HeldKeys
{
    fn new(reports_release: bool) -> Self
    {
        Self {
            pressed: HashMap::new(),
            reports_release,
        }
    }

    fn press(&mut self, code: KeyCode, now: Instant)
    {
        self.pressed.insert(normalize(code), now);
    }

    fn release(&mut self, code: KeyCode)
    {
        self.pressed.remove(&normalize(code));
    }

    fn is_held(&self, code: KeyCode, now: Instant) -> bool
    {
        match self.pressed.get(&code) {
            Some(_) if self.reports_release => true,
            Some(at) => now.saturating_duration_since(*at) < HOLD_WINDOW,
            None => false,
        }
    }

    fn controls(&self, now: Instant) -> Controls
    {
        Controls {
            left_up: self.is_held(KeyCode::Char('w'), now),
            left_down: self.is_held(KeyCode::Char('s'), now),
            right_up: self.is_held(KeyCode::Up, now),
            right_down: self.is_held(KeyCode::Down, now),
        }
    }
}

fn normalize(code: KeyCode) -> KeyCode
{
    match code {
        KeyCode::Char(ch) => KeyCode::Char(ch.to_ascii_lowercase()),
        other => other,
    }
}

pub struct PongSummary
{
    pub winner: Option<Side>,
    pub left: u32,
    pub right: u32,
}

pub fn run_pong(term: &mut TerminalGuard, left_name: &str) -> Result<PongSummary, String>
{
    let mut game = Match::new();
    let mut keys = HeldKeys::new(term.reports_key_release());
    let mut paused = false;
    let mut last_tick = Instant::now();
    let start = Instant::now();
    info!("Match started");

    loop {
        let now = Instant::now();
        while event::poll(Duration::from_millis(0)).map_err(|err| err.to_string())? {
            if let Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) = event::read().map_err(|err| err.to_string())?
            {
                if kind == KeyEventKind::Release {
                    keys.release(code);
                    continue;
                }
                match code {
                    KeyCode::Esc => return Ok(summary(&game)),
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(summary(&game));
                    }
                    KeyCode::Char('p') | KeyCode::Char('P') if kind == KeyEventKind::Press => {
                        paused = !paused;
                    }
                    _ => keys.press(code, now),
                }
            }
        }

        if last_tick.elapsed() >= Duration::from_millis(TICK_MS) {
            if !paused {
                if let TickEvent::Finished(side) = game.tick(keys.controls(now)) {
                    info!(
                        "Match finished after {:.1}s, winner {:?}",
                        start.elapsed().as_secs_f32(),
                        side
                    );
                    break;
                }
            }
            draw_field(term, &game, left_name, paused)?;
            last_tick = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    draw_summary(term, &game, left_name)?;
    terminal::wait_for_space()?;
    Ok(summary(&game))
}

fn summary(game: &Match) -> PongSummary
{
    PongSummary {
        winner: game.winner(),
        left: game.score(Side::Left),
        right: game.score(Side::Right),
    }
}

fn player_name(side: Side, left_name: &str) -> String
{
    match side {
        Side::Left => left_name.to_string(),
        Side::Right => "Player 2".to_string(),
    }
}

fn draw_field(
    term: &mut TerminalGuard,
    game: &Match,
    left_name: &str,
    paused: bool,
) -> Result<(), String>
{
    let (cols, rows) = terminal::size();
    let width = (cols as i64).max(10);
    let height = (rows.saturating_sub(HEADER_LINES + FOOTER_LINES) as i64).max(5);
    let col_of = |x: i32| x as i64 * width / FIELD_WIDTH as i64;
    let row_of = |y: i32| y as i64 * height / FIELD_HEIGHT as i64;

    let mut canvas = Canvas::new(width as usize, height as usize);
    canvas.fill(0, 0, width, height, FIELD_BG);
    for row in (0..height).step_by(2) {
        canvas.put(width / 2, row, '¦', Some(Rgb::GRAY), None);
    }

    for side in [Side::Left, Side::Right] {
        let paddle = game.paddle(side).bounds();
        let col = col_of(paddle.x);
        canvas.fill(
            col,
            row_of(paddle.y),
            (col_of(paddle.x + paddle.w)).max(col + 1),
            row_of(paddle.y + paddle.h).max(row_of(paddle.y) + 1),
            Rgb::WHITE,
        );
    }
    let ball = game.ball();
    canvas.put(
        col_of(ball.x + BALL_SIZE / 2),
        row_of(ball.y + BALL_SIZE / 2),
        '●',
        Some(Rgb::WHITE),
        None,
    );

    if paused {
        canvas.text(width / 2 - 3, height / 2, "PAUSED", Some(Rgb::WHITE));
    }

    let mut lines = vec![
        format!(
            "{} (W/S)  {}  :  {}  Player 2 (Up/Down)",
            left_name,
            game.score(Side::Left),
            game.score(Side::Right)
        ),
        format!("First to {WIN_SCORE} wins."),
    ];
    lines.extend(canvas.lines());
    lines.push(if paused {
        "Paused. P resumes, Esc quits.".to_string()
    } else {
        "P pauses, Esc quits.".to_string()
    });
    term.draw_lines(&lines)
}

fn draw_summary(term: &mut TerminalGuard, game: &Match, left_name: &str) -> Result<(), String>
{
    let mut lines = vec!["Game over".to_string(), String::new()];
    if let Some(side) = game.winner() {
        lines.push(format!("Winner: {}", player_name(side, left_name)));
    }
    lines.push(format!(
        "Score: {} {} - {} Player 2",
        left_name,
        game.score(Side::Left),
        game.score(Side::Right)
    ));
    lines.push(String::new());
    lines.push("Press SPACE to exit.".to_string());
    term.draw_lines(&lines)
}
