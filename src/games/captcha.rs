use super::terminal::{self, Canvas, Rgb, TerminalGuard};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use log::{debug, info};
use rand::Rng;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

pub const PIECE_SIZE: i32 = 100;
pub const GRID_SIZE: i32 = 2;
pub const SNAP_DISTANCE: i32 = 30;
pub const CANVAS_WIDTH: i32 = 800;
pub const CANVAS_HEIGHT: i32 = 500;
pub const PLAY_AREA: Point = Point { x: 400, y: 100 };
const TILE_COUNT: usize = (GRID_SIZE * GRID_SIZE) as usize;
const START_X: (i32, i32) = (50, 250);
const START_Y: (i32, i32) = (50, 350);
const TICK_MS: u64 = 33;
const HEADER_LINES: u16 = 2;
const FOOTER_LINES: u16 = 1;

const CANVAS_BG: Rgb = Rgb { r: 240, g: 240, b: 240 };
const TILE_BG: Rgb = Rgb::WHITE;
const GRABBED_BG: Rgb = Rgb { r: 255, g: 244, b: 190 };
const INK: Rgb = Rgb { r: 30, g: 30, b: 30 };

const DEFAULT_PICTURE: &str = r"
        \   |   /
      '. \  |  / .'
    --   .-'''-.   --
   ---  /       \  ---
    -- |  O   O  | --
      .|    ^    |.
     / |  \___/  | \
        \       /
   ~~~~~ '-...-' ~~~~~
  ~~~~~~~~~~~~~~~~~~~~~~
 /\  /\    /\      /\  /\
/  \/  \  /  \/\  /  \/  \
";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point
{
    pub x: i32,
    pub y: i32,
}

impl Point
{
    pub const fn new(x: i32, y: i32) -> Self
    {
        Self { x, y }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile
{
    pub id: usize,
    pub cell: (i32, i32),
    pub position: Point,
}

impl Tile
{
    pub fn target(&self) -> Point
    {
        Point::new(
            PLAY_AREA.x + self.cell.0 * PIECE_SIZE,
            PLAY_AREA.y + self.cell.1 * PIECE_SIZE,
        )
    }

    pub fn is_placed(&self) -> bool
    {
        self.position == self.target()
    }

    fn contains(&self, at: Point) -> bool
    {
        at.x >= self.position.x
            && at.x < self.position.x + PIECE_SIZE
            && at.y >= self.position.y
            && at.y < self.position.y + PIECE_SIZE
    }

    fn within_snap(&self) -> bool
    {
        let target = self.target();
        (self.position.x - target.x).abs() < SNAP_DISTANCE
            && (self.position.y - target.y).abs() < SNAP_DISTANCE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DropOutcome
{
    pub snapped: bool,
    pub completed: bool,
}

struct Grab
{
    tile: usize,
    last: Point,
}

/// Four tiles that must be dragged onto a 2x2 grid.
pub struct Board
{
    tiles: Vec<Tile>,
    order: Vec<usize>,
    grab: Option<Grab>,
    completed: bool,
    on_complete: Option<Box<dyn FnMut()>>,
}

impl Board
{
    /// Tile `i` belongs in grid cell `(i % 2, i / 2)` and starts at `start[i]`.
    pub fn new(start: [Point; TILE_COUNT]) -> Self
    {
        let tiles = start
            .iter()
            .enumerate()
            .map(|(id, &position)| Tile {
                id,
                cell: (id as i32 % GRID_SIZE, id as i32 / GRID_SIZE),
                position,
            })
            .collect();
        Self {
            tiles,
            order: (0..TILE_COUNT).collect(),
            grab: None,
            completed: false,
            on_complete: None,
        }
    }

    pub fn shuffled(rng: &mut impl Rng) -> Self
    {
        let mut start = [Point::new(0, 0); TILE_COUNT];
        for point in &mut start {
            *point = Point::new(
                rng.gen_range(START_X.0..=START_X.1),
                rng.gen_range(START_Y.0..=START_Y.1),
            );
        }
        Self::new(start)
    }

    /// Runs once, on the release that first puts every tile in place.
    pub fn on_complete(mut self, hook: impl FnMut() + 'static) -> Self
    {
        self.on_complete = Some(Box::new(hook));
        self
    }

    pub fn tiles(&self) -> &[Tile]
    {
        &self.tiles
    }

    /// Tiles bottom to top.
    pub fn draw_order(&self) -> impl Iterator<Item = &Tile>
    {
        self.order.iter().map(|&idx| &self.tiles[idx])
    }

    pub fn grabbed(&self) -> Option<usize>
    {
        self.grab.as_ref().map(|grab| grab.tile)
    }

    pub fn is_completed(&self) -> bool
    {
        self.completed
    }

    /// Grab the topmost tile under `at` and raise it.
    pub fn press(&mut self, at: Point) -> Option<usize>
    {
        if self.completed {
            return None;
        }
        let pos = self
            .order
            .iter()
            .rposition(|&idx| self.tiles[idx].contains(at))?;
        let tile = self.order.remove(pos);
        self.order.push(tile);
        self.grab = Some(Grab { tile, last: at });
        Some(tile)
    }

    /// Move the grabbed tile by the pointer delta, keeping it on the canvas.
    pub fn drag_to(&mut self, at: Point)
    {
        let Some(grab) = self.grab.as_mut() else {
            return;
        };
        let tile = &mut self.tiles[grab.tile];
        tile.position.x = (tile.position.x + at.x - grab.last.x).clamp(0, CANVAS_WIDTH - PIECE_SIZE);
        tile.position.y =
            (tile.position.y + at.y - grab.last.y).clamp(0, CANVAS_HEIGHT - PIECE_SIZE);
        grab.last = at;
    }

    pub fn release(&mut self) -> Option<DropOutcome>
    {
        let grab = self.grab.take()?;
        let tile = &mut self.tiles[grab.tile];

        let snapped = tile.within_snap();
        if snapped {
            tile.position = tile.target();
        }

        let completed = !self.completed && self.tiles.iter().all(Tile::is_placed);
        if completed {
            self.completed = true;
            if let Some(hook) = self.on_complete.as_mut() {
                hook();
            }
        }

        Some(DropOutcome {
            snapped,
            completed,
        })
    }
}

/// Text art cut into four quadrants, one per tile.
pub struct Picture
{
    rows: Vec<Vec<char>>,
    width: usize,
}

impl Picture
{
    pub fn load(path: Option<&Path>) -> Result<Self, String>
    {
        match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|err| format!("Failed to read picture {}: {err}", path.display()))?;
                Self::parse(&text)
                    .ok_or_else(|| format!("Picture {} is empty", path.display()))
            }
            None => Self::parse(DEFAULT_PICTURE)
                .ok_or_else(|| "Built-in picture is empty".to_string()),
        }
    }

    fn parse(text: &str) -> Option<Self>
    {
        let mut rows: Vec<Vec<char>> = text
            .lines()
            .map(|line| line.trim_end().chars().collect())
            .collect();
        while rows.first().is_some_and(|row| row.is_empty()) {
            rows.remove(0);
        }
        while rows.last().is_some_and(|row| row.is_empty()) {
            rows.pop();
        }
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if rows.is_empty() || width == 0 {
            return None;
        }
        Some(Self { rows, width })
    }

    /// Character at `(col, row)` of a `width x height` rendering of the
    /// quadrant `cell`.
    fn sample(&self, cell: (i32, i32), col: usize, row: usize, width: usize, height: usize) -> char
    {
        let grid = GRID_SIZE as usize;
        let width = width.max(1);
        let height = height.max(1);
        let src_col = (cell.0 as usize * width + col) * self.width / (grid * width);
        let src_row = (cell.1 as usize * height + row) * self.rows.len() / (grid * height);
        self.rows
            .get(src_row)
            .and_then(|line| line.get(src_col))
            .copied()
            .unwrap_or(' ')
    }
}

/// Maps the logical canvas onto the terminal area below the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Viewport
{
    cols: i64,
    rows: i64,
    top: i64,
}

impl Viewport
{
    fn fit(term_cols: u16, term_rows: u16) -> Self
    {
        Self {
            cols: (term_cols as i64).max(1),
            rows: (term_rows.saturating_sub(HEADER_LINES + FOOTER_LINES) as i64).max(1),
            top: HEADER_LINES as i64,
        }
    }

    /// Center of the terminal cell, in canvas units.
    fn to_canvas(&self, col: u16, row: u16) -> Point
    {
        let col = (col as i64).clamp(0, self.cols - 1);
        let row = (row as i64 - self.top).clamp(0, self.rows - 1);
        Point::new(
            ((2 * col + 1) * CANVAS_WIDTH as i64 / (2 * self.cols)) as i32,
            ((2 * row + 1) * CANVAS_HEIGHT as i64 / (2 * self.rows)) as i32,
        )
    }

    fn col_of(&self, x: i32) -> i64
    {
        x as i64 * self.cols / CANVAS_WIDTH as i64
    }

    fn row_of(&self, y: i32) -> i64
    {
        y as i64 * self.rows / CANVAS_HEIGHT as i64
    }
}

pub enum PuzzleOutcome
{
    Solved,
    Abandoned,
}

pub fn run_puzzle(term: &mut TerminalGuard, picture: &Picture) -> Result<PuzzleOutcome, String>
{
    let mut rng = rand::thread_rng();
    let mut board = Board::shuffled(&mut rng).on_complete(|| info!("Picture assembled"));
    let mut last_tick = Instant::now();
    let mut dirty = true;
    debug!("Puzzle started");

    loop {
        let (cols, rows) = terminal::size();
        let viewport = Viewport::fit(cols, rows);

        while event::poll(Duration::from_millis(0)).map_err(|err| err.to_string())? {
            match event::read().map_err(|err| err.to_string())? {
                Event::Key(KeyEvent {
                    code,
                    modifiers,
                    kind: KeyEventKind::Press,
                    ..
                }) => match code {
                    KeyCode::Esc => return Ok(PuzzleOutcome::Abandoned),
                    KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                        return Ok(PuzzleOutcome::Abandoned);
                    }
                    _ => {}
                },
                Event::Mouse(MouseEvent {
                    kind,
                    column,
                    row,
                    ..
                }) => {
                    let at = viewport.to_canvas(column, row);
                    match kind {
                        MouseEventKind::Down(MouseButton::Left) => {
                            board.press(at);
                        }
                        MouseEventKind::Drag(MouseButton::Left) => board.drag_to(at),
                        MouseEventKind::Up(MouseButton::Left) => {
                            if let Some(outcome) = board.release() {
                                debug!("Dropped a tile: {outcome:?}");
                                if outcome.completed {
                                    draw_board(term, &board, picture, viewport)?;
                                    return Ok(PuzzleOutcome::Solved);
                                }
                            }
                        }
                        _ => continue,
                    }
                    dirty = true;
                }
                Event::Resize(_, _) => dirty = true,
                _ => {}
            }
        }

        if dirty && last_tick.elapsed() >= Duration::from_millis(TICK_MS) {
            draw_board(term, &board, picture, viewport)?;
            dirty = false;
            last_tick = Instant::now();
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}

fn draw_board(
    term: &mut TerminalGuard,
    board: &Board,
    picture: &Picture,
    viewport: Viewport,
) -> Result<(), String>
{
    let mut canvas = Canvas::new(viewport.cols as usize, viewport.rows as usize);
    canvas.fill(0, 0, viewport.cols, viewport.rows, CANVAS_BG);

    let area = GRID_SIZE * PIECE_SIZE;
    let (left, top) = (viewport.col_of(PLAY_AREA.x), viewport.row_of(PLAY_AREA.y));
    let (right, bottom) = (
        viewport.col_of(PLAY_AREA.x + area),
        viewport.row_of(PLAY_AREA.y + area),
    );
    canvas.fill(left, top, right, bottom, Rgb::WHITE);
    for col in left - 1..=right {
        let ch = if col % 2 == 0 { '-' } else { ' ' };
        canvas.put(col, top - 1, ch, Some(Rgb::GRAY), None);
        canvas.put(col, bottom, ch, Some(Rgb::GRAY), None);
    }
    for row in top..bottom {
        let ch = if row % 2 == 0 { '¦' } else { ' ' };
        canvas.put(left - 1, row, ch, Some(Rgb::GRAY), None);
        canvas.put(right, row, ch, Some(Rgb::GRAY), None);
    }

    for tile in board.draw_order() {
        let col0 = viewport.col_of(tile.position.x);
        let row0 = viewport.row_of(tile.position.y);
        let col1 = viewport.col_of(tile.position.x + PIECE_SIZE);
        let row1 = viewport.row_of(tile.position.y + PIECE_SIZE);
        let bg = if board.grabbed() == Some(tile.id) { GRABBED_BG } else { TILE_BG };
        canvas.fill(col0, row0, col1, row1, bg);

        let width = (col1 - col0).max(1) as usize;
        let height = (row1 - row0).max(1) as usize;
        for row in 0..height {
            for col in 0..width {
                let ch = picture.sample(tile.cell, col, row, width, height);
                canvas.put(col0 + col as i64, row0 + row as i64, ch, Some(INK), None);
            }
        }
    }

    let placed = board.tiles().iter().filter(|tile| tile.is_placed()).count();
    let mut lines = vec![
        "Assemble the picture!".to_string(),
        "Drag the pieces into the dashed square with the mouse.".to_string(),
    ];
    lines.extend(canvas.lines());
    lines.push(if board.is_completed() {
        "Picture assembled!".to_string()
    } else {
        format!("Placed: {placed}/{TILE_COUNT}  Esc gives up.")
    });
    term.draw_lines(&lines)
}

#[cfg(test)]
mod tests
{
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::Cell;
    use std::rc::Rc;

    fn targets() -> [Point; TILE_COUNT]
    {
        [
            Point::new(400, 100),
            Point::new(500, 100),
            Point::new(400, 200),
            Point::new(500, 200),
        ]
    }

    fn scattered() -> Board
    {
        Board::new([
            Point::new(50, 50),
            Point::new(200, 60),
            Point::new(60, 300),
            Point::new(220, 320),
        ])
    }

    /// Grab a tile by its top-left corner and drop it with that corner at `to`.
    fn drag(board: &mut Board, tile: usize, to: Point) -> DropOutcome
    {
        let from = board.tiles()[tile].position;
        let grip = Point::new(from.x + 1, from.y + 1);
        assert_eq!(board.press(grip), Some(tile));
        board.drag_to(Point::new(to.x + 1, to.y + 1));
        board.release().unwrap()
    }

    #[test]
    fn targets_follow_the_grid()
    {
        let board = scattered();
        let found: Vec<Point> = board.tiles().iter().map(Tile::target).collect();
        assert_eq!(found, targets().to_vec());
    }

    #[test]
    fn drop_within_threshold_snaps_exactly()
    {
        let mut board = scattered();
        let outcome = drag(&mut board, 0, Point::new(429, 71));
        assert!(outcome.snapped);
        assert_eq!(board.tiles()[0].position, Point::new(400, 100));
        assert!(board.tiles()[0].is_placed());
    }

    #[test]
    fn drop_outside_threshold_stays_where_released()
    {
        let mut board = scattered();
        let outcome = drag(&mut board, 1, Point::new(530, 100));
        assert!(!outcome.snapped);
        assert_eq!(board.tiles()[1].position, Point::new(530, 100));

        // both axes have to be close
        let outcome = drag(&mut board, 1, Point::new(500, 131));
        assert!(!outcome.snapped);
        assert_eq!(board.tiles()[1].position, Point::new(500, 131));
    }

    #[test]
    fn completion_hook_fires_once_when_all_tiles_are_placed()
    {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut board = scattered().on_complete(move || counter.set(counter.get() + 1));

        let near = [
            Point::new(410, 90),
            Point::new(520, 115),
            Point::new(385, 215),
        ];
        for (tile, at) in near.iter().enumerate() {
            let outcome = drag(&mut board, tile, *at);
            assert!(outcome.snapped);
            assert!(!outcome.completed);
            assert_eq!(fired.get(), 0);
        }

        // the last tile first lands off target: still incomplete
        let outcome = drag(&mut board, 3, Point::new(300, 300));
        assert!(!outcome.completed);
        assert_eq!(fired.get(), 0);

        let outcome = drag(&mut board, 3, Point::new(505, 195));
        assert!(outcome.completed);
        assert_eq!(fired.get(), 1);
        assert!(board.is_completed());

        // nothing can be grabbed afterwards and the hook stays at one call
        assert_eq!(board.press(Point::new(450, 150)), None);
        assert!(board.release().is_none());
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn moving_a_placed_tile_away_blocks_completion()
    {
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut board = scattered().on_complete(move || counter.set(counter.get() + 1));

        for (tile, at) in targets().iter().take(3).enumerate() {
            drag(&mut board, tile, *at);
        }
        drag(&mut board, 0, Point::new(100, 100));
        let outcome = drag(&mut board, 3, targets()[3]);
        assert!(!outcome.completed);
        assert_eq!(fired.get(), 0);

        let outcome = drag(&mut board, 0, targets()[0]);
        assert!(outcome.completed);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn press_picks_the_topmost_tile_and_raises_it()
    {
        let mut board = Board::new([
            Point::new(100, 100),
            Point::new(150, 150),
            Point::new(0, 0),
            Point::new(0, 300),
        ]);
        assert_eq!(board.press(Point::new(160, 160)), Some(1));
        board.release();
        assert_eq!(board.draw_order().last().map(|tile| tile.id), Some(1));

        assert_eq!(board.press(Point::new(120, 120)), Some(0));
        board.release();
        assert_eq!(board.press(Point::new(160, 160)), Some(0));
        board.release();

        assert_eq!(board.press(Point::new(790, 490)), None);
        assert!(board.release().is_none());
    }

    #[test]
    fn dragging_keeps_tiles_on_the_canvas()
    {
        let mut board = scattered();
        board.press(Point::new(60, 60));
        board.drag_to(Point::new(-500, 2000));
        assert_eq!(board.tiles()[0].position, Point::new(0, CANVAS_HEIGHT - PIECE_SIZE));
        board.release();
    }

    #[test]
    fn shuffled_tiles_start_in_the_left_region()
    {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let board = Board::shuffled(&mut rng);
            for tile in board.tiles() {
                assert!((50..=250).contains(&tile.position.x));
                assert!((50..=350).contains(&tile.position.y));
                assert!(!tile.is_placed());
            }
        }
    }

    #[test]
    fn viewport_maps_cells_to_canvas_and_back()
    {
        let viewport = Viewport::fit(80, 28);
        assert_eq!(viewport.rows, 25);
        assert_eq!(viewport.to_canvas(0, 2), Point::new(5, 10));
        assert_eq!(viewport.to_canvas(40, 7), Point::new(405, 110));
        // header rows clamp to the first canvas row
        assert_eq!(viewport.to_canvas(0, 0), Point::new(5, 10));
        assert_eq!(viewport.col_of(PLAY_AREA.x), 40);
        assert_eq!(viewport.row_of(PLAY_AREA.y), 5);
    }

    #[test]
    fn picture_is_split_into_quadrants()
    {
        let picture = Picture::parse("ab\ncd\n").unwrap();
        assert_eq!(picture.sample((0, 0), 0, 0, 1, 1), 'a');
        assert_eq!(picture.sample((1, 0), 0, 0, 1, 1), 'b');
        assert_eq!(picture.sample((0, 1), 0, 0, 1, 1), 'c');
        assert_eq!(picture.sample((1, 1), 0, 0, 1, 1), 'd');
        assert!(Picture::parse("\n   \n").is_none());
        assert!(Picture::load(None).is_ok());
    }

    #[test]
    fn unreadable_picture_is_an_error()
    {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        assert!(Picture::load(Some(&missing)).is_err());

        let empty = dir.path().join("empty.txt");
        fs::write(&empty, "\n\n").unwrap();
        assert!(Picture::load(Some(&empty)).is_err());
    }
}
