// Maze map: a toroidal grid of tri-state squares and walls
//
// Every cell stores its own square plus the walls on its north and west
// edges; the south and east walls are read through the neighbouring cell.
// A map only ever learns: squares go unknown -> present and walls go
// unknown -> present/absent, and a conflicting write is an error.

use crate::error::MazeError;
use crate::types::{span, Dir, Location, Point, Rect, RelDir, State};

/// Default grid height used by the contest
pub const DEFAULT_HEIGHT: usize = 25;
/// Default grid width used by the contest
pub const DEFAULT_WIDTH: usize = 25;
/// Largest dimension the compact encoding can represent in a single digit
pub const MAX_DIMENSION: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Cell {
    square: State,
    wall_n: State,
    wall_w: State,
}

/// One agent's (or the arbiter's) knowledge of the maze
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MazeMap {
    rows: usize,
    cols: usize,
    cells: Vec<Cell>,
    loc: Point,
    dir: Dir,
    border: Rect,
}

impl MazeMap {
    /// Creates an unexplored map with the agent at (0, 0) facing north
    ///
    /// # Panics
    /// If either dimension is outside `1..=MAX_DIMENSION`.
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut maze = Self::unexplored(rows, cols);
        maze.initialize(0, 0, Dir::North);
        maze
    }

    /// Map with every square and wall unknown and no current square marked
    pub(crate) fn unexplored(rows: usize, cols: usize) -> Self {
        assert!(
            (1..=MAX_DIMENSION).contains(&rows) && (1..=MAX_DIMENSION).contains(&cols),
            "maze dimensions must be within 1..={}",
            MAX_DIMENSION
        );
        MazeMap {
            rows,
            cols,
            cells: vec![Cell::default(); rows * cols],
            loc: Point::new(0, 0),
            dir: Dir::North,
            border: Rect {
                top: 0,
                left: 0,
                bottom: 1 % rows,
                right: 1 % cols,
            },
        }
    }

    /// Forgets everything and restarts at the given pose
    pub fn initialize(&mut self, r: usize, c: usize, dir: Dir) {
        let (r, c) = (r % self.rows, c % self.cols);
        self.cells.iter_mut().for_each(|cell| *cell = Cell::default());
        self.loc = Point::new(r, c);
        self.dir = dir;
        self.border = Rect {
            top: r,
            left: c,
            bottom: (r + 1) % self.rows,
            right: (c + 1) % self.cols,
        };
        self.cell_mut(r, c).square = State::Present;
    }

    /// Grid height (number of rows on the torus)
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Grid width (number of columns on the torus)
    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn loc(&self) -> Point {
        self.loc
    }

    pub fn dir(&self) -> Dir {
        self.dir
    }

    pub fn location(&self) -> Location {
        Location::new(self.loc.r, self.loc.c, self.dir)
    }

    pub fn border(&self) -> Rect {
        self.border
    }

    /// Height of the discovered rectangle (full grid height once it wraps)
    pub fn height(&self) -> usize {
        span(self.border.top, self.border.bottom, self.rows)
    }

    /// Width of the discovered rectangle (full grid width once it wraps)
    pub fn width(&self) -> usize {
        span(self.border.left, self.border.right, self.cols)
    }

    /// Coordinates of the square one step away in `dir`
    pub fn neighbor(&self, r: usize, c: usize, dir: Dir) -> (usize, usize) {
        match dir {
            Dir::North => ((r + self.rows - 1) % self.rows, c),
            Dir::East => (r, (c + 1) % self.cols),
            Dir::South => ((r + 1) % self.rows, c),
            Dir::West => (r, (c + self.cols - 1) % self.cols),
        }
    }

    pub fn square(&self, r: usize, c: usize) -> State {
        self.cell(r, c).square
    }

    /// Marks a square present, growing the border toward it
    ///
    /// Returns true if the square was not known before.
    pub fn mark_square(&mut self, r: usize, c: usize) -> bool {
        self.discover(r, c, None)
    }

    /// Marks a square present that is entered by a step heading `heading`
    /// from a neighbour, growing the border on that side
    pub fn mark_reached(&mut self, r: usize, c: usize, heading: Dir) -> bool {
        self.discover(r, c, Some(heading))
    }

    pub fn wall(&self, r: usize, c: usize, dir: Dir) -> State {
        let (r, c, north) = self.wall_slot(r, c, dir);
        let cell = self.cell(r, c);
        if north {
            cell.wall_n
        } else {
            cell.wall_w
        }
    }

    /// Resolves a wall
    ///
    /// Returns `Ok(true)` when the stored value changed and `Ok(false)` when
    /// it already held `value`. Overwriting a resolved wall with anything
    /// else is a contradiction.
    pub fn set_wall(&mut self, r: usize, c: usize, dir: Dir, value: State) -> Result<bool, MazeError> {
        let stored = self.wall(r, c, dir);
        if stored == value {
            return Ok(false);
        }
        if stored.is_resolved() || !value.is_resolved() {
            return Err(MazeError::Contradiction {
                row: r % self.rows,
                col: c % self.cols,
                dir,
                stored,
                requested: value,
            });
        }
        let (wr, wc, north) = self.wall_slot(r, c, dir);
        let cell = self.cell_mut(wr, wc);
        if north {
            cell.wall_n = value;
        } else {
            cell.wall_w = value;
        }
        Ok(true)
    }

    /// Applies one line of sight taken in direction `rel` from the current square
    ///
    /// The line uses one letter per square passed (`B`oth sides open, `L`eft
    /// open, `R`ight open, `N`either open) and ends with `W`, the wall
    /// immediately ahead.
    pub fn look(&mut self, line: &str, rel: RelDir) -> Result<(), MazeError> {
        let codes = parse_sight_line(line)?;

        let dir = self.dir.turn(rel);
        let left = dir.turn(RelDir::Left);
        let right = dir.turn(RelDir::Right);
        let back = dir.turn(RelDir::Back);

        let (mut r, mut c) = (self.loc.r, self.loc.c);
        for (open_left, open_right) in codes {
            (r, c) = self.neighbor(r, c, dir);
            self.set_wall(r, c, back, State::Absent)?;
            self.discover(r, c, Some(dir));
            self.observe_side(r, c, left, open_left)?;
            self.observe_side(r, c, right, open_right)?;
        }
        self.set_wall(r, c, dir, State::Present)?;
        Ok(())
    }

    /// Performs a single move command: turn by F/T/L/R, then advance one square
    ///
    /// Walls are not checked here; the arbiter validates moves against the
    /// real maze before they reach a map.
    pub fn step(&mut self, command: char) -> Result<(), MazeError> {
        let rel = RelDir::from_command(command).ok_or(MazeError::BadCommand(command))?;
        self.dir = self.dir.turn(rel);
        let (r, c) = self.neighbor(self.loc.r, self.loc.c, self.dir);
        self.loc = Point::new(r, c);
        self.discover(r, c, Some(self.dir));
        Ok(())
    }

    /// Performs every command of a turn in order
    pub fn turn(&mut self, commands: &str) -> Result<(), MazeError> {
        commands.chars().try_for_each(|command| self.step(command))
    }

    /// Number of squares known to be present
    pub fn count_squares(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.square == State::Present)
            .count()
    }

    /// True once every square of the grid has been discovered
    pub fn is_complete(&self) -> bool {
        self.count_squares() == self.rows * self.cols
    }

    /// Forgets all squares but keeps the walls (used for the arbiter's master map)
    pub fn clear_squares(&mut self) {
        self.cells
            .iter_mut()
            .for_each(|cell| cell.square = State::Unknown);
    }

    pub(crate) fn set_square(&mut self, r: usize, c: usize, value: State) {
        self.cell_mut(r, c).square = value;
    }

    pub(crate) fn set_pose(&mut self, loc: Location, border: Rect) {
        self.loc = Point::new(loc.r % self.rows, loc.c % self.cols);
        self.dir = loc.dir;
        self.border = border;
    }

    /// Marks a square present; `heading` is the direction of the step that
    /// reached it from an already-discovered neighbour, when known
    fn discover(&mut self, r: usize, c: usize, heading: Option<Dir>) -> bool {
        let (r, c) = (r % self.rows, c % self.cols);
        if self.square(r, c) == State::Present {
            return false;
        }
        self.cell_mut(r, c).square = State::Present;
        self.grow_border(r, c, heading);
        true
    }

    /// Extends the border rectangle to cover (r, c)
    ///
    /// On each axis the side is taken from a known opening into a square
    /// already inside the rectangle, then from the step that reached the
    /// square, and only then from the shorter extension.
    fn grow_border(&mut self, r: usize, c: usize, heading: Option<Dir>) {
        let (rows, cols) = (self.rows, self.cols);

        let height = span(self.border.top, self.border.bottom, rows);
        if (r + rows - self.border.top) % rows >= height {
            let grow_up = match self.open_toward_border(r, c, Dir::North, Dir::South) {
                Some(side) => side == Dir::South,
                None => match heading {
                    Some(Dir::North) => true,
                    Some(Dir::South) => false,
                    _ => shorter_before(r, self.border.top, height, rows),
                },
            };
            if grow_up {
                self.border.top = r;
            } else {
                self.border.bottom = (r + 1) % rows;
            }
        }

        let width = span(self.border.left, self.border.right, cols);
        if (c + cols - self.border.left) % cols >= width {
            let grow_left = match self.open_toward_border(r, c, Dir::West, Dir::East) {
                Some(side) => side == Dir::East,
                None => match heading {
                    Some(Dir::West) => true,
                    Some(Dir::East) => false,
                    _ => shorter_before(c, self.border.left, width, cols),
                },
            };
            if grow_left {
                self.border.left = c;
            } else {
                self.border.right = (c + 1) % cols;
            }
        }
    }

    /// Which of two opposite sides of (r, c) opens into a square whose row
    /// or column the border already covers
    fn open_toward_border(&self, r: usize, c: usize, first: Dir, second: Dir) -> Option<Dir> {
        [first, second].into_iter().find(|&dir| {
            if self.wall(r, c, dir) != State::Absent {
                return false;
            }
            let (nr, nc) = self.neighbor(r, c, dir);
            match dir {
                Dir::North | Dir::South => (nr + self.rows - self.border.top) % self.rows < self.height(),
                Dir::East | Dir::West => (nc + self.cols - self.border.left) % self.cols < self.width(),
            }
        })
    }

    fn observe_side(&mut self, r: usize, c: usize, side: Dir, open: bool) -> Result<(), MazeError> {
        if open {
            self.set_wall(r, c, side, State::Absent)?;
            let (nr, nc) = self.neighbor(r, c, side);
            self.discover(nr, nc, Some(side));
        } else {
            self.set_wall(r, c, side, State::Present)?;
        }
        Ok(())
    }

    /// Cell owning the wall on `dir` of (r, c) and whether it is that cell's north wall
    fn wall_slot(&self, r: usize, c: usize, dir: Dir) -> (usize, usize, bool) {
        let (r, c) = (r % self.rows, c % self.cols);
        match dir {
            Dir::North => (r, c, true),
            Dir::South => ((r + 1) % self.rows, c, true),
            Dir::West => (r, c, false),
            Dir::East => (r, (c + 1) % self.cols, false),
        }
    }

    fn cell(&self, r: usize, c: usize) -> &Cell {
        &self.cells[(r % self.rows) * self.cols + c % self.cols]
    }

    fn cell_mut(&mut self, r: usize, c: usize) -> &mut Cell {
        let index = (r % self.rows) * self.cols + c % self.cols;
        &mut self.cells[index]
    }
}

impl Default for MazeMap {
    fn default() -> Self {
        MazeMap::new(DEFAULT_HEIGHT, DEFAULT_WIDTH)
    }
}

/// True when covering `x` costs less by moving the start of an interval of
/// `len` beginning at `start` than by moving its end
fn shorter_before(x: usize, start: usize, len: usize, size: usize) -> bool {
    let offset = (x + size - start) % size;
    size - offset < offset + 1 - len
}

/// Validates a line of sight and returns the (open left, open right) pair of
/// every square passed before the terminating wall
fn parse_sight_line(line: &str) -> Result<Vec<(bool, bool)>, MazeError> {
    let bad = |reason: &str| MazeError::BadSightLine {
        line: line.to_string(),
        reason: reason.to_string(),
    };

    let body = line
        .strip_suffix('W')
        .ok_or_else(|| bad("line must end with W"))?;

    body.chars()
        .map(|code| match code {
            'B' => Ok((true, true)),
            'L' => Ok((true, false)),
            'R' => Ok((false, true)),
            'N' => Ok((false, false)),
            _ => Err(bad("expected one of B, L, R, N before the final W")),
        })
        .collect()
}
