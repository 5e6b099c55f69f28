// Core maze types
// Tri-state cell values, absolute and relative directions, and the small
// coordinate structs shared by the maze model, analysis and the arbiter

use serde::{Deserialize, Serialize};

/// Knowledge about a single square or wall
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum State {
    Absent,
    #[default]
    Unknown,
    Present,
}

impl State {
    /// Returns true once the value has been observed or inferred
    pub fn is_resolved(self) -> bool {
        self != State::Unknown
    }

    /// Base-3 digit used by the compact encoding (absent=0, unknown=1, present=2)
    pub fn to_trit(self) -> u32 {
        match self {
            State::Absent => 0,
            State::Unknown => 1,
            State::Present => 2,
        }
    }

    pub fn from_trit(trit: u32) -> Option<State> {
        match trit {
            0 => Some(State::Absent),
            1 => Some(State::Unknown),
            2 => Some(State::Present),
            _ => None,
        }
    }
}

/// Absolute compass direction, numbered clockwise from north
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dir {
    North,
    East,
    South,
    West,
}

impl Dir {
    /// Returns all directions in scan order (N, E, S, W)
    pub fn all() -> [Dir; 4] {
        [Dir::North, Dir::East, Dir::South, Dir::West]
    }

    pub fn index(self) -> usize {
        match self {
            Dir::North => 0,
            Dir::East => 1,
            Dir::South => 2,
            Dir::West => 3,
        }
    }

    /// Maps an index to a direction, wrapping modulo 4
    pub fn from_index(index: usize) -> Dir {
        Dir::all()[index % 4]
    }

    /// Composes an absolute direction with a relative one: (dir + rel) mod 4
    pub fn turn(self, rel: RelDir) -> Dir {
        Dir::from_index(self.index() + rel.index())
    }

    /// Row delta of a single step in this direction
    pub fn dr(self) -> i32 {
        match self {
            Dir::North => -1,
            Dir::South => 1,
            Dir::East | Dir::West => 0,
        }
    }

    /// Column delta of a single step in this direction
    pub fn dc(self) -> i32 {
        match self {
            Dir::East => 1,
            Dir::West => -1,
            Dir::North | Dir::South => 0,
        }
    }

    /// Orientation glyph used by the text maze format
    pub fn glyph(self) -> char {
        match self {
            Dir::North => '^',
            Dir::East => '>',
            Dir::South => 'v',
            Dir::West => '<',
        }
    }

    pub fn from_glyph(glyph: char) -> Option<Dir> {
        match glyph {
            '^' => Some(Dir::North),
            '>' => Some(Dir::East),
            'v' => Some(Dir::South),
            '<' => Some(Dir::West),
            _ => None,
        }
    }
}

/// Direction relative to the agent's heading
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelDir {
    Front,
    Right,
    Back,
    Left,
}

impl RelDir {
    /// Returns relative directions in the order lines of sight are exchanged
    pub fn all() -> [RelDir; 4] {
        [RelDir::Front, RelDir::Right, RelDir::Back, RelDir::Left]
    }

    pub fn index(self) -> usize {
        match self {
            RelDir::Front => 0,
            RelDir::Right => 1,
            RelDir::Back => 2,
            RelDir::Left => 3,
        }
    }

    /// Parses a move command character (F, R, T, L)
    pub fn from_command(command: char) -> Option<RelDir> {
        match command {
            'F' => Some(RelDir::Front),
            'R' => Some(RelDir::Right),
            'T' => Some(RelDir::Back),
            'L' => Some(RelDir::Left),
            _ => None,
        }
    }

    /// Move command character for a step in this relative direction
    pub fn command(self) -> char {
        match self {
            RelDir::Front => 'F',
            RelDir::Right => 'R',
            RelDir::Back => 'T',
            RelDir::Left => 'L',
        }
    }
}

/// Square coordinate on the torus
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub r: usize,
    pub c: usize,
}

impl Point {
    pub fn new(r: usize, c: usize) -> Self {
        Point { r, c }
    }
}

/// Position and heading of an agent
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub r: usize,
    pub c: usize,
    pub dir: Dir,
}

impl Location {
    pub fn new(r: usize, c: usize, dir: Dir) -> Self {
        Location { r, c, dir }
    }

    pub fn point(&self) -> Point {
        Point::new(self.r, self.c)
    }
}

/// Discovered-area rectangle; `bottom` and `right` are exclusive and every
/// bound wraps modulo the grid size, so `top == bottom` means full height
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub top: usize,
    pub left: usize,
    pub bottom: usize,
    pub right: usize,
}

/// Length of the wrapped interval [start, end) on a ring of `size` cells,
/// where an empty difference stands for the whole ring
pub fn span(start: usize, end: usize, size: usize) -> usize {
    match (end + size - start) % size {
        0 => size,
        n => n,
    }
}
