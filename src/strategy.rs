// Agent strategy
//
// An agent keeps its own map, folds each turn's four lines of sight into it,
// and answers with a turn built only from openings it already knows about,
// so the arbiter never has to truncate it and the two maps stay in step.

use log::debug;

use crate::analysis::{construct_turn, DistanceField};
use crate::error::MazeError;
use crate::infer::infer;
use crate::maze::MazeMap;
use crate::types::{Dir, Point, RelDir, State};

/// Longest turn the arbiter accepts by default
pub const MAX_TURN_LENGTH: usize = 256;

/// What the agent is currently trying to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Part of the grid is still unknown: head for the richest frontier
    Explore,
    /// Everything is known: chase the opponent's reported offset
    Squash,
}

/// A maze-exploring agent and everything it has learned so far
#[derive(Debug, Clone)]
pub struct Agent {
    maze: MazeMap,
    max_turn_length: usize,
}

impl Agent {
    /// Creates an agent that believes it starts at (0, 0) facing north
    pub fn new(rows: usize, cols: usize) -> Self {
        Agent {
            maze: MazeMap::new(rows, cols),
            max_turn_length: MAX_TURN_LENGTH,
        }
    }

    /// Caps the length of every turn the agent produces
    pub fn with_max_turn_length(mut self, max_turn_length: usize) -> Self {
        self.max_turn_length = max_turn_length.max(1);
        self
    }

    pub fn maze(&self) -> &MazeMap {
        &self.maze
    }

    /// Applies the Front, Right, Back, Left lines of sight and re-runs inference
    pub fn observe<S: AsRef<str>>(&mut self, lines: &[S; 4]) -> Result<(), MazeError> {
        for (line, rel) in lines.iter().zip(RelDir::all()) {
            self.maze.look(line.as_ref(), rel)?;
        }
        infer(&mut self.maze)?;
        Ok(())
    }

    pub fn mode(&self) -> Mode {
        if self.maze.is_complete() {
            Mode::Squash
        } else {
            Mode::Explore
        }
    }

    /// Chooses the next turn; `distsq` is the squared distance to the opponent
    /// as reported by the arbiter, or -1 without one
    pub fn pick_move(&self, distsq: i64) -> Result<String, MazeError> {
        let mut turn = match self.mode() {
            Mode::Explore => explore_move(&self.maze)?,
            Mode::Squash => squash_move(&self.maze, distsq)?,
        };
        turn.truncate(self.max_turn_length);
        Ok(turn)
    }

    /// Moves the agent's own map along the turn it just sent
    pub fn commit(&mut self, turn: &str) -> Result<(), MazeError> {
        self.maze.turn(turn)
    }
}

/// Heads for the reachable square bordering the most unknown squares
///
/// Each reachable square scores one point per edge that is not a known wall
/// and leads to an unknown square. The best score wins and ties go to the
/// closer square, then to the first in row-major order.
pub fn explore_move(maze: &MazeMap) -> Result<String, MazeError> {
    let field = DistanceField::from_current(maze);
    let mut best: Option<(Point, usize, i32)> = None;

    for (square, distance) in field.reachable() {
        let score = frontier_score(maze, square);
        let better = match best {
            None => score > 0,
            Some((_, best_score, best_distance)) => {
                score > best_score || (score == best_score && distance < best_distance)
            }
        };
        if better {
            best = Some((square, score, distance));
        }
    }

    match best {
        Some((target, score, distance)) => {
            debug!(
                "exploring toward ({}, {}): {} unknown neighbours, {} steps away",
                target.r, target.c, score, distance
            );
            non_empty(maze, construct_turn(maze, &field, maze.location(), target)?)
        }
        None => {
            debug!("no frontier left in reach, stalling");
            Ok(stall_move(maze))
        }
    }
}

/// Heads for the closest square at squared offset `distsq` from the agent
///
/// Offsets wrap around the torus and both signs of each component are
/// considered. A non-positive distance (no opponent, or already caught)
/// stalls in place.
pub fn squash_move(maze: &MazeMap, distsq: i64) -> Result<String, MazeError> {
    if distsq <= 0 {
        return Ok(stall_move(maze));
    }

    let (rows, cols) = (maze.rows() as i64, maze.cols() as i64);
    let here = maze.loc();
    let field = DistanceField::from_current(maze);
    let mut best: Option<(Point, i32)> = None;

    for dr in -(rows - 1)..rows {
        for dc in -(cols - 1)..cols {
            if dr * dr + dc * dc != distsq {
                continue;
            }
            let r = (here.r as i64 + dr).rem_euclid(rows) as usize;
            let c = (here.c as i64 + dc).rem_euclid(cols) as usize;
            let distance = field.get(r, c);
            if !field.is_reachable(r, c) {
                continue;
            }
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((Point::new(r, c), distance));
            }
        }
    }

    match best {
        Some((target, distance)) => {
            debug!(
                "squashing toward ({}, {}) at squared offset {}, {} steps away",
                target.r, target.c, distsq, distance
            );
            non_empty(maze, construct_turn(maze, &field, maze.location(), target)?)
        }
        None => Ok(stall_move(maze)),
    }
}

/// One step through an opening the agent already knows about
///
/// Prefers turning back, then left, right and front. Falls back to `T` when
/// no edge of the current square is known to be open.
pub fn stall_move(maze: &MazeMap) -> String {
    let here = maze.loc();
    let dir = maze.dir();
    [RelDir::Back, RelDir::Left, RelDir::Right, RelDir::Front]
        .into_iter()
        .find(|&rel| maze.wall(here.r, here.c, dir.turn(rel)) == State::Absent)
        .unwrap_or(RelDir::Back)
        .command()
        .to_string()
}

/// Unknown squares adjacent to `square` through edges not known to be walls
fn frontier_score(maze: &MazeMap, square: Point) -> usize {
    Dir::all()
        .into_iter()
        .filter(|&dir| {
            let (nr, nc) = maze.neighbor(square.r, square.c, dir);
            maze.square(nr, nc) == State::Unknown && maze.wall(square.r, square.c, dir) != State::Present
        })
        .count()
}

fn non_empty(maze: &MazeMap, turn: String) -> Result<String, MazeError> {
    if turn.is_empty() {
        Ok(stall_move(maze))
    } else {
        Ok(turn)
    }
}
