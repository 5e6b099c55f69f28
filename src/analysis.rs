// Path analysis
// Breadth-first distances over known openings and turn synthesis toward a
// chosen square, used by the agent strategy to plan its turns.

use std::collections::VecDeque;

use crate::error::MazeError;
use crate::maze::MazeMap;
use crate::types::{Dir, Location, Point, RelDir, State};

/// Distance marker for squares the search never reached
pub const UNREACHABLE: i32 = -1;

/// Step counts from one square to every square reachable through known openings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceField {
    rows: usize,
    cols: usize,
    dist: Vec<i32>,
}

impl DistanceField {
    /// Runs a BFS from (r, c), crossing only walls known to be absent
    pub fn from_square(maze: &MazeMap, r: usize, c: usize) -> Self {
        let (rows, cols) = (maze.rows(), maze.cols());
        let (r, c) = (r % rows, c % cols);
        let mut dist = vec![UNREACHABLE; rows * cols];
        let mut queue = VecDeque::new();

        dist[r * cols + c] = 0;
        queue.push_back((r, c));

        while let Some((r, c)) = queue.pop_front() {
            let next = dist[r * cols + c] + 1;
            for dir in Dir::all() {
                if maze.wall(r, c, dir) != State::Absent {
                    continue;
                }
                let (nr, nc) = maze.neighbor(r, c, dir);
                if dist[nr * cols + nc] == UNREACHABLE {
                    dist[nr * cols + nc] = next;
                    queue.push_back((nr, nc));
                }
            }
        }

        DistanceField { rows, cols, dist }
    }

    /// Field rooted at the map's current square
    pub fn from_current(maze: &MazeMap) -> Self {
        let here = maze.loc();
        Self::from_square(maze, here.r, here.c)
    }

    pub fn get(&self, r: usize, c: usize) -> i32 {
        self.dist[(r % self.rows) * self.cols + c % self.cols]
    }

    pub fn is_reachable(&self, r: usize, c: usize) -> bool {
        self.get(r, c) != UNREACHABLE
    }

    /// Reachable squares with their distances, in row-major order
    pub fn reachable(&self) -> impl Iterator<Item = (Point, i32)> + '_ {
        self.dist
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d != UNREACHABLE)
            .map(move |(i, &d)| (Point::new(i / self.cols, i % self.cols), d))
    }
}

/// Builds the command string that walks one shortest path from `from` to `to`
///
/// `field` must be rooted at `from`. The path is traced backwards from the
/// target, taking at each square the first neighbour (in N, E, S, W order)
/// one step closer to the root, then replayed forwards choosing Front,
/// Right, Back, Left in that order. Returns an empty string when the agent
/// already stands on `to`.
pub fn construct_turn(
    maze: &MazeMap,
    field: &DistanceField,
    from: Location,
    to: Point,
) -> Result<String, MazeError> {
    let origin = from.point();
    if field.get(origin.r, origin.c) != 0 {
        return Err(MazeError::Inconsistent(format!(
            "distance field is not rooted at ({}, {})",
            origin.r, origin.c
        )));
    }
    if !field.is_reachable(to.r, to.c) {
        return Err(MazeError::Inconsistent(format!(
            "({}, {}) is not reachable from ({}, {})",
            to.r, to.c, origin.r, origin.c
        )));
    }

    let mut path = Vec::new();
    let mut current = Point::new(to.r % maze.rows(), to.c % maze.cols());
    while current != origin {
        let wanted = field.get(current.r, current.c) - 1;
        let previous = Dir::all()
            .into_iter()
            .filter(|&dir| maze.wall(current.r, current.c, dir) == State::Absent)
            .map(|dir| maze.neighbor(current.r, current.c, dir))
            .find(|&(r, c)| field.get(r, c) == wanted)
            .ok_or_else(|| {
                MazeError::Inconsistent(format!(
                    "no square at distance {} next to ({}, {})",
                    wanted, current.r, current.c
                ))
            })?;
        path.push(current);
        current = Point::new(previous.0, previous.1);
    }

    let mut turn = String::with_capacity(path.len());
    let (mut position, mut dir) = (origin, from.dir);
    for &next in path.iter().rev() {
        let rel = RelDir::all()
            .into_iter()
            .find(|&rel| {
                let (r, c) = maze.neighbor(position.r, position.c, dir.turn(rel));
                Point::new(r, c) == next
            })
            .ok_or_else(|| {
                MazeError::Inconsistent(format!(
                    "({}, {}) is not adjacent to ({}, {})",
                    next.r, next.c, position.r, position.c
                ))
            })?;
        turn.push(rel.command());
        dir = dir.turn(rel);
        position = next;
    }

    Ok(turn)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Map of the given size with every wall known open
    fn open_map(rows: usize, cols: usize) -> MazeMap {
        let mut maze = MazeMap::new(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                maze.set_wall(r, c, Dir::North, State::Absent).unwrap();
                maze.set_wall(r, c, Dir::West, State::Absent).unwrap();
            }
        }
        maze
    }

    #[test]
    fn test_distances_wrap_around() {
        let maze = open_map(5, 5);
        let field = DistanceField::from_square(&maze, 0, 0);
        assert_eq!(field.get(0, 0), 0);
        assert_eq!(field.get(2, 2), 4);
        assert_eq!(field.get(4, 4), 2);
        assert_eq!(field.get(0, 3), 2);
        assert_eq!(field.reachable().count(), 25);
    }

    #[test]
    fn test_unknown_walls_block_search() {
        let mut maze = MazeMap::new(5, 5);
        maze.set_wall(0, 0, Dir::East, State::Absent).unwrap();
        maze.set_wall(0, 1, Dir::East, State::Present).unwrap();
        let field = DistanceField::from_square(&maze, 0, 0);
        assert_eq!(field.get(0, 1), 1);
        assert!(!field.is_reachable(0, 2));
        assert!(!field.is_reachable(1, 0));

        let from = Location::new(0, 0, Dir::North);
        assert!(matches!(
            construct_turn(&maze, &field, from, Point::new(0, 2)),
            Err(MazeError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_turn_prefers_north_then_front() {
        let maze = open_map(5, 5);
        let field = DistanceField::from_square(&maze, 0, 0);
        let from = Location::new(0, 0, Dir::North);
        // Traced back from (1, 1) the first step closer is north, to (0, 1)
        assert_eq!(construct_turn(&maze, &field, from, Point::new(1, 1)).unwrap(), "RR");
        assert_eq!(construct_turn(&maze, &field, from, Point::new(4, 0)).unwrap(), "F");
        assert_eq!(construct_turn(&maze, &field, from, Point::new(1, 0)).unwrap(), "T");
        assert_eq!(construct_turn(&maze, &field, from, Point::new(0, 0)).unwrap(), "");
    }

    #[test]
    fn test_turn_length_matches_distance_and_replays_to_target() {
        // Every row is an open ring; some north walls are closed so paths bend
        let mut maze = MazeMap::new(7, 6);
        maze.initialize(3, 2, Dir::West);
        for r in 0..7 {
            for c in 0..6 {
                let north = if (r + 2 * c) % 3 == 0 {
                    State::Present
                } else {
                    State::Absent
                };
                maze.set_wall(r, c, Dir::North, north).unwrap();
                maze.set_wall(r, c, Dir::West, State::Absent).unwrap();
            }
        }

        let from = maze.location();
        let field = DistanceField::from_current(&maze);
        for (target, distance) in field.reachable().collect::<Vec<_>>() {
            let turn = construct_turn(&maze, &field, from, target).unwrap();
            assert_eq!(turn.len() as i32, distance, "path to {:?}", target);

            let mut walker = maze.clone();
            walker.turn(&turn).unwrap();
            assert_eq!(walker.loc(), target, "replaying {} toward {:?}", turn, target);
        }
    }
}
