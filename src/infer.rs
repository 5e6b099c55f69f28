// Inference engine
//
// Deduces walls and squares implied by what a map already knows, without
// further observation, by running three rules to a fixed point:
//
// 1. Dead ends: a square whose edges are walls or openings into
//    already-dead squares on three sides can only be left through its
//    fourth edge, which is therefore open.
// 2. Corners: mazes never contain an open 2x2 block, so a grid vertex with
//    three open wall segments has a wall on the fourth.
// 3. Seams: the maze is a bounded rectangle laid on the torus. Once the
//    area the agent is known to reach through open walls spans a full
//    dimension, its edge is the maze boundary, where every wall is present.

use std::collections::VecDeque;

use log::debug;

use crate::error::MazeError;
use crate::maze::MazeMap;
use crate::types::{Dir, RelDir, State};

/// Runs all inference rules until a full pass changes nothing
///
/// Returns true if anything was learned.
pub fn infer(maze: &mut MazeMap) -> Result<bool, MazeError> {
    let mut dead = vec![false; maze.rows() * maze.cols()];
    let mut learned = false;
    let mut passes = 0;

    loop {
        passes += 1;
        let mut changed = propagate_dead_ends(maze, &mut dead)?;
        changed |= complete_corners(maze)?;
        changed |= close_seams(maze)?;
        if !changed {
            break;
        }
        learned = true;
    }

    debug!("inference reached a fixed point after {} passes", passes);
    Ok(learned)
}

/// Dead-end propagation over an explicit worklist
///
/// `dead` holds one flag per square (row-major) and is carried across passes
/// of the same inference run.
pub fn propagate_dead_ends(maze: &mut MazeMap, dead: &mut [bool]) -> Result<bool, MazeError> {
    let cols = maze.cols();
    let total = maze.rows() * cols;
    let mut queue: VecDeque<(usize, usize)> = (0..maze.rows())
        .flat_map(|r| (0..cols).map(move |c| (r, c)))
        .collect();
    let mut changed = false;

    while let Some((r, c)) = queue.pop_front() {
        if dead[r * cols + c] {
            continue;
        }

        let closed = Dir::all()
            .into_iter()
            .filter(|&dir| is_closed(maze, dead, r, c, dir))
            .count();

        match closed {
            // Only the last square of a fully resolved tree may close up
            4 if dead.iter().filter(|&&d| d).count() + 1 == total => {
                debug!("square ({}, {}) closes the last dead end", r, c);
                dead[r * cols + c] = true;
                changed |= maze.mark_square(r, c);
            }
            4 => {
                return Err(MazeError::Inconsistent(format!(
                    "square ({}, {}) is closed on all four sides",
                    r, c
                )))
            }
            3 => {
                let exit = Dir::all()
                    .into_iter()
                    .find(|&dir| !is_closed(maze, dead, r, c, dir))
                    .unwrap_or(Dir::North);
                dead[r * cols + c] = true;
                // Entered from the exit side
                changed |= maze.mark_reached(r, c, exit.turn(RelDir::Back));
                for dir in Dir::all() {
                    if maze.wall(r, c, dir) == State::Unknown {
                        changed |= maze.set_wall(r, c, dir, State::Absent)?;
                    }
                    queue.push_back(maze.neighbor(r, c, dir));
                }
            }
            _ => {}
        }
    }

    Ok(changed)
}

/// An edge counts as closed when it is a wall or opens into a dead end
fn is_closed(maze: &MazeMap, dead: &[bool], r: usize, c: usize, dir: Dir) -> bool {
    match maze.wall(r, c, dir) {
        State::Present => true,
        State::Absent => {
            let (nr, nc) = maze.neighbor(r, c, dir);
            dead[nr * maze.cols() + nc]
        }
        State::Unknown => false,
    }
}

/// Closes the last open segment at every vertex where three are known open
pub fn complete_corners(maze: &mut MazeMap) -> Result<bool, MazeError> {
    let (rows, cols) = (maze.rows(), maze.cols());
    let mut changed = false;

    for r in 0..rows {
        for c in 0..cols {
            // Segments meeting at the north-west corner of (r, c)
            let segments = [
                (r, (c + cols - 1) % cols, Dir::North),
                (r, c, Dir::North),
                ((r + rows - 1) % rows, c, Dir::West),
                (r, c, Dir::West),
            ];
            let states = segments.map(|(sr, sc, dir)| maze.wall(sr, sc, dir));
            let open = states.iter().filter(|&&s| s == State::Absent).count();

            if open == 4 {
                return Err(MazeError::Inconsistent(format!(
                    "no wall touches the north-west corner of ({}, {})",
                    r, c
                )));
            }
            if open == 3 {
                if let Some(i) = states.iter().position(|&s| s == State::Unknown) {
                    let (sr, sc, dir) = segments[i];
                    changed |= maze.set_wall(sr, sc, dir, State::Present)?;
                }
            }
        }
    }

    Ok(changed)
}

/// Walls the maze boundary once the reachable area spans a full dimension
///
/// The area is everything connected to the current square through walls
/// known to be open. Its extent is measured without wrapping, so when it
/// covers every column its westmost column sits right of the boundary.
pub fn close_seams(maze: &mut MazeMap) -> Result<bool, MazeError> {
    let (column, row) = seam_lines(maze)?;
    let mut changed = false;

    if let Some(left) = column {
        let line: Vec<_> = (0..maze.rows()).map(|r| (r, left, Dir::West)).collect();
        changed |= close_line(maze, &line)?;
    }
    if let Some(top) = row {
        let line: Vec<_> = (0..maze.cols()).map(|c| (top, c, Dir::North)).collect();
        changed |= close_line(maze, &line)?;
    }

    Ok(changed)
}

/// Westmost column and northmost row of the reachable area, for each axis
/// on which it spans the whole grid
fn seam_lines(maze: &MazeMap) -> Result<(Option<usize>, Option<usize>), MazeError> {
    let (rows, cols) = (maze.rows(), maze.cols());
    let here = maze.loc();

    // Unwrapped offset of every reached square relative to the current one
    let mut offsets: Vec<Option<(i64, i64)>> = vec![None; rows * cols];
    offsets[here.r * cols + here.c] = Some((0, 0));
    let mut queue = VecDeque::from([(here.r, here.c, 0i64, 0i64)]);
    let (mut top, mut bottom, mut left, mut right) = (0i64, 0i64, 0i64, 0i64);

    while let Some((r, c, dr, dc)) = queue.pop_front() {
        for dir in Dir::all() {
            if maze.wall(r, c, dir) != State::Absent {
                continue;
            }
            let (nr, nc) = maze.neighbor(r, c, dir);
            let next = (dr + i64::from(dir.dr()), dc + i64::from(dir.dc()));
            match offsets[nr * cols + nc] {
                Some(seen) if seen != next => {
                    return Err(MazeError::Inconsistent(format!(
                        "open walls wrap around the grid at ({}, {})",
                        nr, nc
                    )))
                }
                Some(_) => {}
                None => {
                    offsets[nr * cols + nc] = Some(next);
                    top = top.min(next.0);
                    bottom = bottom.max(next.0);
                    left = left.min(next.1);
                    right = right.max(next.1);
                    queue.push_back((nr, nc, next.0, next.1));
                }
            }
        }
    }

    let (rows, cols) = (rows as i64, cols as i64);
    if bottom - top + 1 > rows || right - left + 1 > cols {
        return Err(MazeError::Inconsistent(
            "open walls span more than the grid".to_string(),
        ));
    }
    let column = (right - left + 1 == cols).then(|| (here.c as i64 + left).rem_euclid(cols) as usize);
    let row = (bottom - top + 1 == rows).then(|| (here.r as i64 + top).rem_euclid(rows) as usize);
    Ok((column, row))
}

/// Sets every wall of a boundary line present; an open wall on it is a
/// contradiction reported by `set_wall`
fn close_line(maze: &mut MazeMap, line: &[(usize, usize, Dir)]) -> Result<bool, MazeError> {
    let mut changed = false;
    for &(r, c, dir) in line {
        changed |= maze.set_wall(r, c, dir, State::Present)?;
    }
    Ok(changed)
}
