// Maze map serialization
//
// Two formats, both covering only the discovered border rectangle:
//
// Text: alternating wall and square lines drawn with `+`, `-`, `|`, space
// and `?`, with an orientation glyph (`^>v<`) on the agent's square.
//
// Compact: a URL-safe base-64 string. Five header digits (height, width,
// agent row, agent column, heading; positions relative to the rectangle),
// then one bit per square packed six to a digit, then every wall as a base-3
// digit (trit) packed fifteen to a group of four digits. Horizontal walls
// ((h + 1) x w) come before vertical walls (h x (w + 1)) and a partial last
// group is written only as long as its value is non-zero.
//
// Parsed maps place the rectangle at the grid origin.

use crate::error::MazeError;
use crate::maze::MazeMap;
use crate::types::{Dir, Location, Rect, State};

/// Digit alphabet of the compact encoding
pub const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

const TRITS_PER_GROUP: usize = 15;
const DIGITS_PER_GROUP: usize = 4;
const BITS_PER_DIGIT: usize = 6;

/// Renders the discovered part of the map as text, one line per `\n`
pub fn print(maze: &MazeMap) -> String {
    let border = maze.border();
    let (h, w) = (maze.height(), maze.width());
    let mut out = String::with_capacity((2 * h + 1) * (2 * w + 2));

    for i in 0..=h {
        let r = (border.top + i) % maze.rows();
        for j in 0..w {
            let c = (border.left + j) % maze.cols();
            out.push('+');
            out.push(wall_char(maze.wall(r, c, Dir::North), '-'));
        }
        out.push_str("+\n");

        if i == h {
            break;
        }

        for j in 0..w {
            let c = (border.left + j) % maze.cols();
            out.push(wall_char(maze.wall(r, c, Dir::West), '|'));
            out.push(square_char(maze, r, c));
        }
        let c = (border.left + w) % maze.cols();
        out.push(wall_char(maze.wall(r, c, Dir::West), '|'));
        out.push('\n');
    }

    out
}

/// Parses the text format into a map of the given grid size
///
/// Short lines are padded with spaces. Without an orientation glyph the
/// agent is placed at the origin facing north.
pub fn scan(text: &str, rows: usize, cols: usize) -> Result<MazeMap, MazeError> {
    let mut lines: Vec<Vec<char>> = text
        .lines()
        .map(|line| line.trim_end_matches('\r').chars().collect())
        .collect();
    while lines.last().map_or(false, |line| line.iter().all(|ch| ch.is_whitespace())) {
        lines.pop();
    }

    if lines.len() < 3 || lines.len() % 2 == 0 {
        return Err(MazeError::Format(format!(
            "expected an odd number of at least 3 lines, got {}",
            lines.len()
        )));
    }
    let width_chars = lines.iter().map(|line| line.len()).max().unwrap_or(0);
    let h = (lines.len() - 1) / 2;
    let w = width_chars.saturating_sub(1) / 2;
    check_size(h, w, rows, cols)?;

    let at = |line: &Vec<char>, i: usize| line.get(i).copied().unwrap_or(' ');
    let mut maze = MazeMap::unexplored(rows, cols);
    let mut agent: Option<Location> = None;

    for (i, line) in lines.iter().enumerate() {
        let r = i / 2;
        if i % 2 == 0 {
            for j in 0..w {
                let state = parse_wall(at(line, 2 * j + 1), '-', i, 2 * j + 1)?;
                set_known_wall(&mut maze, r, j, Dir::North, state)?;
            }
            continue;
        }

        for j in 0..=w {
            let state = parse_wall(at(line, 2 * j), '|', i, 2 * j)?;
            set_known_wall(&mut maze, r, j, Dir::West, state)?;
            if j == w {
                break;
            }
            match at(line, 2 * j + 1) {
                ' ' => maze.set_square(r, j, State::Present),
                '?' => {}
                glyph => {
                    let dir = Dir::from_glyph(glyph).ok_or_else(|| {
                        MazeError::Format(format!(
                            "unexpected {:?} at line {}, column {}",
                            glyph,
                            i + 1,
                            2 * j + 2
                        ))
                    })?;
                    if agent.is_some() {
                        return Err(MazeError::Format("more than one agent glyph".to_string()));
                    }
                    maze.set_square(r, j, State::Present);
                    agent = Some(Location::new(r, j, dir));
                }
            }
        }
    }

    let border = origin_rect(h, w, rows, cols);
    maze.set_pose(agent.unwrap_or(Location::new(0, 0, Dir::North)), border);
    Ok(maze)
}

/// Produces the compact description of the discovered part of the map
pub fn encode(maze: &MazeMap) -> String {
    let border = maze.border();
    let (rows, cols) = (maze.rows(), maze.cols());
    let (h, w) = (maze.height(), maze.width());
    let loc = maze.loc();
    let mut out = String::new();
    let digit = |value: usize| BASE64_DIGITS[value] as char;

    out.push(digit(h));
    out.push(digit(w));
    out.push(digit((loc.r + rows - border.top) % rows));
    out.push(digit((loc.c + cols - border.left) % cols));
    out.push(digit(maze.dir().index()));

    let (mut val, mut len) = (0usize, 0usize);
    for i in 0..h {
        for j in 0..w {
            let present = maze.square((border.top + i) % rows, (border.left + j) % cols) == State::Present;
            val |= (present as usize) << len;
            len += 1;
            if len == BITS_PER_DIGIT {
                out.push(digit(val));
                val = 0;
                len = 0;
            }
        }
    }
    if len > 0 {
        out.push(digit(val));
    }

    let (mut val, mut len, mut weight) = (0usize, 0usize, 1usize);
    for state in wall_states(maze, border, h, w) {
        val += weight * state.to_trit() as usize;
        weight *= 3;
        len += 1;
        if len == TRITS_PER_GROUP {
            for _ in 0..DIGITS_PER_GROUP {
                out.push(digit(val % 64));
                val /= 64;
            }
            val = 0;
            len = 0;
            weight = 1;
        }
    }
    while val > 0 {
        out.push(digit(val % 64));
        val /= 64;
    }

    out
}

/// Parses a compact description into a map of the given grid size
pub fn decode(desc: &str, rows: usize, cols: usize) -> Result<MazeMap, MazeError> {
    let digits = desc
        .bytes()
        .map(|b| {
            BASE64_DIGITS
                .iter()
                .position(|&d| d == b)
                .ok_or_else(|| MazeError::Format(format!("{:?} is not a base-64 digit", b as char)))
        })
        .collect::<Result<Vec<usize>, MazeError>>()?;

    if digits.len() < 5 {
        return Err(MazeError::Format("header is incomplete".to_string()));
    }
    let (h, w, lr, lc) = (digits[0], digits[1], digits[2], digits[3]);
    check_size(h, w, rows, cols)?;
    if lr >= h || lc >= w || digits[4] >= 4 {
        return Err(MazeError::Format("agent location lies outside the map".to_string()));
    }
    let dir = Dir::from_index(digits[4]);

    let square_digits = (h * w + BITS_PER_DIGIT - 1) / BITS_PER_DIGIT;
    let trits = (h + 1) * w + h * (w + 1);
    let full_groups = trits / TRITS_PER_GROUP;
    let wall_start = 5 + square_digits;
    let tail_start = wall_start + full_groups * DIGITS_PER_GROUP;
    if digits.len() < tail_start || digits.len() > tail_start + DIGITS_PER_GROUP {
        return Err(MazeError::Format(format!(
            "expected {} to {} digits, got {}",
            tail_start,
            tail_start + DIGITS_PER_GROUP,
            digits.len()
        )));
    }

    let mut maze = MazeMap::unexplored(rows, cols);
    for (n, &value) in digits[5..wall_start].iter().enumerate() {
        for bit in 0..BITS_PER_DIGIT {
            let index = n * BITS_PER_DIGIT + bit;
            if value >> bit & 1 == 0 {
                continue;
            }
            if index >= h * w {
                return Err(MazeError::Format("square bits past the end of the map".to_string()));
            }
            maze.set_square(index / w, index % w, State::Present);
        }
    }

    let mut states = Vec::with_capacity(trits);
    for group in digits[wall_start..tail_start].chunks(DIGITS_PER_GROUP) {
        unpack_trits(group, TRITS_PER_GROUP, &mut states)?;
    }
    unpack_trits(&digits[tail_start..], trits % TRITS_PER_GROUP, &mut states)?;

    let slots = wall_slots(h, w);
    for ((r, c, dir), state) in slots.into_iter().zip(states) {
        set_known_wall(&mut maze, r, c, dir, state)?;
    }

    maze.set_pose(Location::new(lr, lc, dir), origin_rect(h, w, rows, cols));
    Ok(maze)
}

fn wall_char(state: State, present: char) -> char {
    match state {
        State::Present => present,
        State::Absent => ' ',
        State::Unknown => '?',
    }
}

fn square_char(maze: &MazeMap, r: usize, c: usize) -> char {
    let loc = maze.loc();
    if loc.r == r && loc.c == c {
        maze.dir().glyph()
    } else if maze.square(r, c) == State::Present {
        ' '
    } else {
        '?'
    }
}

fn parse_wall(ch: char, present: char, line: usize, column: usize) -> Result<State, MazeError> {
    match ch {
        ' ' => Ok(State::Absent),
        '?' => Ok(State::Unknown),
        _ if ch == present => Ok(State::Present),
        _ => Err(MazeError::Format(format!(
            "unexpected {:?} at line {}, column {}",
            ch,
            line + 1,
            column + 1
        ))),
    }
}

fn set_known_wall(maze: &mut MazeMap, r: usize, c: usize, dir: Dir, state: State) -> Result<(), MazeError> {
    if state.is_resolved() {
        maze.set_wall(r, c, dir, state)?;
    }
    Ok(())
}

fn check_size(h: usize, w: usize, rows: usize, cols: usize) -> Result<(), MazeError> {
    if h == 0 || w == 0 || h > rows || w > cols {
        return Err(MazeError::Format(format!(
            "a {}x{} map does not fit a {}x{} grid",
            h, w, rows, cols
        )));
    }
    Ok(())
}

fn origin_rect(h: usize, w: usize, rows: usize, cols: usize) -> Rect {
    Rect {
        top: 0,
        left: 0,
        bottom: h % rows,
        right: w % cols,
    }
}

/// Wall positions in encoding order, relative to the rectangle's corner
fn wall_slots(h: usize, w: usize) -> Vec<(usize, usize, Dir)> {
    let horizontal = (0..=h).flat_map(move |i| (0..w).map(move |j| (i, j, Dir::North)));
    let vertical = (0..h).flat_map(move |i| (0..=w).map(move |j| (i, j, Dir::West)));
    horizontal.chain(vertical).collect()
}

fn wall_states(maze: &MazeMap, border: Rect, h: usize, w: usize) -> Vec<State> {
    wall_slots(h, w)
        .into_iter()
        .map(|(i, j, dir)| maze.wall(border.top + i, border.left + j, dir))
        .collect()
}

/// Expands little-endian base-64 digits into `count` trits
fn unpack_trits(digits: &[usize], count: usize, out: &mut Vec<State>) -> Result<(), MazeError> {
    let mut val = digits.iter().rev().fold(0usize, |acc, &d| acc * 64 + d);
    for _ in 0..count {
        // from_trit only fails for values >= 3, which `% 3` rules out
        out.push(State::from_trit((val % 3) as u32).unwrap_or_default());
        val /= 3;
    }
    if val != 0 {
        return Err(MazeError::Format("wall data overflows its group".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelDir;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SAMPLE: &str = "\
+-+-+-+
|^    |
+ +-+?+
| |?  ?
+-+-+-+
";

    #[test]
    fn test_scan_sample() {
        let maze = scan(SAMPLE, 25, 25).unwrap();
        assert_eq!(maze.height(), 2);
        assert_eq!(maze.width(), 3);
        assert_eq!(maze.location(), Location::new(0, 0, Dir::North));
        assert_eq!(maze.wall(0, 0, Dir::North), State::Present);
        assert_eq!(maze.wall(1, 0, Dir::North), State::Absent);
        assert_eq!(maze.wall(1, 2, Dir::North), State::Unknown);
        assert_eq!(maze.wall(1, 1, Dir::West), State::Present);
        assert_eq!(maze.wall(1, 2, Dir::East), State::Unknown);
        assert_eq!(maze.square(1, 1), State::Unknown);
        assert_eq!(maze.square(1, 2), State::Present);
        assert_eq!(maze.count_squares(), 5);
    }

    #[test]
    fn test_print_reproduces_scanned_text() {
        let maze = scan(SAMPLE, 25, 25).unwrap();
        assert_eq!(print(&maze), SAMPLE);
    }

    #[test]
    fn test_scan_rejects_bad_text() {
        assert!(scan("+-+\n", 25, 25).is_err());
        assert!(scan("+-+\n|x|\n+-+\n", 25, 25).is_err());
        assert!(scan("+-+-+\n|^ >|\n+-+-+\n", 25, 25).is_err());
        assert!(scan("+-+-+-+\n|     |\n+-+-+-+\n", 2, 2).is_err());
    }

    #[test]
    fn test_scan_pads_short_lines() {
        let maze = scan("+-+-+\n|  >\n+-+-+\n", 25, 25).unwrap();
        assert_eq!(maze.wall(0, 2, Dir::West), State::Absent);
        assert_eq!(maze.location(), Location::new(0, 1, Dir::East));
    }

    #[test]
    fn test_encode_header() {
        let maze = scan(SAMPLE, 25, 25).unwrap();
        let desc = encode(&maze);
        // h=2, w=3, row 0, column 0, north
        assert!(desc.starts_with("CDAAA"));
        assert_eq!(decode(&desc, 25, 25).unwrap(), maze);
    }

    #[test]
    fn test_encoding_is_relative_to_border() {
        let mut maze = MazeMap::new(25, 25);
        maze.initialize(20, 23, Dir::East);
        maze.look("BLW", RelDir::Front).unwrap();
        maze.look("W", RelDir::Left).unwrap();
        maze.look("NW", RelDir::Back).unwrap();

        let desc = encode(&maze);
        let decoded = decode(&desc, 25, 25).unwrap();
        assert_eq!(decoded.border().top, 0);
        assert_eq!(decoded.border().left, 0);
        assert_eq!(decoded.height(), maze.height());
        assert_eq!(decoded.width(), maze.width());
        assert_eq!(encode(&decoded), desc);
        assert_eq!(print(&decoded), print(&maze));
    }

    #[test]
    fn test_decode_rejects_bad_descriptions() {
        assert!(decode("", 25, 25).is_err());
        assert!(decode("CDAA", 25, 25).is_err());
        assert!(decode("CDAA*", 25, 25).is_err());
        assert!(decode("CDCAA", 25, 25).is_err());
        assert!(decode("ZZAAA", 5, 5).is_err());
        assert!(decode("maze.txt", 25, 25).is_err());
        let desc = encode(&scan(SAMPLE, 25, 25).unwrap());
        assert!(decode(&format!("{}AAAAA", desc), 25, 25).is_err());
    }

    /// Random map whose rectangle sits at the origin, so decoding must
    /// reproduce it exactly
    fn random_map(rng: &mut StdRng) -> MazeMap {
        let rows = rng.random_range(1..=30);
        let cols = rng.random_range(1..=30);
        let h = rng.random_range(1..=rows);
        let w = rng.random_range(1..=cols);
        let mut maze = MazeMap::unexplored(rows, cols);

        for i in 0..h {
            for j in 0..w {
                if rng.random_bool(0.6) {
                    maze.set_square(i, j, State::Present);
                }
            }
        }
        for (r, c, dir) in wall_slots(h, w) {
            let state = match rng.random_range(0..3) {
                0 => State::Absent,
                1 => State::Unknown,
                _ => State::Present,
            };
            if maze.wall(r, c, dir) == State::Unknown {
                set_known_wall(&mut maze, r, c, dir, state).unwrap();
            }
        }

        let loc = Location::new(
            rng.random_range(0..h),
            rng.random_range(0..w),
            Dir::from_index(rng.random_range(0..4)),
        );
        maze.set_square(loc.r, loc.c, State::Present);
        maze.set_pose(loc, origin_rect(h, w, rows, cols));
        maze
    }

    #[test]
    fn test_random_maps_survive_both_formats() {
        let mut rng = StdRng::seed_from_u64(0x6d617a65);
        for round in 0..150 {
            let maze = random_map(&mut rng);
            let (rows, cols) = (maze.rows(), maze.cols());

            let desc = encode(&maze);
            assert_eq!(decode(&desc, rows, cols).unwrap(), maze, "round {} via {}", round, desc);

            let text = print(&maze);
            assert_eq!(scan(&text, rows, cols).unwrap(), maze, "round {} via\n{}", round, text);
        }
    }
}
