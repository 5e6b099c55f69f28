// Match arbiter
//
// Holds the ground-truth maze and one map per player, feeds each player its
// lines of sight, validates and applies the turns it sends back, and keeps
// score until the turn budget runs out or the match is decided.
//
// The master map starts with every wall known and every square unknown.
// Squares are marked on it as players discover them, which is how
// "discovered first" is tracked.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use log::{info, warn};
use rand::Rng;
use serde::Serialize;

use crate::config::{Config, GridConfig, RulesConfig};
use crate::error::{ArbiterError, MazeError, ProtocolError};
use crate::infer::infer;
use crate::match_log::{timestamp, MatchLogger, TurnRecord};
use crate::maze::MazeMap;
use crate::maze_io::{encode, scan};
use crate::process::AgentProcess;
use crate::types::{Dir, Location, RelDir, State};

/// Running score of one player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Score {
    /// Length of every turn submitted (-1 point each)
    pub moves: i64,
    /// Squares on the player's map (1 point each)
    pub discovered: i64,
    /// Squares nobody had discovered before (1 more point each)
    pub discovered_first: i64,
    /// Times the player landed on its opponent
    pub captures: i64,
}

impl Score {
    pub fn total(&self, capture_points: i64) -> i64 {
        -self.moves + self.discovered + self.discovered_first + capture_points * self.captures
    }
}

/// Score change caused by one turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreDelta {
    pub moves: i64,
    pub discovered: i64,
    pub first: i64,
    pub captures: i64,
    /// Change of the total
    pub score: i64,
    /// Total after the turn
    pub total: i64,
}

/// What the arbiter tracks for each player
#[derive(Debug, Clone)]
pub struct AgentState {
    /// The player's knowledge, kept in true coordinates
    pub maze: MazeMap,
    pub score: Score,
    pub map_complete: bool,
}

/// How a match ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Every player used up its turns
    TurnLimit,
    /// The only player discovered the whole maze
    Completed { player: usize },
    /// A player with a complete map landed on its opponent
    SuddenDeath { winner: usize },
    /// A player broke the protocol
    Forfeit { player: usize, reason: String },
}

impl MatchOutcome {
    /// The player whose score is doubled, if the match was decided
    pub fn winner(&self, players: usize) -> Option<usize> {
        match *self {
            MatchOutcome::SuddenDeath { winner } => Some(winner),
            MatchOutcome::Forfeit { player, .. } if players == 2 => Some(1 - player),
            _ => None,
        }
    }

    pub fn is_forfeit(&self) -> bool {
        matches!(self, MatchOutcome::Forfeit { .. })
    }
}

/// Ground truth plus every player's map and score
#[derive(Debug, Clone)]
pub struct MatchState {
    master: MazeMap,
    agents: Vec<AgentState>,
    rules: RulesConfig,
}

impl MatchState {
    /// Starts a match with players at fixed positions
    pub fn with_agents(master: MazeMap, starts: &[Location], rules: RulesConfig) -> Result<Self, ArbiterError> {
        if starts.is_empty() || starts.len() > 2 {
            return Err(ArbiterError::PlayerCount(starts.len()));
        }

        let agents = starts
            .iter()
            .map(|start| {
                let mut maze = MazeMap::new(master.rows(), master.cols());
                maze.initialize(start.r, start.c, start.dir);
                AgentState {
                    maze,
                    score: Score::default(),
                    map_complete: false,
                }
            })
            .collect();

        Ok(MatchState { master, agents, rules })
    }

    /// Starts a match with players placed at random
    ///
    /// Each player faces away from an opening. With two players, draws are
    /// repeated until they start at least `min_start_distance_sq` apart.
    pub fn place<R: Rng>(master: MazeMap, players: usize, rules: RulesConfig, rng: &mut R) -> Result<Self, ArbiterError> {
        if players == 0 || players > 2 {
            return Err(ArbiterError::PlayerCount(players));
        }

        for _ in 0..rules.placement_attempts {
            let starts: Vec<Location> = (0..players).map(|_| random_start(&master, rng)).collect();
            let open_behind = starts
                .iter()
                .all(|s| master.wall(s.r, s.c, s.dir.turn(RelDir::Back)) == State::Absent);
            if !open_behind {
                continue;
            }
            if players == 1 || raw_distance_sq(starts[0], starts[1]) >= rules.min_start_distance_sq {
                for (p, start) in starts.iter().enumerate() {
                    info!("Player {} starts at ({}, {}) facing {:?}", p + 1, start.r, start.c, start.dir);
                }
                return Self::with_agents(master, &starts, rules);
            }
        }

        Err(ArbiterError::Placement(rules.placement_attempts))
    }

    pub fn players(&self) -> usize {
        self.agents.len()
    }

    pub fn agent(&self, player: usize) -> &AgentState {
        &self.agents[player]
    }

    pub fn master(&self) -> &MazeMap {
        &self.master
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// What `player` sees looking in direction `rel`
    pub fn line_of_sight(&self, player: usize, rel: RelDir) -> String {
        let maze = &self.agents[player].maze;
        let front = maze.dir().turn(rel);
        let left = front.turn(RelDir::Left);
        let right = front.turn(RelDir::Right);
        let here = maze.loc();
        let (mut r, mut c) = (here.r, here.c);
        let mut line = String::new();

        // A validated maze always blocks the view before it wraps around
        let limit = self.master.rows().max(self.master.cols());
        while self.master.wall(r, c, front) == State::Absent && line.len() < limit {
            (r, c) = self.master.neighbor(r, c, front);
            let open_left = self.master.wall(r, c, left) == State::Absent;
            let open_right = self.master.wall(r, c, right) == State::Absent;
            line.push(match (open_left, open_right) {
                (true, true) => 'B',
                (true, false) => 'L',
                (false, true) => 'R',
                (false, false) => 'N',
            });
        }
        line.push('W');
        line
    }

    /// Computes the four lines of sight, applies them to the player's map and
    /// runs inference. Returns the lines in Front, Right, Back, Left order.
    pub fn observe(&mut self, player: usize) -> Result<[String; 4], MazeError> {
        let lines = RelDir::all().map(|rel| self.line_of_sight(player, rel));
        let maze = &mut self.agents[player].maze;
        for (line, rel) in lines.iter().zip(RelDir::all()) {
            maze.look(line, rel)?;
        }
        infer(maze)?;
        Ok(lines)
    }

    /// Squared distance between the players, or -1 with a single player
    pub fn distance_sq(&self) -> i64 {
        match self.agents.as_slice() {
            [a, b] => raw_distance_sq(a.maze.location(), b.maze.location()),
            _ => -1,
        }
    }

    /// Number of leading commands of `turn` that stay clear of walls
    pub fn valid_prefix_len(&self, player: usize, turn: &str) -> usize {
        let maze = &self.agents[player].maze;
        let here = maze.loc();
        let (mut r, mut c, mut dir) = (here.r, here.c, maze.dir());

        let mut len = 0;
        for command in turn.chars() {
            let Some(rel) = RelDir::from_command(command) else {
                break;
            };
            dir = dir.turn(rel);
            if self.master.wall(r, c, dir) != State::Absent {
                break;
            }
            (r, c) = self.master.neighbor(r, c, dir);
            len += 1;
        }
        len
    }

    /// Applies the longest valid prefix of `turn` to the player's map
    ///
    /// A player that ends up where it started is moved one extra step, the
    /// first of back, left, right and front that is open. Returns the
    /// commands actually performed.
    pub fn apply_turn(&mut self, player: usize, turn: &str) -> Result<String, MazeError> {
        let len = self.valid_prefix_len(player, turn);
        if len < turn.len() {
            warn!(
                "Player {}'s turn `{}` was truncated by {} moves",
                player + 1,
                turn,
                turn.len() - len
            );
        }

        let mut applied = turn[..len].to_string();
        let origin = self.agents[player].maze.loc();
        self.agents[player].maze.turn(&applied)?;

        let maze = &self.agents[player].maze;
        if maze.loc() == origin {
            let here = maze.loc();
            let forced = [RelDir::Back, RelDir::Left, RelDir::Right, RelDir::Front]
                .into_iter()
                .find(|&rel| self.master.wall(here.r, here.c, maze.dir().turn(rel)) == State::Absent);
            if let Some(rel) = forced {
                warn!(
                    "Player {} returned to its starting square, forcing `{}`",
                    player + 1,
                    rel.command()
                );
                self.agents[player].maze.step(rel.command())?;
                applied.push(rel.command());
            }
        }

        Ok(applied)
    }

    /// Charges `moves` and credits discoveries and captures
    ///
    /// A capture is credited to the mover when both players share a square
    /// and the mover's map is still incomplete; with a complete map the same
    /// meeting ends the match instead (see [`MatchState::decisive_end`]).
    pub fn score_turn(&mut self, player: usize, moves: usize) -> ScoreDelta {
        let old = self.agents[player].score;
        let mut new = old;
        new.moves += moves as i64;
        new.discovered = 0;

        let (rows, cols) = (self.master.rows(), self.master.cols());
        for r in 0..rows {
            for c in 0..cols {
                if self.agents[player].maze.square(r, c) != State::Present {
                    continue;
                }
                new.discovered += 1;
                if self.master.square(r, c) == State::Unknown {
                    self.master.set_square(r, c, State::Present);
                    new.discovered_first += 1;
                }
            }
        }

        let complete = new.discovered == (rows * cols) as i64;
        self.agents[player].map_complete = complete;
        if !complete && self.distance_sq() == 0 {
            info!("Player {} captured its opponent", player + 1);
            new.captures += 1;
        }
        self.agents[player].score = new;

        let points = self.rules.capture_points;
        ScoreDelta {
            moves: new.moves - old.moves,
            discovered: new.discovered - old.discovered,
            first: new.discovered_first - old.discovered_first,
            captures: new.captures - old.captures,
            score: new.total(points) - old.total(points),
            total: new.total(points),
        }
    }

    /// Ends the match once `player` has a complete map and is either alone
    /// or standing on its opponent
    pub fn decisive_end(&self, player: usize) -> Option<MatchOutcome> {
        if !self.agents[player].map_complete {
            return None;
        }
        match self.players() {
            1 => Some(MatchOutcome::Completed { player }),
            _ if self.distance_sq() == 0 => Some(MatchOutcome::SuddenDeath { winner: player }),
            _ => None,
        }
    }

    /// Final scores: the winner of a decided match doubles its total and the
    /// loser gets nothing, then every score is clamped to [0, score_cap]
    pub fn final_scores(&self, outcome: &MatchOutcome) -> Vec<i64> {
        let winner = outcome.winner(self.players());
        self.agents
            .iter()
            .enumerate()
            .map(|(p, agent)| {
                let total = agent.score.total(self.rules.capture_points);
                let total = match winner {
                    Some(w) if w == p => 2 * total,
                    Some(_) => 0,
                    None => total,
                };
                total.clamp(0, self.rules.score_cap)
            })
            .collect()
    }
}

/// Checks that a turn is 1 to `max_len` commands drawn from F, T, L, R
pub fn check_syntax(turn: &str, max_len: usize) -> Result<(), ProtocolError> {
    let valid = !turn.is_empty()
        && turn.len() <= max_len
        && turn.chars().all(|ch| RelDir::from_command(ch).is_some());
    if valid {
        Ok(())
    } else {
        Err(ProtocolError::InvalidTurn(turn.to_string()))
    }
}

/// Reads and validates a ground-truth maze file; all squares start unknown
pub fn load_maze<P: AsRef<Path>>(path: P, grid: &GridConfig) -> Result<MazeMap, ArbiterError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ArbiterError::MazeFile {
        path: path.display().to_string(),
        source,
    })?;

    let mut maze = scan(&text, grid.height, grid.width)?;
    validate_ground_truth(&maze).map_err(ArbiterError::InvalidMaze)?;
    maze.clear_squares();
    info!("Loaded {}x{} maze from {}", grid.height, grid.width, path.display());
    Ok(maze)
}

/// Checks the properties the inference rules rely on
///
/// The maze must cover the whole grid with every wall known, be bounded by
/// one fully walled row line and one fully walled column line, have no open
/// 2x2 block, and be connected.
pub fn validate_ground_truth(maze: &MazeMap) -> Result<(), String> {
    let (rows, cols) = (maze.rows(), maze.cols());
    if maze.height() != rows || maze.width() != cols {
        return Err(format!(
            "maze is {}x{}, expected {}x{}",
            maze.height(),
            maze.width(),
            rows,
            cols
        ));
    }

    for r in 0..rows {
        for c in 0..cols {
            for dir in [Dir::North, Dir::West] {
                if !maze.wall(r, c, dir).is_resolved() {
                    return Err(format!("wall {:?} of ({}, {}) is unknown", dir, r, c));
                }
            }
        }
    }

    let walled_row = (0..rows).any(|r| (0..cols).all(|c| maze.wall(r, c, Dir::North) == State::Present));
    let walled_col = (0..cols).any(|c| (0..rows).all(|r| maze.wall(r, c, Dir::West) == State::Present));
    if !walled_row || !walled_col {
        return Err("maze needs a fully walled row line and column line as its boundary".to_string());
    }

    for r in 0..rows {
        for c in 0..cols {
            let segments = [
                maze.wall(r, (c + cols - 1) % cols, Dir::North),
                maze.wall(r, c, Dir::North),
                maze.wall((r + rows - 1) % rows, c, Dir::West),
                maze.wall(r, c, Dir::West),
            ];
            if segments.iter().all(|&s| s == State::Absent) {
                return Err(format!("no wall touches the north-west corner of ({}, {})", r, c));
            }
        }
    }

    let mut seen = vec![false; rows * cols];
    let mut queue = VecDeque::from([(0usize, 0usize)]);
    seen[0] = true;
    let mut reached = 1;
    while let Some((r, c)) = queue.pop_front() {
        for dir in Dir::all() {
            if maze.wall(r, c, dir) != State::Absent {
                continue;
            }
            let (nr, nc) = maze.neighbor(r, c, dir);
            if !seen[nr * cols + nc] {
                seen[nr * cols + nc] = true;
                reached += 1;
                queue.push_back((nr, nc));
            }
        }
    }
    if reached != rows * cols {
        return Err(format!("only {} of {} squares are connected", reached, rows * cols));
    }

    Ok(())
}

/// Squared Euclidean distance on true coordinates, ignoring wrap-around
pub fn raw_distance_sq(a: Location, b: Location) -> i64 {
    let dr = a.r as i64 - b.r as i64;
    let dc = a.c as i64 - b.c as i64;
    dr * dr + dc * dc
}

fn random_start<R: Rng>(master: &MazeMap, rng: &mut R) -> Location {
    Location::new(
        rng.random_range(0..master.rows()),
        rng.random_range(0..master.cols()),
        Dir::from_index(rng.random_range(0..4)),
    )
}

/// Summary of a finished match
#[derive(Debug, Clone)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    /// Turns played across all players
    pub turns: usize,
    pub scores: Vec<Score>,
    pub final_scores: Vec<i64>,
}

/// A match between running agent processes
pub struct Arbiter {
    config: Config,
    state: MatchState,
    agents: Vec<AgentProcess>,
    logger: MatchLogger,
}

impl Arbiter {
    /// Launches one agent per player
    ///
    /// Must be called from within a tokio runtime.
    pub fn launch(
        config: Config,
        state: MatchState,
        commands: &[String],
        logger: MatchLogger,
    ) -> Result<Self, ArbiterError> {
        if commands.len() != state.players() {
            return Err(ArbiterError::PlayerCount(commands.len()));
        }

        let agents = commands
            .iter()
            .enumerate()
            .map(|(p, command)| {
                AgentProcess::spawn(
                    &format!("player {}", p + 1),
                    command,
                    config.protocol.stderr_limit_bytes,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Arbiter {
            config,
            state,
            agents,
            logger,
        })
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Plays the match to the end and shuts the agents down
    pub async fn run(mut self) -> Result<MatchReport, ArbiterError> {
        let players = self.state.players();
        let max_turns = self.config.rules.max_turns_per_player * players;

        println!("#Turn Player Moves Disc. First Capt. Score Total");
        println!("------------------------------------------------");

        // Starting squares count as discovered
        for p in 0..players {
            let delta = self.state.score_turn(p, 0);
            self.record(0, p, "", &delta, String::new()).await;
        }

        let mut outcome = MatchOutcome::TurnLimit;
        let mut turns = 0;

        if let Err(e) = self.agents[0].send_line("Start").await {
            outcome = self.forfeit(0, e);
        } else {
            while turns < max_turns {
                let p = turns % players;
                match self.play_turn(turns, p).await {
                    Ok(None) => turns += 1,
                    Ok(Some(end)) => {
                        if !end.is_forfeit() {
                            turns += 1;
                        }
                        outcome = end;
                        break;
                    }
                    Err(e) => {
                        self.shutdown().await;
                        return Err(e);
                    }
                }
            }
        }

        println!("------------------------------------------------");
        let final_scores = self.state.final_scores(&outcome);
        match final_scores.as_slice() {
            [only] => println!("Score: {} (after {} turns)", only, turns),
            [first, second] => println!("Score: {} - {} (after {} turns)", first, second, turns),
            _ => {}
        }
        info!("Match over after {} turns: {:?}", turns, outcome);

        let scores = (0..players).map(|p| self.state.agent(p).score).collect();
        self.shutdown().await;

        Ok(MatchReport {
            outcome,
            turns,
            scores,
            final_scores,
        })
    }

    /// One observation, response and scoring round for `player`
    async fn play_turn(&mut self, turn_no: usize, player: usize) -> Result<Option<MatchOutcome>, ArbiterError> {
        let lines = self.state.observe(player)?;
        let distsq = self.state.distance_sq();

        let protocol = &self.config.protocol;
        let exchange = exchange(
            &mut self.agents[player],
            &lines,
            distsq,
            protocol.turn_timeout(),
            protocol.max_line_bytes,
            self.config.rules.max_turn_length,
        )
        .await;

        let turn = match exchange {
            Ok(turn) => turn,
            Err(e) => return Ok(Some(self.forfeit(player, e))),
        };

        let applied = self.state.apply_turn(player, &turn)?;
        let comments = self.agents[player].take_comments();
        let delta = self.state.score_turn(player, turn.len());
        self.record(turn_no / self.state.players() + 1, player, &applied, &delta, comments)
            .await;

        Ok(self.state.decisive_end(player))
    }

    fn forfeit(&self, player: usize, error: ProtocolError) -> MatchOutcome {
        warn!("Player {} forfeits: {}", player + 1, error);
        println!("Player {} forfeits: {}!", player + 1, error);
        MatchOutcome::Forfeit {
            player,
            reason: error.to_string(),
        }
    }

    /// Prints a row of the turn table and appends it to the match log
    async fn record(&self, turn_no: usize, player: usize, applied: &str, delta: &ScoreDelta, comments: String) {
        println!(
            " {:5} {:5} {:5} {:5} {:5} {:5} {:5} {:5}",
            turn_no,
            player + 1,
            delta.moves,
            delta.discovered,
            delta.first,
            delta.captures,
            delta.score,
            delta.total
        );

        if self.logger.is_enabled() {
            let record = TurnRecord {
                turn: turn_no,
                player,
                turn_string: applied.to_string(),
                moves: delta.moves,
                discovered: delta.discovered,
                first: delta.first,
                captures: delta.captures,
                score: delta.score,
                total: delta.total,
                map: encode(&self.state.agent(player).maze),
                comments,
                timestamp: timestamp(),
            };
            self.logger.log_turn(&record).await;
        }
    }

    async fn shutdown(&mut self) {
        let grace = self.config.protocol.quit_grace();
        for agent in self.agents.drain(..) {
            agent.shutdown(grace).await;
        }
    }
}

/// Sends the lines of sight and the opponent distance, then reads back a turn
async fn exchange(
    agent: &mut AgentProcess,
    lines: &[String; 4],
    distsq: i64,
    timeout: std::time::Duration,
    max_line_bytes: usize,
    max_turn_length: usize,
) -> Result<String, ProtocolError> {
    for line in lines {
        agent.send_line(line).await?;
    }
    agent.send_line(&distsq.to_string()).await?;
    let turn = agent.read_line(timeout, max_line_bytes).await?;
    check_syntax(&turn, max_turn_length)?;
    Ok(turn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Agent;

    /// 5x5 maze: every row is an east-west corridor joined by a spine in
    /// column 0, with the boundary above row 3 and west of column 0
    const COMB: &str = "\
+ +-+-+-+-+
|         |
+ +-+-+-+-+
|         |
+ +-+-+-+-+
|         |
+-+-+-+-+-+
|         |
+ +-+-+-+-+
|         |
+ +-+-+-+-+
";

    fn comb() -> MazeMap {
        let mut maze = scan(COMB, 5, 5).unwrap();
        validate_ground_truth(&maze).unwrap();
        maze.clear_squares();
        maze
    }

    fn rules() -> RulesConfig {
        let mut rules = Config::default_hardcoded().rules;
        rules.min_start_distance_sq = 4;
        rules
    }

    #[test]
    fn test_check_syntax() {
        assert!(check_syntax("FRTL", 256).is_ok());
        assert!(check_syntax("", 256).is_err());
        assert!(check_syntax("FFX", 256).is_err());
        assert!(check_syntax("ff", 256).is_err());
        assert!(check_syntax(&"F".repeat(256), 256).is_ok());
        assert!(matches!(
            check_syntax(&"F".repeat(257), 256),
            Err(ProtocolError::InvalidTurn(_))
        ));
    }

    #[test]
    fn test_validation_rejects_broken_mazes() {
        let mut maze = scan(COMB, 5, 5).unwrap();
        assert!(validate_ground_truth(&maze).is_ok());

        // Partial map
        assert!(validate_ground_truth(&scan("+-+\n| |\n+-+\n", 5, 5).unwrap()).is_err());

        // Unbounded: open the boundary row everywhere but one column
        let open_row = COMB.replacen("+-+-+-+-+-+", "+-+ + + + +", 1);
        assert!(validate_ground_truth(&scan(&open_row, 5, 5).unwrap()).is_err());

        // Disconnected: close the spine between rows 0 and 1
        let split = COMB.replacen("+ +-+-+-+-+\n|         |\n+ +", "+ +-+-+-+-+\n|         |\n+-+", 1);
        assert!(validate_ground_truth(&scan(&split, 5, 5).unwrap()).is_err());

        maze.clear_squares();
        assert!(validate_ground_truth(&maze).is_ok());
    }

    #[test]
    fn test_line_of_sight_reads_ground_truth() {
        let state = MatchState::with_agents(comb(), &[Location::new(1, 0, Dir::East)], rules()).unwrap();
        // East along row 1: four closed squares, then the boundary
        assert_eq!(state.line_of_sight(0, RelDir::Front), "NNNNW");
        // North up the spine to row 0, then (4, 0) and (3, 0), whose north wall is the boundary
        assert_eq!(state.line_of_sight(0, RelDir::Left), "RRRW");
        assert_eq!(state.line_of_sight(0, RelDir::Back), "W");
        assert_eq!(state.line_of_sight(0, RelDir::Right), "LW");
    }

    #[test]
    fn test_truncated_turn_stops_at_wall() {
        let mut state = MatchState::with_agents(comb(), &[Location::new(0, 0, Dir::North)], rules()).unwrap();
        assert_eq!(state.valid_prefix_len(0, "FFFF"), 2);

        let applied = state.apply_turn(0, "FFFF").unwrap();
        assert_eq!(applied, "FF");
        assert_eq!(state.agent(0).maze.location(), Location::new(3, 0, Dir::North));

        let delta = state.score_turn(0, 4);
        assert_eq!(delta.moves, 4);
    }

    #[test]
    fn test_returning_to_start_forces_a_move() {
        let mut state = MatchState::with_agents(comb(), &[Location::new(1, 2, Dir::East)], rules()).unwrap();
        let applied = state.apply_turn(0, "FT").unwrap();
        // Back at (1, 2) facing west; the square behind (east) is open
        assert_eq!(applied, "FTT");
        assert_eq!(state.agent(0).maze.location(), Location::new(1, 3, Dir::East));

        // Blocked from the first command: the forced move is all that happens
        let applied = state.apply_turn(0, "L").unwrap();
        assert_eq!(applied, "T");
    }

    #[test]
    fn test_capture_is_counted_once_per_turn() {
        let starts = [Location::new(1, 1, Dir::East), Location::new(1, 3, Dir::West)];
        let mut state = MatchState::with_agents(comb(), &starts, rules()).unwrap();
        for p in 0..2 {
            state.score_turn(p, 0);
        }
        assert_eq!(state.distance_sq(), 4);

        state.observe(0).unwrap();
        state.apply_turn(0, "FF").unwrap();
        assert_eq!(state.distance_sq(), 0);
        let delta = state.score_turn(0, 2);
        assert_eq!(delta.captures, 1);
        assert_eq!(state.agent(0).score.captures, 1);
        assert_eq!(state.agent(1).score.captures, 0);
        assert_eq!(state.decisive_end(0), None);
    }

    #[test]
    fn test_discovered_first_is_not_shared() {
        let starts = [Location::new(1, 1, Dir::East), Location::new(2, 1, Dir::East)];
        let mut state = MatchState::with_agents(comb(), &starts, rules()).unwrap();
        state.observe(0).unwrap();
        let first = state.score_turn(0, 0);
        // Row 1 plus the spine squares above and below it
        assert_eq!(first.discovered, 7);
        assert_eq!(first.first, 7);

        state.observe(1).unwrap();
        let second = state.score_turn(1, 0);
        // Row 2 plus (1, 0); the boundary hides (3, 0). Only (2, 1..5) are new
        assert_eq!(second.discovered, 6);
        assert_eq!(second.first, 4);
    }

    #[test]
    fn test_final_scores() {
        let starts = [Location::new(1, 1, Dir::East), Location::new(3, 4, Dir::West)];
        let mut state = MatchState::with_agents(comb(), &starts, rules()).unwrap();
        state.score_turn(0, 0);
        state.score_turn(1, 0);
        // One square each, discovered first: 2 points each
        assert_eq!(state.final_scores(&MatchOutcome::TurnLimit), vec![2, 2]);
        assert_eq!(state.final_scores(&MatchOutcome::SuddenDeath { winner: 1 }), vec![0, 4]);
        let forfeit = MatchOutcome::Forfeit {
            player: 1,
            reason: "unexpected end of input".to_string(),
        };
        assert_eq!(state.final_scores(&forfeit), vec![4, 0]);

        state.score_turn(0, 10);
        assert_eq!(state.final_scores(&MatchOutcome::TurnLimit), vec![0, 2]);
    }

    #[test]
    fn test_placement_honours_distance_and_openings() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(17);
        let mut spread = rules();
        spread.min_start_distance_sq = 10;
        for _ in 0..20 {
            let state = MatchState::place(comb(), 2, spread.clone(), &mut rng).unwrap();
            assert!(state.distance_sq() >= 10);
            for p in 0..2 {
                let start = state.agent(p).maze.location();
                let back = start.dir.turn(RelDir::Back);
                assert_eq!(state.master().wall(start.r, start.c, back), State::Absent);
            }
        }

        spread.min_start_distance_sq = 1000;
        assert!(matches!(
            MatchState::place(comb(), 2, spread, &mut rng),
            Err(ArbiterError::Placement(_))
        ));
        assert!(matches!(
            MatchState::place(comb(), 3, rules(), &mut rng),
            Err(ArbiterError::PlayerCount(3))
        ));
    }

    /// Random perfect maze (one path between any two squares) whose row
    /// line 0 and column line 0 are walled, carved by depth-first search
    fn perfect_maze(seed: u64, size: usize) -> MazeMap {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut open_south = vec![vec![false; size]; size];
        let mut open_east = vec![vec![false; size]; size];
        let mut visited = vec![vec![false; size]; size];

        let start = (rng.random_range(0..size), rng.random_range(0..size));
        visited[start.0][start.1] = true;
        let mut stack = vec![start];
        while let Some(&(r, c)) = stack.last() {
            let mut next = Vec::new();
            if r > 0 && !visited[r - 1][c] {
                next.push((r - 1, c));
            }
            if r + 1 < size && !visited[r + 1][c] {
                next.push((r + 1, c));
            }
            if c > 0 && !visited[r][c - 1] {
                next.push((r, c - 1));
            }
            if c + 1 < size && !visited[r][c + 1] {
                next.push((r, c + 1));
            }
            if next.is_empty() {
                stack.pop();
                continue;
            }
            let (nr, nc) = next[rng.random_range(0..next.len())];
            if nr != r {
                open_south[r.min(nr)][c] = true;
            } else {
                open_east[r][c.min(nc)] = true;
            }
            visited[nr][nc] = true;
            stack.push((nr, nc));
        }

        let mut text = String::new();
        for r in 0..size {
            text.push('+');
            for c in 0..size {
                text.push(if r > 0 && open_south[r - 1][c] { ' ' } else { '-' });
                text.push('+');
            }
            text.push_str("\n|");
            for c in 0..size {
                text.push(' ');
                text.push(if open_east[r][c] { ' ' } else { '|' });
            }
            text.push('\n');
        }
        text.push('+');
        text.push_str(&"-+".repeat(size));
        text.push('\n');

        let mut maze = scan(&text, size, size).unwrap();
        validate_ground_truth(&maze).unwrap();
        maze.clear_squares();
        maze
    }

    /// Position and heading in the true maze of a square and direction
    /// taken from a map that started at (0, 0) facing north
    fn to_ground(start: Location, size: usize, r: usize, c: usize, dir: Dir) -> (usize, usize, Dir) {
        let n = size as i64;
        let (mut dr, mut dc) = (r as i64, c as i64);
        for _ in 0..start.dir.index() {
            (dr, dc) = (dc, -dr);
        }
        (
            (start.r as i64 + dr).rem_euclid(n) as usize,
            (start.c as i64 + dc).rem_euclid(n) as usize,
            Dir::from_index(dir.index() + start.dir.index()),
        )
    }

    #[test]
    fn test_maps_stay_sound_on_random_mazes() {
        const SIZE: usize = 25;

        for seed in 0..20 {
            let master = perfect_maze(seed, SIZE);
            let sr = (seed as usize * 7) % SIZE;
            let sc = (seed as usize * 11) % SIZE;
            let dir = Dir::all()
                .into_iter()
                .find(|&d| master.wall(sr, sc, d.turn(RelDir::Back)) == State::Absent)
                .unwrap();
            let start = Location::new(sr, sc, dir);

            let mut state = MatchState::with_agents(master, &[start], rules()).unwrap();
            let mut agent = Agent::new(SIZE, SIZE);

            for turn_no in 0..1500 {
                let lines = state
                    .observe(0)
                    .unwrap_or_else(|e| panic!("seed {} turn {}: arbiter map: {}", seed, turn_no, e));
                agent
                    .observe(&lines)
                    .unwrap_or_else(|e| panic!("seed {} turn {}: agent map: {}", seed, turn_no, e));

                let truth = state.master();
                let tracked = &state.agent(0).maze;
                let own = agent.maze();
                assert_eq!(tracked.count_squares(), own.count_squares(), "seed {}", seed);
                for r in 0..SIZE {
                    for c in 0..SIZE {
                        for d in [Dir::North, Dir::West] {
                            let known = tracked.wall(r, c, d);
                            if known.is_resolved() {
                                let expected = truth.wall(r, c, d);
                                assert_eq!(known, expected, "seed {} ({}, {}) {:?}", seed, r, c, d);
                            }
                            let known = own.wall(r, c, d);
                            if known.is_resolved() {
                                let (tr, tc, td) = to_ground(start, SIZE, r, c, d);
                                let expected = truth.wall(tr, tc, td);
                                assert_eq!(known, expected, "seed {} agent ({}, {}) {:?}", seed, r, c, d);
                            }
                        }
                    }
                }
                assert!(!infer(&mut tracked.clone()).unwrap(), "seed {}", seed);
                assert!(!infer(&mut own.clone()).unwrap(), "seed {}", seed);

                if own.is_complete() {
                    break;
                }
                let turn = agent.pick_move(-1).unwrap();
                let applied = state.apply_turn(0, &turn).unwrap();
                assert_eq!(applied, turn, "seed {} turn {}", seed, turn_no);
                agent.commit(&applied).unwrap();
                state.score_turn(0, applied.len());
            }
        }
    }
}
