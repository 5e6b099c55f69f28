// Replay module for reviewing recorded matches
//
// This module provides functionality to:
// 1. Parse JSONL match logs written by the arbiter
// 2. Rebuild the turn table and per-player statistics
// 3. Render the map each player held after a turn

use log::{info, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::match_log::TurnRecord;
use crate::maze_io::{decode, print};

/// Totals for one player over a replayed log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayerStats {
    /// Turns played, not counting the starting-square record
    pub turns: usize,
    pub moves: i64,
    pub discovered: i64,
    pub first: i64,
    pub captures: i64,
    /// Running total after the last record
    pub total: i64,
    /// Length of the longest applied turn
    pub longest_turn: usize,
}

/// Statistics for a complete replay session
#[derive(Debug, Default)]
pub struct ReplayStats {
    pub total_records: usize,
    pub rounds: usize,
    pub players: Vec<PlayerStats>,
}

/// Replay engine for match logs
pub struct ReplayEngine {
    rows: usize,
    cols: usize,
    verbose: bool,
}

impl ReplayEngine {
    /// Creates a replay engine for maps of the given grid size
    pub fn new(rows: usize, cols: usize, verbose: bool) -> Self {
        ReplayEngine { rows, cols, verbose }
    }

    /// Loads all records from a JSONL file
    pub fn load_log_file<P: AsRef<Path>>(&self, log_path: P) -> Result<Vec<TurnRecord>, String> {
        let file = File::open(log_path.as_ref()).map_err(|e| format!("Failed to open log file: {}", e))?;

        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| format!("Failed to read line {}: {}", line_num + 1, e))?;

            if line.trim().is_empty() {
                continue;
            }

            let record: TurnRecord = serde_json::from_str(&line)
                .map_err(|e| format!("Failed to parse JSON on line {}: {}", line_num + 1, e))?;

            records.push(record);
        }

        info!("Loaded {} match log records", records.len());
        Ok(records)
    }

    /// Keeps the records of the given rounds, in log order
    pub fn select_turns<'a>(
        &self,
        records: &'a [TurnRecord],
        turns: &[usize],
    ) -> Result<Vec<&'a TurnRecord>, String> {
        for turn in turns {
            if !records.iter().any(|r| r.turn == *turn) {
                return Err(format!("Turn {} not found in log file", turn));
            }
        }
        Ok(records.iter().filter(|r| turns.contains(&r.turn)).collect())
    }

    /// Draws the map a player held after the recorded turn
    pub fn render_map(&self, record: &TurnRecord) -> Result<String, String> {
        let maze = decode(&record.map, self.rows, self.cols).map_err(|e| {
            format!(
                "Turn {} player {}: bad map description: {}",
                record.turn,
                record.player + 1,
                e
            )
        })?;
        Ok(print(&maze))
    }

    /// Generates statistics from match records
    pub fn generate_stats(&self, records: &[TurnRecord]) -> ReplayStats {
        let players = records.iter().map(|r| r.player + 1).max().unwrap_or(0);
        let mut stats = ReplayStats {
            total_records: records.len(),
            rounds: records.iter().map(|r| r.turn).max().unwrap_or(0),
            players: vec![PlayerStats::default(); players],
        };

        for record in records {
            let player = &mut stats.players[record.player];
            if record.turn > 0 {
                player.turns += 1;
            }
            player.moves += record.moves;
            player.discovered += record.discovered;
            player.first += record.first;
            player.captures += record.captures;
            player.total = record.total;
            player.longest_turn = player.longest_turn.max(record.turn_string.len());
        }

        stats
    }

    /// Prints the turn table, optionally with maps, followed by a summary
    pub fn print_report(&self, records: &[&TurnRecord], show_maps: bool) {
        println!("#Turn Player Moves Disc. First Capt. Score Total");
        println!("------------------------------------------------");
        for record in records {
            println!(
                " {:5} {:5} {:5} {:5} {:5} {:5} {:5} {:5}",
                record.turn,
                record.player + 1,
                record.moves,
                record.discovered,
                record.first,
                record.captures,
                record.score,
                record.total
            );
            if self.verbose && !record.turn_string.is_empty() {
                println!("       turn: {}", record.turn_string);
            }
            if self.verbose && !record.comments.trim().is_empty() {
                for line in record.comments.lines() {
                    println!("       # {}", line);
                }
            }
            if show_maps {
                match self.render_map(record) {
                    Ok(map) => print!("{}", map),
                    Err(e) => warn!("{}", e),
                }
            }
        }

        let owned: Vec<TurnRecord> = records.iter().map(|r| (*r).clone()).collect();
        let stats = self.generate_stats(&owned);

        println!("\n═══════════════════════════════════════════════════════════");
        println!("                    MATCH REPORT");
        println!("═══════════════════════════════════════════════════════════");
        println!("Records:        {}", stats.total_records);
        println!("Rounds:         {}", stats.rounds);
        for (p, player) in stats.players.iter().enumerate() {
            if player == &PlayerStats::default() {
                continue;
            }
            println!(
                "Player {}:       {} turns, {} moves, {} squares ({} first), {} captures, total {}",
                p + 1,
                player.turns,
                player.moves,
                player.discovered,
                player.first,
                player.captures,
                player.total
            );
        }
        println!("═══════════════════════════════════════════════════════════\n");
    }
}
