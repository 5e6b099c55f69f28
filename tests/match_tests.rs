// Integration tests for whole matches
//
// Drives the arbiter against real agent processes:
// - The reference player exploring a maze to completion
// - Players that break the protocol in different ways
// - The arbiter, replay and convert command lines

use std::path::PathBuf;
use std::process::Command;

use maze_arbiter::arbiter::{load_maze, Arbiter, MatchOutcome, MatchReport, MatchState};
use maze_arbiter::config::Config;
use maze_arbiter::match_log::MatchLogger;
use maze_arbiter::maze::MazeMap;
use maze_arbiter::types::{Dir, Location};

/// Helper function to get the path to test fixtures
fn fixture_path(filename: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(filename)
}

fn small_config() -> Config {
    Config::from_file(fixture_path("arbiter_5x5.toml")).expect("fixture config should load")
}

fn comb(config: &Config) -> MazeMap {
    load_maze(fixture_path("comb_5x5.txt"), &config.grid).expect("fixture maze should load")
}

fn player_command() -> String {
    format!("{} --height 5 --width 5", env!("CARGO_BIN_EXE_player"))
}

async fn play(config: Config, starts: &[Location], commands: &[String]) -> MatchReport {
    let state = MatchState::with_agents(comb(&config), starts, config.rules.clone()).unwrap();
    let arbiter = Arbiter::launch(config, state, commands, MatchLogger::disabled()).unwrap();
    arbiter.run().await.unwrap()
}

#[test]
fn test_fixture_maze_loads_with_unknown_squares() {
    let config = small_config();
    let maze = comb(&config);
    assert_eq!(maze.count_squares(), 0);
    assert_eq!(maze.height(), 5);
    assert_eq!(maze.width(), 5);

    let mut big = config.grid.clone();
    big.height = 25;
    big.width = 25;
    assert!(load_maze(fixture_path("comb_5x5.txt"), &big).is_err());
    assert!(load_maze(fixture_path("missing.txt"), &config.grid).is_err());
}

#[tokio::test]
async fn test_single_player_explores_whole_maze() {
    let config = small_config();
    let report = play(config, &[Location::new(1, 2, Dir::East)], &[player_command()]).await;

    assert_eq!(report.outcome, MatchOutcome::Completed { player: 0 });
    let score = report.scores[0];
    assert_eq!(score.discovered, 25);
    assert_eq!(score.discovered_first, 25);
    assert_eq!(score.captures, 0);
    assert_eq!(score.total(100), 50 - score.moves);
    assert_eq!(report.final_scores, vec![(50 - score.moves).max(0)]);
    assert!(report.turns >= 1 && report.turns <= 150);
}

#[tokio::test]
async fn test_invalid_turn_forfeits_to_opponent() {
    let config = small_config();
    let starts = [Location::new(1, 1, Dir::East), Location::new(3, 3, Dir::East)];
    let report = play(config, &starts, &["echo XYZ".to_string(), player_command()]).await;

    assert!(matches!(report.outcome, MatchOutcome::Forfeit { player: 0, .. }));
    assert_eq!(report.turns, 0);
    // Each player only holds its starting square, discovered first
    assert_eq!(report.final_scores, vec![0, 4]);
}

#[tokio::test]
async fn test_agent_that_exits_forfeits() {
    let config = small_config();
    let report = play(config, &[Location::new(1, 2, Dir::East)], &["true".to_string()]).await;

    assert!(matches!(report.outcome, MatchOutcome::Forfeit { player: 0, .. }));
    // Nobody wins a single-player forfeit; the score stands
    assert_eq!(report.final_scores, vec![2]);
}

#[tokio::test]
async fn test_silent_agent_times_out() {
    let mut config = small_config();
    config.protocol.turn_timeout_ms = 200;
    config.protocol.quit_grace_ms = 200;
    let starts = [Location::new(1, 1, Dir::East), Location::new(3, 3, Dir::East)];
    let report = play(config, &starts, &[player_command(), "sleep 5".to_string()]).await;

    assert!(matches!(report.outcome, MatchOutcome::Forfeit { player: 1, .. }));
    assert_eq!(report.turns, 1);
    assert_eq!(report.final_scores[1], 0);
    assert!(report.final_scores[0] > 0);
}

#[test]
fn test_arbiter_cli_plays_and_logs_a_match() {
    let log_path = std::env::temp_dir().join(format!("match_cli_test_{}.jsonl", std::process::id()));

    let output = Command::new(env!("CARGO_BIN_EXE_arbiter"))
        .arg("--config")
        .arg(fixture_path("arbiter_5x5.toml"))
        .args(["--seed", "3", "--log"])
        .arg(&log_path)
        .arg(fixture_path("comb_5x5.txt"))
        .arg(player_command())
        .output()
        .expect("arbiter should run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "arbiter failed: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.starts_with("#Turn Player Moves Disc. First Capt. Score Total"), "{}", stdout);
    assert!(stdout.contains("Score: "), "{}", stdout);

    let replay = Command::new(env!("CARGO_BIN_EXE_replay"))
        .arg(&log_path)
        .args(["--all", "--maps", "--config"])
        .arg(fixture_path("arbiter_5x5.toml"))
        .output()
        .expect("replay should run");
    let report = String::from_utf8_lossy(&replay.stdout);
    assert!(replay.status.success(), "replay failed: {}", String::from_utf8_lossy(&replay.stderr));
    assert!(report.contains("MATCH REPORT"), "{}", report);
    assert!(report.contains("Player 1:"), "{}", report);

    std::fs::remove_file(&log_path).ok();
}

#[test]
fn test_arbiter_cli_exit_codes() {
    let run = |args: &[&str]| {
        Command::new(env!("CARGO_BIN_EXE_arbiter"))
            .args(args)
            .output()
            .expect("arbiter should run")
            .status
            .code()
    };
    let config = fixture_path("arbiter_5x5.toml");
    let config = config.to_str().unwrap();
    let maze = fixture_path("comb_5x5.txt");
    let maze = maze.to_str().unwrap();

    assert_eq!(run(&[]), Some(2));
    assert_eq!(run(&["--bogus", maze, "true"]), Some(2));
    assert_eq!(run(&["--config", config, "/nonexistent/maze.txt", "true"]), Some(1));
    assert_eq!(run(&["--config", config, maze, "/nonexistent/agent"]), Some(1));
    assert_eq!(run(&["--config", config, "--seed", "1", maze, "echo XYZ"]), Some(3));
}

#[test]
fn test_replay_cli_on_recorded_log() {
    let output = Command::new(env!("CARGO_BIN_EXE_replay"))
        .arg(fixture_path("sample_match.jsonl"))
        .args(["--turns", "1", "--maps", "--verbose", "--config"])
        .arg(fixture_path("arbiter_5x5.toml"))
        .output()
        .expect("replay should run");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Showing 2 of 4 records"), "{}", stdout);
    assert!(stdout.contains("turn: FF"), "{}", stdout);
    assert!(stdout.contains("# exploring"), "{}", stdout);
    assert!(stdout.contains("+?+\n?^?\n+?+\n"), "{}", stdout);

    let missing = Command::new(env!("CARGO_BIN_EXE_replay"))
        .arg(fixture_path("sample_match.jsonl"))
        .args(["--turns", "9"])
        .output()
        .expect("replay should run");
    assert_eq!(missing.status.code(), Some(1));
}

#[test]
fn test_convert_cli_between_formats() {
    let encoded = Command::new(env!("CARGO_BIN_EXE_convert"))
        .args(["--height", "5", "--width", "5"])
        .arg(fixture_path("comb_5x5.txt"))
        .output()
        .expect("convert should run");
    assert!(encoded.status.success());
    let desc = String::from_utf8_lossy(&encoded.stdout).trim().to_string();
    assert!(desc.starts_with("FFAAA"), "{}", desc);

    let printed = Command::new(env!("CARGO_BIN_EXE_convert"))
        .args(["--height", "5", "--width", "5", &desc])
        .output()
        .expect("convert should run");
    assert!(printed.status.success());
    let text = std::fs::read_to_string(fixture_path("comb_5x5.txt")).unwrap();
    assert_eq!(
        String::from_utf8_lossy(&printed.stdout),
        text.replacen("|  ", "|^ ", 1)
    );

    let bad = Command::new(env!("CARGO_BIN_EXE_convert"))
        .arg("/nonexistent/maze.txt")
        .output()
        .expect("convert should run");
    assert_eq!(bad.status.code(), Some(1));
}
