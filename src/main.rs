// Maze match arbiter
//
// Usage:
//   arbiter [--config <path>] [--seed <n>] [--log <path>] <maze> <player1> [<player2>]
//
// Each player is a command line, split on whitespace. Exit status is 0 when
// the match was played out, 1 when it could not be set up or failed
// internally, 2 on bad usage and 3 when a player forfeited.

use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::env;
use std::process;

use maze_arbiter::arbiter::{load_maze, Arbiter, MatchState};
use maze_arbiter::config::Config;
use maze_arbiter::error::ArbiterError;
use maze_arbiter::match_log::MatchLogger;

const EXIT_FAILURE: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_FORFEIT: i32 = 3;

fn print_usage() {
    eprintln!("Maze Match Arbiter");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  arbiter [OPTIONS] <maze> <player1> [<player2>]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --config <path>         Path to Arbiter.toml (default: Arbiter.toml)");
    eprintln!("  --seed <n>              Seed for start placement");
    eprintln!("  --log <path>            Write a JSONL match log to <path>");
    eprintln!("  --help                  Show this help message");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("  arbiter mazes/comb.txt ./player");
    eprintln!("  arbiter --seed 7 --log match.jsonl maze.txt ./player \"./player --max-turn-length 20\"");
}

struct Options {
    config_path: Option<String>,
    seed: Option<u64>,
    log_path: Option<String>,
    maze_path: String,
    commands: Vec<String>,
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut config_path = None;
    let mut seed = None;
    let mut log_path = None;
    let mut positional = Vec::new();

    let mut i = 1;
    while i < args.len() {
        let value = |name: &str| {
            args.get(i + 1)
                .cloned()
                .ok_or_else(|| format!("{} requires an argument", name))
        };
        match args[i].as_str() {
            "--config" => {
                config_path = Some(value("--config")?);
                i += 1;
            }
            "--seed" => {
                let raw = value("--seed")?;
                seed = Some(raw.parse::<u64>().map_err(|e| format!("Invalid seed '{}': {}", raw, e))?);
                i += 1;
            }
            "--log" => {
                log_path = Some(value("--log")?);
                i += 1;
            }
            other if other.starts_with("--") => return Err(format!("Unknown option '{}'", other)),
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    if positional.len() < 2 || positional.len() > 3 {
        return Err("expected a maze file and one or two player commands".to_string());
    }
    let maze_path = positional.remove(0);

    Ok(Options {
        config_path,
        seed,
        log_path,
        maze_path,
        commands: positional,
    })
}

async fn run(options: Options) -> Result<bool, ArbiterError> {
    let mut config = match &options.config_path {
        Some(path) => Config::from_file(path).map_err(ArbiterError::Config)?,
        None => Config::load_or_default(),
    };
    if let Some(path) = &options.log_path {
        config.match_log.enabled = true;
        config.match_log.log_file_path = path.clone();
    }

    let master = load_maze(&options.maze_path, &config.grid)?;

    let seed = options.seed.unwrap_or_else(rand::random);
    info!("Placement seed: {}", seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let state = MatchState::place(master, options.commands.len(), config.rules.clone(), &mut rng)?;

    let logger = MatchLogger::new(config.match_log.enabled, &config.match_log.log_file_path).await;
    let arbiter = Arbiter::launch(config, state, &options.commands, logger)?;
    let report = arbiter.run().await?;

    Ok(!report.outcome.is_forfeit())
}

#[tokio::main]
async fn main() {
    // We default to 'info' level logging. But if the `RUST_LOG` environment variable is set,
    // we keep that value instead.
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }

    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help") {
        print_usage();
        return;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            process::exit(EXIT_USAGE);
        }
    };

    info!("Starting match on {}", options.maze_path);
    match run(options).await {
        Ok(true) => {}
        Ok(false) => process::exit(EXIT_FORFEIT),
        Err(e) => {
            error!("{}", e);
            process::exit(EXIT_FAILURE);
        }
    }
}
