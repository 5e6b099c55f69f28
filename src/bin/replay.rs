// Standalone replay tool for match logs
//
// Usage:
//   cargo run --bin replay -- <log_file> [options]
//
// Options:
//   --all                  Show every recorded turn
//   --turns <turn1,turn2>  Show specific rounds (comma-separated)
//   --maps                 Draw each player's map after the turn
//   --verbose              Show turn strings and agent comments
//   --config <path>        Path to Arbiter.toml (default: Arbiter.toml)

use std::env;
use std::process;

use maze_arbiter::config::Config;
use maze_arbiter::replay::ReplayEngine;

fn print_usage() {
    eprintln!("Maze Match Replay Tool");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  replay <log_file> [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --all                   Show every turn in the log");
    eprintln!("  --turns <T1,T2,...>     Show specific rounds (comma-separated)");
    eprintln!("  --maps                  Draw the player's map after each turn");
    eprintln!("  --verbose               Show turn strings and agent comments");
    eprintln!("  --config <path>         Path to Arbiter.toml (default: Arbiter.toml)");
    eprintln!("  --help                  Show this help message");
    eprintln!();
    eprintln!("EXAMPLES:");
    eprintln!("  # Summarise a whole match");
    eprintln!("  replay match_log.jsonl --all");
    eprintln!();
    eprintln!("  # Inspect the maps of rounds 10 and 11");
    eprintln!("  replay match_log.jsonl --turns 10,11 --maps");
}

fn parse_turns(s: &str) -> Result<Vec<usize>, String> {
    s.split(',')
        .map(|t| {
            t.trim()
                .parse::<usize>()
                .map_err(|e| format!("Invalid turn number '{}': {}", t, e))
        })
        .collect()
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args.contains(&"--help".to_string()) {
        print_usage();
        process::exit(if args.contains(&"--help".to_string()) { 0 } else { 2 });
    }

    let log_file = &args[1];
    let mut config_path = "Arbiter.toml".to_string();
    let mut verbose = false;
    let mut show_maps = false;
    let mut turns: Option<Vec<usize>> = None;
    let mut all = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--all" => {
                all = true;
            }
            "--turns" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: --turns requires an argument");
                    process::exit(2);
                };
                match parse_turns(value) {
                    Ok(t) => turns = Some(t),
                    Err(e) => {
                        eprintln!("Error parsing turns: {}", e);
                        process::exit(2);
                    }
                }
                i += 1;
            }
            "--config" => {
                let Some(value) = args.get(i + 1) else {
                    eprintln!("Error: --config requires an argument");
                    process::exit(2);
                };
                config_path = value.clone();
                i += 1;
            }
            "--maps" => {
                show_maps = true;
            }
            "--verbose" => {
                verbose = true;
            }
            _ => {
                eprintln!("Error: Unknown option '{}'", args[i]);
                print_usage();
                process::exit(2);
            }
        }
        i += 1;
    }

    if !all && turns.is_none() {
        eprintln!("Error: Must specify --all or --turns");
        print_usage();
        process::exit(2);
    }

    let config = Config::from_file(&config_path).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from '{}': {}", config_path, e);
        eprintln!("Using default configuration");
        Config::default_hardcoded()
    });

    let engine = ReplayEngine::new(config.grid.height, config.grid.width, verbose);

    let records = match engine.load_log_file(log_file) {
        Ok(records) => records,
        Err(e) => {
            eprintln!("Error loading log file: {}", e);
            process::exit(1);
        }
    };

    if records.is_empty() {
        eprintln!("Error: Log file is empty");
        process::exit(1);
    }

    let selected = match turns {
        Some(turns) if !all => match engine.select_turns(&records, &turns) {
            Ok(selected) => selected,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        _ => records.iter().collect(),
    };

    println!("Replay log file: {}", log_file);
    println!("Showing {} of {} records\n", selected.len(), records.len());
    engine.print_report(&selected, show_maps);
}
