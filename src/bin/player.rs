// Reference agent: explores the maze, then hunts its opponent
//
// Usage:
//   player [--height N] [--width N] [--max-turn-length N]
//
// Reads four lines of sight and the squared distance to the opponent from
// stdin each turn and answers with one turn on stdout. Diagnostics go to
// stderr, where the arbiter collects them as comments.

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use log::{debug, error, info};

use maze_arbiter::error::MazeError;
use maze_arbiter::maze::{DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_DIMENSION};
use maze_arbiter::strategy::{Agent, MAX_TURN_LENGTH};

fn print_usage() {
    eprintln!("Maze Exploring Agent");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  player [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --height <N>            Grid height (default: {})", DEFAULT_HEIGHT);
    eprintln!("  --width <N>             Grid width (default: {})", DEFAULT_WIDTH);
    eprintln!("  --max-turn-length <N>   Longest turn to send (default: {})", MAX_TURN_LENGTH);
    eprintln!("  --help                  Show this help message");
}

fn parse_number(args: &[String], i: usize, name: &str, max: usize) -> usize {
    let value = args.get(i + 1).and_then(|v| v.parse::<usize>().ok());
    match value {
        Some(n) if (1..=max).contains(&n) => n,
        _ => {
            eprintln!("Error: {} requires a number between 1 and {}", name, max);
            process::exit(2);
        }
    }
}

/// What the arbiter sent as the start of a turn
enum Message {
    Sight(String),
    Quit,
    Closed,
}

fn next_message<R: BufRead>(input: &mut R) -> io::Result<Message> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Message::Closed);
    }
    let line = line.trim_end();
    if line == "Quit" {
        Ok(Message::Quit)
    } else {
        Ok(Message::Sight(line.to_string()))
    }
}

fn play<R: BufRead, W: Write>(agent: &mut Agent, input: &mut R, output: &mut W) -> Result<(), String> {
    let mut turn_no = 0;
    loop {
        let mut lines: [String; 4] = Default::default();
        let mut distance = String::new();
        for slot in lines.iter_mut().chain(std::iter::once(&mut distance)) {
            loop {
                match next_message(input).map_err(|e| format!("read failed: {}", e))? {
                    Message::Sight(line) if line == "Start" => {
                        debug!("moving first");
                    }
                    Message::Sight(line) => {
                        *slot = line;
                        break;
                    }
                    Message::Quit => {
                        info!("quitting after {} turns", turn_no);
                        return Ok(());
                    }
                    Message::Closed => {
                        info!("input closed after {} turns", turn_no);
                        return Ok(());
                    }
                }
            }
        }

        let distsq: i64 = distance
            .parse()
            .map_err(|_| format!("expected a distance, got {:?}", distance))?;

        let turn = decide(agent, &lines, distsq).map_err(|e| e.to_string())?;
        turn_no += 1;
        info!(
            "turn {}: {:?} mode, {} squares known, sending {}",
            turn_no,
            agent.mode(),
            agent.maze().count_squares(),
            turn
        );

        writeln!(output, "{}", turn).map_err(|e| format!("write failed: {}", e))?;
        output.flush().map_err(|e| format!("flush failed: {}", e))?;
    }
}

fn decide(agent: &mut Agent, lines: &[String; 4], distsq: i64) -> Result<String, MazeError> {
    agent.observe(lines)?;
    let turn = agent.pick_move(distsq)?;
    agent.commit(&turn)?;
    Ok(turn)
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut height = DEFAULT_HEIGHT;
    let mut width = DEFAULT_WIDTH;
    let mut max_turn_length = MAX_TURN_LENGTH;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--height" => {
                height = parse_number(&args, i, "--height", MAX_DIMENSION);
                i += 1;
            }
            "--width" => {
                width = parse_number(&args, i, "--width", MAX_DIMENSION);
                i += 1;
            }
            "--max-turn-length" => {
                max_turn_length = parse_number(&args, i, "--max-turn-length", usize::MAX);
                i += 1;
            }
            "--help" => {
                print_usage();
                process::exit(0);
            }
            other => {
                eprintln!("Error: Unknown option '{}'", other);
                print_usage();
                process::exit(2);
            }
        }
        i += 1;
    }

    let mut agent = Agent::new(height, width).with_max_turn_length(max_turn_length);
    let stdin = io::stdin();
    let stdout = io::stdout();

    if let Err(e) = play(&mut agent, &mut stdin.lock(), &mut stdout.lock()) {
        error!("{}", e);
        process::exit(1);
    }
}
