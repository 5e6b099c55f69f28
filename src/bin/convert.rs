// Maze format converter
//
// Usage:
//   convert [--height N] [--width N] <description | file | ->
//
// An argument that decodes as a compact description is printed as text.
// Anything else is read as a text maze (from a file, or stdin for `-`) and
// printed as a compact description.

use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use maze_arbiter::maze::{DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_DIMENSION};
use maze_arbiter::maze_io::{decode, encode, print, scan};

fn print_usage() {
    eprintln!("Maze Format Converter");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("  convert [OPTIONS] <description | file | ->");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("  --height <N>            Grid height (default: {})", DEFAULT_HEIGHT);
    eprintln!("  --width <N>             Grid width (default: {})", DEFAULT_WIDTH);
    eprintln!("  --help                  Show this help message");
}

fn read_text(source: &str) -> Result<String, String> {
    if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        Ok(text)
    } else {
        fs::read_to_string(source).map_err(|e| format!("Failed to read '{}': {}", source, e))
    }
}

fn convert(source: &str, height: usize, width: usize) -> Result<String, String> {
    if let Ok(maze) = decode(source, height, width) {
        return Ok(print(&maze));
    }
    let text = read_text(source)?;
    let maze = scan(&text, height, width).map_err(|e| e.to_string())?;
    Ok(format!("{}\n", encode(&maze)))
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut height = DEFAULT_HEIGHT;
    let mut width = DEFAULT_WIDTH;
    let mut source: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--height" | "--width" => {
                let value = args
                    .get(i + 1)
                    .and_then(|v| v.parse::<usize>().ok())
                    .filter(|n| (1..=MAX_DIMENSION).contains(n));
                let Some(n) = value else {
                    eprintln!("Error: {} requires a number between 1 and {}", args[i], MAX_DIMENSION);
                    process::exit(2);
                };
                if args[i] == "--height" {
                    height = n;
                } else {
                    width = n;
                }
                i += 1;
            }
            "--help" => {
                print_usage();
                process::exit(0);
            }
            other if source.is_none() => source = Some(other.to_string()),
            other => {
                eprintln!("Error: Unexpected argument '{}'", other);
                print_usage();
                process::exit(2);
            }
        }
        i += 1;
    }

    let Some(source) = source else {
        print_usage();
        process::exit(2);
    };

    match convert(&source, height, width) {
        Ok(output) => print!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
