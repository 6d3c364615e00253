//! Opal Front End CLI
//!
//! Debugging driver for the Opal front end: tokenise, parse, or run the
//! whole pipeline over source files. Failures are reported per file and
//! the remaining files are still processed.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser as ClapParser, Subcommand};

use opal::errors::{report_error, report_warning};
use opal::{Lowerer, Parser, Scanner};

#[derive(ClapParser)]
#[command(name = "opal")]
#[command(version)]
#[command(about = "Front end for the Opal programming language")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tokenise files and print the candidate set at each position
    Lex {
        /// Input files
        files: Vec<PathBuf>,
    },

    /// Parse files and print their concrete trees
    Parse {
        /// Input files
        files: Vec<PathBuf>,
    },

    /// Run the whole front end and summarise the lowered definitions
    Check {
        /// Input files
        files: Vec<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let failed = match cli.command {
        Commands::Lex { files } => run(&files, lex_file),
        Commands::Parse { files } => run(&files, parse_file),
        Commands::Check { files } => run(&files, check_file),
    };

    if failed {
        process::exit(1);
    }
}

/// Apply a per-file action to every input, catching failures so one bad
/// file does not stop the rest.
fn run(files: &[PathBuf], per_file: fn(&str, &str) -> bool) -> bool {
    let mut failed = false;
    for path in files {
        let name = path.display().to_string();
        match fs::read_to_string(path) {
            Ok(source) => failed |= per_file(&name, &source),
            Err(error) => {
                eprintln!("{}: {}", name, error);
                failed = true;
            }
        }
    }
    failed
}

fn lex_file(name: &str, source: &str) -> bool {
    let (stream, warnings) = Scanner::new(source).scan_all();
    for warning in &warnings {
        report_warning(name, source, warning.extents, &warning.message);
    }

    for (offset, set) in stream.iter() {
        let mut readings: Vec<String> = set.iter().map(|t| t.to_string()).collect();
        readings.sort();
        println!("{:>6}  {}", offset, readings.join("  |  "));
    }
    false
}

fn parse_file(name: &str, source: &str) -> bool {
    let (stream, warnings) = Scanner::new(source).scan_all();
    for warning in &warnings {
        report_warning(name, source, warning.extents, &warning.message);
    }

    match Parser::new(&stream).parse() {
        Ok(tree) => {
            println!("{:#?}", tree);
            false
        }
        Err(error) => {
            report_error(name, source, error.extents(), &error.to_string(), error.help());
            true
        }
    }
}

fn check_file(name: &str, source: &str) -> bool {
    let (stream, warnings) = Scanner::new(source).scan_all();
    for warning in &warnings {
        report_warning(name, source, warning.extents, &warning.message);
    }

    let file = match Parser::new(&stream).parse() {
        Ok(tree) => tree,
        Err(error) => {
            report_error(name, source, error.extents(), &error.to_string(), error.help());
            return true;
        }
    };

    match Lowerer::new().lower(&[file]) {
        Ok(definitions) => {
            println!("{}: {} definition(s)", name, definitions.len());
            for definition in &definitions {
                match definition.defined_identifier() {
                    Some(identifier) => println!("  {}", identifier),
                    None => println!("  <destructuring bind>"),
                }
            }
            false
        }
        Err(error) => {
            report_error(name, source, error.extents(), &error.to_string(), error.help());
            true
        }
    }
}
