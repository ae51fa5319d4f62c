use std::{
    fs,
    io::{self, IsTerminal},
    path::PathBuf,
};

use anyhow::Result;
use clap::{Arg, Command};
use spyglass_core::{init_tracing, SpyglassConfig};
use spyglass_repl::Repl;
use tracing::warn;

fn main() -> Result<()> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let matches = Command::new("spyglass")
        .version(spyglass_core::VERSION)
        .about("Interactive inspector for a live object graph")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Settings file to load on startup"),
        )
        .arg(
            Arg::new("rows")
                .long("rows")
                .value_name("ROWS")
                .help("Rows shown per list view")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("file")
                .value_name("FILE")
                .help("Run a command script on startup")
                .index(1),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug mode")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Extract command line options
    let config_path = matches.get_one::<String>("config").map(PathBuf::from);
    let rows = matches.get_one::<usize>("rows").copied();
    let input_file = matches.get_one::<String>("file").cloned();
    let debug = matches.get_flag("debug");

    let mut config = match &config_path {
        Some(path) => SpyglassConfig::load(path)?,
        None => SpyglassConfig::default(),
    };
    if let Some(rows) = rows {
        config.viewport_rows = rows.max(1);
    }

    println!("Spyglass REPL v{}", spyglass_core::VERSION);
    if let Some(path) = &config_path {
        println!("Settings: {}", path.display());
    }

    let mut repl = Repl::new(config)?;
    if debug {
        println!("{}", repl.process_line(".debug")?);
    }

    println!("Type .help for help, .quit to exit");
    println!();

    run_repl(&mut repl, input_file)
}

fn run_repl(repl: &mut Repl, input_file: Option<String>) -> Result<()> {
    use rustyline::{error::ReadlineError, DefaultEditor};

    let mut rl = DefaultEditor::new()?;

    println!("{}", repl.render_active()?);
    println!();

    // Check if we have a file argument
    let file_lines: Option<Vec<String>> = if let Some(filename) = input_file {
        let content = fs::read_to_string(filename)?;
        Some(content.lines().map(|s| s.to_string()).collect())
    } else {
        None
    };

    let is_interactive = file_lines.is_none() && io::stdin().is_terminal();
    let mut file_line_iter = file_lines.as_ref().map(|lines| lines.iter());

    while repl.is_running() {
        // Get the next line from either file or interactive input
        let line_result = if let Some(ref mut iter) = file_line_iter {
            if let Some(line) = iter.next() {
                Ok(line.clone())
            } else {
                // End of file
                break;
            }
        } else {
            rl.readline("spyglass> ")
        };

        match line_result {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                if is_interactive {
                    rl.add_history_entry(trimmed)?;
                } else {
                    // Echo input in non-interactive mode
                    println!("spyglass> {trimmed}");
                }

                match repl.process_line(trimmed) {
                    Ok(output) => println!("{output}"),
                    Err(e) => {
                        warn!("Command failed: {e}");
                        eprintln!("Error: {e}");
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    Ok(())
}
