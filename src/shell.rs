//! Interactive read-eval-print loop.

use crate::config;
use crate::session::{Flow, Session};
use anyhow::Result;
use rustyline::config::Configurer;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;

const PROMPT: &str = "kgp> ";

pub fn run<W: Write>(session: &mut Session<W>, verbose: u8) -> Result<()> {
    let rl_config = rustyline::Config::builder()
        .max_history_size(session.constants.history)?
        .auto_add_history(false)
        .build();
    let mut rl = DefaultEditor::with_config(rl_config)?;
    let mut history_depth = session.constants.history;

    let history = config::history_path();
    if let Some(path) = &history {
        if rl.load_history(path).is_err() && verbose > 0 {
            eprintln!("no history at {}", path.display());
        }
    }

    println!("kgp - grep/find shell with numbered file lists");
    println!("Type 'help' for commands, 'q' or Ctrl+D to quit");

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Err(e) = rl.add_history_entry(trimmed) {
                    eprintln!("Warning: Could not add to history: {}", e);
                }
                if session.run_line(trimmed) == Flow::Quit {
                    break;
                }
                if session.constants.history != history_depth {
                    history_depth = session.constants.history;
                    rl.set_max_history_size(history_depth)?;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("quit");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            eprintln!("Warning: Could not save history: {}", e);
        }
    }
    Ok(())
}
