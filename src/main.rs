mod annotate;
mod args;
mod config;
mod constants;
mod display;
mod error;
mod results;
mod session;
mod shell;
mod state_file;
mod state_lock;
mod store;
mod tools;

use anyhow::Result;
use clap::Parser;
use config::Config;
use session::Session;
use state_lock::StateLock;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kgp",
    version,
    about = "grep/find shell with numbered file lists",
    long_about = "An interactive shell over grep and find. Matching files are numbered into list 0 so later commands can refer to them by index; extra lists hold files you want to keep. Given a command, kgp runs it once against the saved state and exits."
)]
struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// State file for single-command mode (defaults to ~/.kgp_state)
    #[arg(long)]
    state: Option<PathBuf>,

    /// Command to run once, e.g. `kgp s needle` (omit for the interactive shell)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    display::init_colors(config.display.colors);

    if cli.command.is_empty() {
        let mut session = Session::new(config, cli.verbose, std::io::stdout());
        return shell::run(&mut session, cli.verbose);
    }

    run_once(cli, config)
}

/// Load saved lists, run one command, save. Only the save can fail the process.
fn run_once(cli: Cli, config: Config) -> Result<()> {
    let state_path = cli.state.clone().unwrap_or_else(|| config.state_path());
    let _lock = StateLock::acquire(&state_path, cli.verbose)?;

    let saved = state_file::load(&state_path)?;
    if cli.verbose > 0 {
        eprintln!(
            "state {}: {} lists",
            state_path.display(),
            saved.store.iter().count()
        );
    }

    let mut session = Session::new(config, cli.verbose, std::io::stdout())
        .with_state(saved.store, saved.results);
    session.run_words(&cli.command);

    state_file::save(&state_path, &session.store, &session.results)
}
