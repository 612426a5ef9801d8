//! Tether CLI - keep a working branch in sync with its default branch.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{Cli, Commands};

/// Environment variable holding the log filter.
const LOG_ENV: &str = "TETHER_LOG";

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    output::set_quiet(cli.json);

    let result = match cli.command {
        Commands::Status => commands::status::run(&cli.target, cli.json),
        Commands::CheckUpdate => commands::check::run_update(&cli.target, cli.json),
        Commands::CheckMerge => commands::check::run_merge(&cli.target, cli.json),
        Commands::Update => commands::update::run(&cli.target, cli.json),
        Commands::Merge { description } => {
            commands::merge::run(&cli.target, cli.json, description.as_deref())
        }
        Commands::Watch { interval } => commands::watch::run(&cli.target, cli.json, interval),
        Commands::Completions { shell } => commands::completions::run(shell),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

/// Log to stderr; `TETHER_LOG` wins over `-v`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
