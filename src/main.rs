use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod domain;
mod services;
mod trace;

pub use cli::*;
pub use domain::constants::*;
pub use domain::errors::StudyError;
pub use domain::models::*;
pub use services::config::{load_config, StudyConfig};
pub use services::output::{fmt_opt, print_error, print_one};
pub use services::records::RecordSource;
pub use services::storage::{read_json, read_table, write_csv, write_flat_csv, write_json, write_lines};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    commands::dispatch(cli, &config)
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        tracing::debug!(error = ?err, "command failed");
        let code = print_error(cli.json, &err);
        std::process::exit(code);
    }
}
