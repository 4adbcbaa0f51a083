//! medflow - Main Entry Point

use clap::Parser;
use medflow::cli::{cmd_info, cmd_init, cmd_run, Cli, Commands};
use medflow::config::DEFAULT_MARKER_FILE;
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "medflow=debug" } else { "medflow=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let result = match cli.command {
        Some(Commands::Run { marker }) => cmd_run(&marker).map(|_| ()),
        Some(Commands::Init { kind, dir, force }) => cmd_init(kind, &dir, force),
        Some(Commands::Info { data }) => cmd_info(&data),
        None => cmd_run(&PathBuf::from(DEFAULT_MARKER_FILE)).map(|_| ()),
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "run failed");
    }
    result
}
