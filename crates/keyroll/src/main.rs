//! Keyroll CLI - rotating keys for payload encryption
//!
//! This is the main entry point for the keyroll command-line interface.

mod cli;
mod commands;
mod output;
mod wire;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let ctx = commands::Context::new(cli.config, cli.namespace);

    match cli.command {
        Commands::Keys(cmd) => commands::keys::run(cmd, &ctx).await,
        Commands::Encode(args) => commands::codec::encode(args, &ctx).await,
        Commands::Decode(args) => commands::codec::decode(args, &ctx).await,
    }
}

/// Initialize tracing with appropriate verbosity
///
/// Logs go to stderr so encode/decode output on stdout stays clean.
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
