//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

pub use crate::commands::codec::CodecArgs;
pub use crate::commands::keys::KeysCommands;

/// Keyroll - rotating keys for payload encryption
#[derive(Parser, Debug)]
#[command(name = "keyroll")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to config file (default: ~/.keyroll/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Namespace to operate on (overrides config and KEYROLL_NAMESPACE)
    #[arg(short, long, global = true)]
    pub namespace: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Key management
    #[command(subcommand)]
    Keys(KeysCommands),

    /// Encrypt a payload document under the active key
    Encode(CodecArgs),

    /// Decrypt a payload document
    Decode(CodecArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["keyroll", "keys", "active", "-n", "billing", "-vv"]).unwrap();
        assert_eq!(cli.namespace.as_deref(), Some("billing"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Keys(KeysCommands::Active(_))));
    }
}
