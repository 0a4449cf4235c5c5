//! tstodlc CLI - Command-line interface
//!
//! Packages content directories into DLC units and keeps the package
//! indices of a distribution in sync.

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use console::style;
use tracing::debug;
use tstodlc::config::{config_file_path, ConfigFile};
use tstodlc::logging;

use commands::clean::CleanArgs;
use commands::config::ConfigCommands;
use commands::inspect::InspectArgs;
use commands::pack::PackArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "tstodlc")]
#[command(about = "Package content directories into DLC units", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build distribution units and update the local and server indices
    Pack(PackArgs),

    /// Remove server index records whose package file no longer exists
    Clean(CleanArgs),

    /// Print the contents of a catalog
    Inspect(InspectArgs),

    /// View or change configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    // Config commands must work even when the file is broken.
    let config = match (&cli.command, ConfigFile::load()) {
        (_, Ok(config)) => config,
        (Commands::Config { .. }, Err(_)) => ConfigFile::default(),
        (_, Err(e)) => return Err(e.into()),
    };

    let _guard = logging::init(&config.logging, cli.verbose)?;
    debug!(config = %config_file_path().display(), "Loaded configuration");

    match cli.command {
        Commands::Pack(args) => commands::pack::run(args, &config),
        Commands::Clean(args) => commands::clean::run(args),
        Commands::Inspect(args) => commands::inspect::run(args),
        Commands::Config { command } => commands::config::run(command),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_subcommands() {
        let cli = Cli::try_parse_from(["tstodlc", "-v", "clean", "dist"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Clean(_)));

        let cli = Cli::try_parse_from(["tstodlc", "config", "get", "package.tier"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                command: ConfigCommands::Get { .. }
            }
        ));
    }
}
