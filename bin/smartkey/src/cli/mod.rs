use crate::utils::{load_env_files, run_until_ctrl_c};
use clap::{value_parser, Parser, Subcommand};
use tracing::debug;

pub mod args;
pub mod commands;

/// The main smartkey CLI interface
#[derive(Debug, Parser)]
#[command(author, version, about = "smartkey", long_about = None)]
pub struct Cli {
    /// The command to execute
    #[clap(subcommand)]
    command: Commands,

    /// The verbosity level
    #[clap(long, short, global = true, default_value_t = 2, value_parser = value_parser!(u8).range(..=4))]
    verbosity: u8,
}

impl Cli {
    /// Get the log level based on the verbosity level
    pub fn get_log_level(&self) -> String {
        match self.verbosity {
            0 => "error",
            1 => "warn",
            2 => "info",
            3 => "debug",
            _ => "trace",
        }
        .into()
    }
}

/// Commands to be executed
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the embedded wallet and its smart account
    #[command(name = "account")]
    Account(commands::AccountCommand),

    /// Mint one NFT with a sponsored operation
    #[command(name = "mint")]
    Mint(commands::MintCommand),

    /// Mint several NFTs in one batched operation
    #[command(name = "batch")]
    Batch(commands::BatchCommand),

    /// Show the NFT balance of the smart account
    #[command(name = "balance")]
    Balance(commands::BalanceCommand),

    /// Grant, use and revoke a session key
    #[command(subcommand, name = "session")]
    Session(commands::SessionCommand),
}

pub fn run() -> eyre::Result<()> {
    let env_files = load_env_files();
    let cli = Cli::parse();

    let rust_log = match std::env::var("RUST_LOG") {
        Ok(val) => format!("{val},smartkey={}", cli.get_log_level()),
        Err(_) => format!("smartkey={}", cli.get_log_level()),
    };
    std::env::set_var("RUST_LOG", rust_log);
    tracing_subscriber::fmt::init();

    for file in env_files {
        debug!("Loaded environment from {file}");
    }

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;

    let task = async move {
        match cli.command {
            Commands::Account(command) => command.execute().await,
            Commands::Mint(command) => command.execute().await,
            Commands::Batch(command) => command.execute().await,
            Commands::Balance(command) => command.execute().await,
            Commands::Session(command) => command.execute().await,
        }
    };

    rt.block_on(run_until_ctrl_c(task))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_levels() {
        let cli = Cli::try_parse_from(vec!["smartkey", "session", "status"]).unwrap();
        assert_eq!(cli.get_log_level(), "info");

        let cli = Cli::try_parse_from(vec!["smartkey", "session", "status", "-v", "4"]).unwrap();
        assert_eq!(cli.get_log_level(), "trace");

        assert!(Cli::try_parse_from(vec!["smartkey", "-v", "5", "account"]).is_err());
    }
}
