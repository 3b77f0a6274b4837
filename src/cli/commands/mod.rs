pub mod config;
pub mod warm;

pub use config::{ConfigCommand, LoggingArgs};
pub use warm::WarmCommand;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Send a document through the default model and wait for it to settle
    Warm(WarmCommand),
    /// Print the effective configuration as TOML
    Config(ConfigCommand),
}

impl Commands {
    pub fn config_args(&self) -> &crate::config::ConfigArgs {
        match self {
            Commands::Warm(cmd) => &cmd.config,
            Commands::Config(cmd) => &cmd.config,
        }
    }

    pub fn logging(&self) -> &LoggingArgs {
        match self {
            Commands::Warm(cmd) => &cmd.logging,
            Commands::Config(cmd) => &cmd.logging,
        }
    }
}
