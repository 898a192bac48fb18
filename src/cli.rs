use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};

use crate::{
    commands::{AssumeCommand, CompletionsCommand, StatusCommand},
    constants::{self, AWS_CREDENTIALS_FILE_ENV, CONFIG_FILE_ENV},
};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "multirole",
    version,
    about = "Assume multiple AWS roles at once from the command line",
    long_about = None
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        env = AWS_CREDENTIALS_FILE_ENV,
        value_name = "PATH",
        help = "Credentials file holding the identity [default: ~/.aws/credentials]"
    )]
    pub aws_creds_file: Option<PathBuf>,

    #[arg(
        short = 'c',
        long,
        global = true,
        env = CONFIG_FILE_ENV,
        value_name = "PATH",
        help = "multirole config file [default: ~/.config/multirole/config.toml]"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = ArgAction::Count,
        help = "Increase verbosity (-v info, -vv debug, -vvv trace)"
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(about = "Start an MFA session and assume every configured role")]
    Assume(AssumeCommand),
    #[command(about = "Show the expiration of a stored profile")]
    Status(StatusCommand),
    #[command(about = "Generate shell completion scripts for multirole")]
    Completions(CompletionsCommand),
}

/// File locations handed to the commands
#[derive(Debug, Clone)]
pub struct Paths {
    pub credentials_file: PathBuf,
    pub config_file: PathBuf,
}

impl Cli {
    pub fn paths(&self) -> Result<Paths> {
        let credentials_file = match &self.aws_creds_file {
            Some(path) => path.clone(),
            None => constants::default_aws_credentials_path()
                .context("Failed to determine AWS credentials path")?,
        };
        let config_file = match &self.config {
            Some(path) => path.clone(),
            None => constants::default_config_path()
                .context("Failed to determine multirole config path")?,
        };
        Ok(Paths {
            credentials_file,
            config_file,
        })
    }

    pub async fn execute(self) -> Result<()> {
        let command = self
            .command
            .clone()
            .unwrap_or(Commands::Assume(AssumeCommand { token_code: None }));

        match command {
            Commands::Assume(cmd) => cmd.execute(&self.paths()?).await,
            Commands::Status(cmd) => cmd.execute(&self.paths()?).await,
            Commands::Completions(cmd) => {
                cmd.execute();
                Ok(())
            }
        }
    }
}
