//! CLI for cliplink.

mod commands;
mod script;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use cliplink_core::config;
use std::path::PathBuf;

use commands::{run_completions, run_config, run_manpage, run_replay};

/// Top-level CLI for cliplink.
#[derive(Debug, Parser)]
#[command(name = "cliplink")]
#[command(about = "cliplink: download links for clip pages, driven by scripted page sessions", long_about = None)]
pub struct Cli {
    /// Use this config file instead of ~/.config/cliplink/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Replay a page session script against the link injector.
    Replay {
        /// Path to the TOML script.
        script: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the config file path and the effective configuration.
    Config,

    /// Print shell completions to stdout.
    Completions {
        /// Target shell.
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page to stdout.
    Manpage,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Replay { script, json } => {
                let cfg = load_config(cli.config.as_deref())?;
                run_replay(&cfg, &script, json).await?;
            }
            CliCommand::Config => {
                let cfg = load_config(cli.config.as_deref())?;
                run_config(cli.config.as_deref(), &cfg)?;
            }
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Manpage => run_manpage()?,
        }

        Ok(())
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<config::CliplinkConfig> {
    let cfg = match path {
        Some(path) => config::load_from_path(path)?,
        None => config::load_or_init()?,
    };
    tracing::debug!("loaded config: {:?}", cfg);
    Ok(cfg)
}

#[cfg(test)]
mod tests;
