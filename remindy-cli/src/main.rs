use anyhow::Result;
use clap::{Parser, Subcommand};

mod api;
mod config;
mod dashboard;
mod logging;
mod reminders_cmd;
mod state;

use reminders_cmd::RemindersCommand;

#[derive(Parser, Debug)]
#[command(
    name = "remindy",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("REMINDY_BUILD_SHA"), ")"),
    about = "Schedule and track AI voice-call reminders"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive dashboard with live countdowns
    Dashboard,

    #[command(flatten)]
    Reminders(RemindersCommand),

    /// Local config at ~/.remindy/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,

    /// Show the effective config and what to fix
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Dashboard => {
            logging::init_file()?;
            let cfg = config::load_config()?;
            dashboard::run_dashboard(&cfg).await?;
        }

        Command::Reminders(cmd) => {
            logging::init_stderr();
            reminders_cmd::run(cmd).await?;
        }

        Command::Config { command } => {
            logging::init_stderr();
            match command {
                ConfigCommand::Init => config::init_config()?,
                ConfigCommand::Check => config::config_check()?,
            }
        }
    }

    Ok(())
}
