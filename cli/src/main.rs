//! Borderlink CLI - run one peer of a lockstep border exchange.

mod args;
mod commands;
mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use args::{RunArgs, SessionArgs};

#[derive(Parser)]
#[command(name = "borderlink")]
#[command(about = "Lockstep border exchange between two grid halves", long_about = None)]
struct Cli {
    /// JSON config file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the partner and exchange borders until stopped
    Run(RunArgs),
    /// Show the resolved configuration
    Info {
        #[command(flatten)]
        session: SessionArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("borderlink=info".parse()?)
                .add_directive("borderlink_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(run) => {
            let config = run.session.resolve(cli.config.as_deref())?;
            commands::run_session(config, run).await?
        }
        Commands::Info { session, json } => {
            let config = session.resolve(cli.config.as_deref())?;
            commands::show_info(&config, json)?
        }
    }

    Ok(())
}
