//! weaver deploys the perpetual pool protocol to a network and keeps a resumable ledger
//! of what has been deployed.

mod cli;
mod commands;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Command};
use settings::{Settings, settings_path};
use weaver_deploy::Registry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let path = settings_path(cli.config.as_deref());
    let settings = Settings::load(&path)?.with_overrides(&cli);

    let registry = Registry::builtin().context("The built-in network registry is invalid")?;

    let network = || registry.resolve(&settings.network);

    match &cli.command {
        Command::Init { force } => commands::init(&settings, &path, *force),
        Command::Networks => {
            commands::networks(&registry);
            Ok(())
        }
        Command::Deploy => commands::deploy(&settings, network()?).await,
        Command::Status => commands::status(&settings, network()?),
        Command::Predict { asset } => commands::predict(&settings, network()?, asset),
        Command::Fingerprint { contract } => {
            commands::fingerprint(&settings, network()?, contract)
        }
        Command::VerifyArgs { component } => {
            commands::verify_args(&settings, network()?, component)
        }
    }
}
