use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "weaver")]
#[command(
    author,
    version,
    about = "Deploy and wire the perpetual pool protocol, one resumable step at a time"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, env = "WEAVER_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the settings file.
    ///
    /// Defaults to ./Weaver.toml. A missing file is not an error: built-in defaults and
    /// WEAVER_* environment variables still apply.
    #[arg(long, alias = "conf", env = "WEAVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// The network to deploy to, as named in the built-in registry.
    #[arg(short, long)]
    pub network: Option<String>,

    /// The URL of the network's JSON-RPC endpoint.
    #[arg(long, alias = "rpc")]
    pub rpc_url: Option<String>,

    /// The unlocked account sending every transaction.
    #[arg(long)]
    pub sender: Option<Address>,

    /// The directory holding one ledger document per chain.
    #[arg(long)]
    pub ledger_dir: Option<PathBuf>,

    /// The directory holding compiled contract artifacts.
    #[arg(long)]
    pub artifacts_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Write the effective settings to the settings file.
    Init {
        /// Overwrite an existing settings file.
        #[arg(long)]
        force: bool,
    },
    /// Run the standard deployment plan, resuming from the ledger.
    Deploy,
    /// Show what the ledger records for the selected network.
    Status,
    /// Print the address the pool of an asset will be created at.
    Predict {
        /// Asset symbol, e.g. ETH.
        asset: String,
    },
    /// Record the code fingerprint of a contract artifact in the ledger.
    ///
    /// The fingerprint is required before pool addresses can be predicted.
    Fingerprint {
        #[arg(default_value = "Pool")]
        contract: String,
    },
    /// Print the constructor arguments of a component for source verification.
    VerifyArgs {
        /// Ledger name of the component, e.g. Router or LpToken:ETH.
        component: String,
    },
    /// List the networks of the built-in registry.
    Networks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_command_parses() {
        let cases = [
            (vec!["init", "--force"], Command::Init { force: true }),
            (vec!["deploy"], Command::Deploy),
            (vec!["status"], Command::Status),
            (
                vec!["predict", "ETH"],
                Command::Predict {
                    asset: "ETH".to_string(),
                },
            ),
            (
                vec!["fingerprint"],
                Command::Fingerprint {
                    contract: "Pool".to_string(),
                },
            ),
            (
                vec!["verify-args", "LpToken:ETH"],
                Command::VerifyArgs {
                    component: "LpToken:ETH".to_string(),
                },
            ),
            (vec!["networks"], Command::Networks),
        ];

        for (args, expected) in cases {
            let cli = Cli::parse_from(std::iter::once("weaver").chain(args));
            assert_eq!(cli.command, expected);
        }
    }
}
