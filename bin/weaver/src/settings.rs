//! Runtime settings, layered from defaults, the settings file, the environment and flags.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// The default settings file name.
pub const SETTINGS_FILENAME: &str = "Weaver.toml";

/// Prefix of the environment variables overriding settings.
pub const ENV_PREFIX: &str = "WEAVER_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Registry name of the target network.
    pub network: String,
    pub rpc_url: String,
    /// Unlocked account sending transactions. Only needed by commands that send any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    pub ledger_dir: PathBuf,
    pub artifacts_dir: PathBuf,
    /// Delay between two receipt polls.
    pub poll_interval_ms: u64,
    /// Give up waiting for a receipt after this long. Waits indefinitely when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            network: "localhost".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            sender: None,
            ledger_dir: PathBuf::from("deployments"),
            artifacts_dir: PathBuf::from("artifacts"),
            poll_interval_ms: 1000,
            receipt_timeout_secs: None,
        }
    }
}

/// Settings file used when none is given explicitly.
pub fn settings_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILENAME))
}

impl Settings {
    /// Defaults, then the settings file if it exists, then `WEAVER_*` variables.
    pub fn load(path: &Path) -> Result<Self> {
        Self::figment(path)
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .context(format!("Failed to load settings from {}", path.display()))
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path))
    }

    /// Apply the flags given on the command line, which take precedence over everything.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(network) = &cli.network {
            self.network = network.clone();
        }
        if let Some(rpc_url) = &cli.rpc_url {
            self.rpc_url = rpc_url.clone();
        }
        if let Some(sender) = cli.sender {
            self.sender = Some(sender);
        }
        if let Some(ledger_dir) = &cli.ledger_dir {
            self.ledger_dir = ledger_dir.clone();
        }
        if let Some(artifacts_dir) = &cli.artifacts_dir {
            self.artifacts_dir = artifacts_dir.clone();
        }
        self
    }

    /// Save the settings to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;
        std::fs::write(path, content)
            .context(format!("Failed to write settings to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempdir::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new("weaver-settings").unwrap();
        let settings = Settings::figment(&dir.path().join(SETTINGS_FILENAME))
            .extract::<Settings>()
            .unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_file_overrides_defaults_and_round_trips() {
        let dir = TempDir::new("weaver-settings").unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);

        let settings = Settings {
            network: "arbitrum-sepolia".to_string(),
            sender: Some(Address::repeat_byte(0x11)),
            receipt_timeout_secs: Some(120),
            ..Default::default()
        };
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::figment(&path).extract::<Settings>().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new("weaver-settings").unwrap();
        let path = dir.path().join(SETTINGS_FILENAME);
        std::fs::write(&path, "poll_interval_ms = 250\n").unwrap();

        let loaded = Settings::figment(&path).extract::<Settings>().unwrap();
        assert_eq!(loaded.poll_interval_ms, 250);
        assert_eq!(loaded.network, "localhost");
    }

    #[test]
    fn test_flags_take_precedence() {
        let cli = Cli::parse_from([
            "weaver",
            "--network",
            "arbitrum-sepolia",
            "--rpc-url",
            "http://node:8545",
            "status",
        ]);
        let settings = Settings::default().with_overrides(&cli);
        assert_eq!(settings.network, "arbitrum-sepolia");
        assert_eq!(settings.rpc_url, "http://node:8545");
        assert_eq!(settings.ledger_dir, PathBuf::from("deployments"));
    }
}
