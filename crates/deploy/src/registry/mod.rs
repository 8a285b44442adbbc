//! Network configuration registry.
//!
//! The registry is an immutable value built once at startup from compiled-in network
//! tables. Every network is validated while the registry is constructed, so a bad
//! constant stops the process before any remote call is issued.

mod asset;
mod networks;

use std::collections::{BTreeMap, HashSet};

use alloy_core::primitives::{Address, U256};
use derive_more::Deref;
use serde::{Deserialize, Serialize};

pub use asset::{AssetConfig, ConfigViolation, CurveConfig, FeeConfig, RiskConfig, Vertex};

/// Error raised while building or querying the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("network `{0}` is not defined")]
    UndefinedNetwork(String),
    #[error("invalid configuration for network `{network}`{}", describe_asset(.asset))]
    InvalidConfiguration {
        network: String,
        asset: Option<String>,
        #[source]
        violation: ConfigViolation,
    },
    #[error("network `{0}` is defined twice")]
    DuplicateNetwork(String),
}

fn describe_asset(asset: &Option<String>) -> String {
    asset
        .as_ref()
        .map(|symbol| format!(" (asset {symbol})"))
        .unwrap_or_default()
}

/// A connector identity minted once the connector registry is deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    pub id: u64,
    pub owner: Address,
}

/// Static description of one network the protocol is deployed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    /// Token every pool settles in.
    pub base_currency: Address,
    pub price_oracle: Address,
    pub wrapped_native: Address,
    /// Floor for order execution fees, in base currency units.
    pub min_execution_fee: U256,
    /// Floor for liquidation fees, in base currency units.
    pub min_liquidation_fee: U256,
    /// Signer authorizing reward distribution claims.
    pub reward_signer: Address,
    /// Keeper identities allowed to run the order executor.
    pub executors: Vec<Address>,
    pub connectors: Vec<Connector>,
    pub assets: Vec<AssetConfig>,
}

impl NetworkConfig {
    /// Look up an asset by symbol.
    pub fn asset(&self, symbol: &str) -> Option<&AssetConfig> {
        self.assets.iter().find(|asset| asset.symbol == symbol)
    }

    /// Check every asset block and the uniqueness of assets and connectors.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |asset: Option<&str>, violation| RegistryError::InvalidConfiguration {
            network: self.name.clone(),
            asset: asset.map(str::to_string),
            violation,
        };

        let mut symbols = HashSet::new();
        for asset in &self.assets {
            if !symbols.insert(asset.symbol.as_str()) {
                return Err(invalid(
                    None,
                    ConfigViolation::DuplicateAsset(asset.symbol.clone()),
                ));
            }
            asset
                .validate()
                .map_err(|violation| invalid(Some(&asset.symbol), violation))?;
        }

        let mut ids = HashSet::new();
        for connector in &self.connectors {
            if !ids.insert(connector.id) {
                return Err(invalid(None, ConfigViolation::DuplicateConnector(connector.id)));
            }
        }

        Ok(())
    }
}

/// All known networks, keyed by name.
#[derive(Debug, Clone, Deref)]
pub struct Registry(BTreeMap<String, NetworkConfig>);

impl Registry {
    /// Build a registry from network configs, validating each of them.
    pub fn new(networks: impl IntoIterator<Item = NetworkConfig>) -> Result<Self, RegistryError> {
        let mut table = BTreeMap::new();
        for network in networks {
            network.validate()?;
            if table.contains_key(&network.name) {
                return Err(RegistryError::DuplicateNetwork(network.name));
            }
            table.insert(network.name.clone(), network);
        }
        Ok(Self(table))
    }

    /// The compiled-in networks.
    pub fn builtin() -> Result<Self, RegistryError> {
        let build = |name: &str, make: fn() -> Result<NetworkConfig, ConfigViolation>| {
            make().map_err(|violation| RegistryError::InvalidConfiguration {
                network: name.to_string(),
                asset: None,
                violation,
            })
        };

        Self::new([
            build(networks::LOCALHOST, networks::localhost)?,
            build(networks::ARBITRUM_SEPOLIA, networks::arbitrum_sepolia)?,
        ])
    }

    pub fn resolve(&self, name: &str) -> Result<&NetworkConfig, RegistryError> {
        self.0
            .get(name)
            .ok_or_else(|| RegistryError::UndefinedNetwork(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate::RATE_ONE;

    #[test]
    fn test_builtin_registry_is_valid() {
        let registry = Registry::builtin().expect("built-in networks must validate");
        let localhost = registry.resolve("localhost").unwrap();
        assert_eq!(localhost.chain_id, 31337);
        assert!(localhost.asset("ETH").is_some());
        assert!(registry.resolve("arbitrum-sepolia").is_ok());
    }

    #[test]
    fn test_builtin_curves_are_monotonic() {
        let registry = Registry::builtin().unwrap();
        for network in registry.values() {
            for asset in &network.assets {
                let vertices = &asset.curve.vertices;
                assert!(vertices.windows(2).all(|w| w[0].balance_rate < w[1].balance_rate));
                assert!(asset.curve.liquidation_vertex < vertices.len());
                assert_eq!(vertices.last().unwrap().balance_rate, U256::from(RATE_ONE));
            }
        }
    }

    #[test]
    fn test_resolve_unknown_network() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(
            registry.resolve("moonbase"),
            Err(RegistryError::UndefinedNetwork("moonbase".to_string()))
        );
    }

    #[test]
    fn test_invalid_curve_fails_construction() {
        let mut network = networks::localhost().unwrap();
        network.assets[0].curve.liquidation_vertex = 99;

        let err = Registry::new([network]).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidConfiguration {
                violation: ConfigViolation::LiquidationVertexOutOfRange { index: 99, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_referral_split_fails_construction() {
        let mut network = networks::localhost().unwrap();
        network.assets[0].fee.referral_discount_rate = network.assets[0].fee.referral_fee_rate;
        network.assets[0].fee.referral_rebate_rate = U256::from(1u64);

        let err = Registry::new([network]).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::InvalidConfiguration {
                asset: Some(ref symbol),
                violation: ConfigViolation::ReferralSplitExceedsParent { .. },
                ..
            } if symbol == "ETH"
        ));
    }

    #[test]
    fn test_duplicate_network_rejected() {
        let network = networks::localhost().unwrap();
        let err = Registry::new([network.clone(), network]).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateNetwork("localhost".to_string()));
    }
}
