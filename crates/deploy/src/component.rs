//! Logical names of the protocol components written to the ledger.

/// A component deployed once per network by the standard plan.
///
/// The display form doubles as the ledger key and the artifact name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    strum::EnumIter,
)]
pub enum Component {
    PoolFactory,
    PoolIndexer,
    Router,
    OrderExecutor,
    RewardDistributor,
    ConnectorRegistry,
}

impl From<Component> for String {
    fn from(component: Component) -> Self {
        component.to_string()
    }
}

/// Ledger key of the LP token deployed for an asset.
pub fn lp_token_key(symbol: &str) -> String {
    format!("LpToken:{symbol}")
}

/// Registered entity name of the pool created for an asset.
pub fn pool_entity(symbol: &str) -> String {
    format!("Pool:{symbol}")
}

/// Registered entity name of a minted connector identity.
pub fn connector_entity(id: u64) -> String {
    format!("Connector:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_names_round_trip() {
        for component in Component::iter() {
            assert_eq!(Component::from_str(component.as_ref()), Ok(component));
        }
        assert_eq!(Component::PoolIndexer.to_string(), "PoolIndexer");
    }
}
