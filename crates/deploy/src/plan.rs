//! The standard protocol deployment plan.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{B256, U256, keccak256},
};

use crate::{
    component::{Component, connector_entity, lp_token_key, pool_entity},
    pipeline::{Arg, Call, Deployment, Registration, Step, Target},
    registry::{AssetConfig, CurveConfig, FeeConfig, NetworkConfig, RiskConfig},
};

/// Artifact name of the per-asset LP token.
pub const LP_TOKEN_CONTRACT: &str = "LpToken";

/// Access-control role identifier, `keccak256("<NAME>_ROLE")`.
pub fn role(name: &str) -> B256 {
    keccak256(format!("{name}_ROLE"))
}

/// Salt inputs of the pool created for `asset`.
pub fn pool_salt_inputs(network: &NetworkConfig, asset: &AssetConfig) -> Vec<DynSolValue> {
    vec![
        DynSolValue::Address(asset.token),
        DynSolValue::Address(network.base_currency),
    ]
}

fn create_pool_signature() -> String {
    format!(
        "createPool(address,address,{},{},{})",
        RiskConfig::ABI_TYPE,
        FeeConfig::ABI_TYPE,
        CurveConfig::ABI_TYPE
    )
}

fn on(component: Component, signature: &str) -> Call {
    Call::new(Target::component(component), signature)
}

/// Build the ordered steps deploying and wiring the protocol on `network`.
pub fn standard_plan(network: &NetworkConfig) -> Vec<Step> {
    let pool_factory = Step::deploy(
        "deploy_pool_factory",
        Deployment::new(Component::PoolFactory, Component::PoolFactory)
            .arg(Arg::address(network.base_currency))
            .arg(Arg::address(network.price_oracle)),
    );

    let pool_indexer = Step::deploy(
        "deploy_pool_indexer",
        Deployment::new(Component::PoolIndexer, Component::PoolIndexer)
            .arg(Arg::component(Component::PoolFactory)),
    );

    let router = Step::deploy(
        "deploy_router",
        Deployment::new(Component::Router, Component::Router)
            .arg(Arg::component(Component::PoolFactory))
            .arg(Arg::component(Component::PoolIndexer))
            .arg(Arg::address(network.wrapped_native)),
    )
    .wire(
        on(Component::PoolFactory, "grantRole(bytes32,address)")
            .arg(Arg::word(role("ROUTER")))
            .arg(Arg::Deployed),
    );

    let mut order_executor = Step::deploy(
        "deploy_order_executor",
        Deployment::new(Component::OrderExecutor, Component::OrderExecutor)
            .arg(Arg::component(Component::Router))
            .arg(Arg::uint(network.min_execution_fee))
            .arg(Arg::uint(network.min_liquidation_fee)),
    )
    .wire(
        on(Component::Router, "grantRole(bytes32,address)")
            .arg(Arg::word(role("EXECUTOR")))
            .arg(Arg::Deployed),
    );
    for keeper in &network.executors {
        order_executor = order_executor.wire(
            Call::new(Target::Deployed, "grantRole(bytes32,address)")
                .arg(Arg::word(role("KEEPER")))
                .arg(Arg::address(*keeper)),
        );
    }
    let order_executor = order_executor.wire(
        Call::new(Target::Address(network.price_oracle), "setUpdater(address,bool)")
            .arg(Arg::Deployed)
            .arg(Arg::bool(true)),
    );

    let reward_distributor = Step::deploy(
        "deploy_reward_distributor",
        Deployment::new(Component::RewardDistributor, Component::RewardDistributor)
            .arg(Arg::component(Component::PoolFactory))
            .arg(Arg::address(network.reward_signer)),
    )
    .wire(on(Component::PoolFactory, "setFeeCollector(address)").arg(Arg::Deployed))
    .wire(
        on(Component::Router, "setPlugin(address,bool)")
            .arg(Arg::Deployed)
            .arg(Arg::bool(true)),
    );

    let connector_registry = Step::deploy(
        "deploy_connector_registry",
        Deployment::new(Component::ConnectorRegistry, Component::ConnectorRegistry)
            .arg(Arg::component(Component::Router)),
    )
    .wire(
        on(Component::Router, "setPlugin(address,bool)")
            .arg(Arg::Deployed)
            .arg(Arg::bool(true)),
    );

    let lp_tokens = Step::deploy_each(
        "deploy_lp_tokens",
        network
            .assets
            .iter()
            .map(|asset| Deployment::new(lp_token_key(&asset.symbol), LP_TOKEN_CONTRACT))
            .collect(),
    );

    let signature = create_pool_signature();
    let pools = Step::register_each(
        "create_pools",
        network
            .assets
            .iter()
            .map(|asset| {
                let call = on(Component::PoolFactory, &signature)
                    .arg(Arg::address(asset.token))
                    .arg(Arg::component(lp_token_key(&asset.symbol)))
                    .arg(Arg::value(asset.risk.to_abi()))
                    .arg(Arg::value(asset.fee.to_abi()))
                    .arg(Arg::value(asset.curve.to_abi()));
                let salt = pool_salt_inputs(network, asset)
                    .into_iter()
                    .map(Arg::value)
                    .collect();
                Registration::new(pool_entity(&asset.symbol), Component::PoolFactory, call)
                    .asset(&asset.symbol)
                    .predicted(Component::PoolFactory, salt)
            })
            .collect(),
    );

    let connectors = Step::register_each(
        "mint_connectors",
        network
            .connectors
            .iter()
            .map(|connector| {
                let call = on(Component::ConnectorRegistry, "mint(address,uint256)")
                    .arg(Arg::address(connector.owner))
                    .arg(Arg::uint(U256::from(connector.id)));
                Registration::new(
                    connector_entity(connector.id),
                    Component::ConnectorRegistry,
                    call,
                )
            })
            .collect(),
    );

    vec![
        pool_factory,
        pool_indexer,
        router,
        order_executor,
        reward_distributor,
        connector_registry,
        lp_tokens,
        pools,
        connectors,
    ]
}
