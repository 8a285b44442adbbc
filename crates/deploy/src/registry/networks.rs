//! Compiled-in network tables.

use alloy_core::primitives::{Address, U256, address};

use super::{AssetConfig, ConfigViolation, Connector, CurveConfig, FeeConfig, NetworkConfig, RiskConfig, Vertex};
use crate::rate::parse_rate;

pub const LOCALHOST: &str = "localhost";
pub const ARBITRUM_SEPOLIA: &str = "arbitrum-sepolia";

/// Decimals of the base currency (USDC) on every network below.
const BASE_DECIMALS: u32 = 6;

fn rate(text: &str) -> Result<U256, ConfigViolation> {
    Ok(parse_rate(text)?)
}

/// Whole base currency units.
fn usd(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64.pow(BASE_DECIMALS))
}

fn curve(
    max_liquidity: U256,
    liquidation_vertex: usize,
    points: &[(&str, &str)],
) -> Result<CurveConfig, ConfigViolation> {
    let vertices = points
        .iter()
        .map(|(balance, premium)| {
            Ok(Vertex {
                balance_rate: rate(balance)?,
                premium_rate: rate(premium)?,
            })
        })
        .collect::<Result<Vec<_>, ConfigViolation>>()?;

    Ok(CurveConfig {
        max_liquidity,
        liquidation_vertex,
        vertices,
    })
}

fn major_fees() -> Result<FeeConfig, ConfigViolation> {
    Ok(FeeConfig {
        trading_fee_rate: rate("0.06%")?,
        liquidity_fee_rate: rate("0.03%")?,
        protocol_fee_rate: rate("0.01%")?,
        referral_fee_rate: rate("0.02%")?,
        referral_discount_rate: rate("0.005%")?,
        referral_rebate_rate: rate("0.01%")?,
    })
}

fn eth(token: Address, max_liquidity: U256) -> Result<AssetConfig, ConfigViolation> {
    Ok(AssetConfig {
        symbol: "ETH".to_string(),
        token,
        risk: RiskConfig {
            min_margin_rate: rate("1%")?,
            max_leverage: U256::from(100u64),
            max_risk_ratio: rate("90%")?,
            liquidation_fee_rate: rate("0.5%")?,
            liquidation_execution_fee: usd(5),
            interest_rate: rate("0.001%")?,
            max_funding_rate: rate("0.05%")?,
        },
        fee: major_fees()?,
        curve: curve(
            max_liquidity,
            4,
            &[
                ("0%", "0%"),
                ("5%", "0.05%"),
                ("10%", "0.1%"),
                ("50%", "1%"),
                ("80%", "5%"),
                ("90%", "10%"),
                ("100%", "30%"),
            ],
        )?,
    })
}

fn btc(token: Address, max_liquidity: U256) -> Result<AssetConfig, ConfigViolation> {
    Ok(AssetConfig {
        symbol: "BTC".to_string(),
        token,
        risk: RiskConfig {
            min_margin_rate: rate("1%")?,
            max_leverage: U256::from(100u64),
            max_risk_ratio: rate("90%")?,
            liquidation_fee_rate: rate("0.5%")?,
            liquidation_execution_fee: usd(5),
            interest_rate: rate("0.001%")?,
            max_funding_rate: rate("0.04%")?,
        },
        fee: major_fees()?,
        curve: curve(
            max_liquidity,
            3,
            &[
                ("0%", "0%"),
                ("10%", "0.08%"),
                ("50%", "0.8%"),
                ("85%", "6%"),
                ("100%", "25%"),
            ],
        )?,
    })
}

/// Local anvil node. Mock tokens and the oracle sit at the first CREATE addresses of the
/// default anvil deployer, signer and keepers are the default anvil accounts.
pub fn localhost() -> Result<NetworkConfig, ConfigViolation> {
    let deployer = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    let keeper_a = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");
    let keeper_b = address!("3C44CdDdB6a900fa2b585dd299e03d12FA4293BC");

    Ok(NetworkConfig {
        name: LOCALHOST.to_string(),
        chain_id: 31337,
        base_currency: address!("5FbDB2315678afecb367f032d93F642f64180aa3"),
        wrapped_native: address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"),
        price_oracle: address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"),
        min_execution_fee: usd(1) / U256::from(10u64),
        min_liquidation_fee: usd(1),
        reward_signer: deployer,
        executors: vec![keeper_a, keeper_b],
        connectors: (1..=5)
            .map(|id| Connector {
                id,
                owner: deployer,
            })
            .collect(),
        assets: vec![
            eth(address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"), usd(10_000_000))?,
            btc(address!("Cf7Ed3AccA5a467e9e704C703E8D87F634fB0Fc9"), usd(10_000_000))?,
        ],
    })
}

pub fn arbitrum_sepolia() -> Result<NetworkConfig, ConfigViolation> {
    let operator = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    let weth = address!("980B62Da83eFf3D4576C647993b0c1D7faf17c73");

    Ok(NetworkConfig {
        name: ARBITRUM_SEPOLIA.to_string(),
        chain_id: 421614,
        base_currency: address!("75faf114eafb1BDbe2F0316DF893fd58CE46AA4d"),
        wrapped_native: weth,
        price_oracle: address!("d30e2101a97dcbAeBCBC04F14C3f624E67A35165"),
        min_execution_fee: usd(1) / U256::from(5u64),
        min_liquidation_fee: usd(2),
        reward_signer: operator,
        executors: vec![operator],
        connectors: vec![Connector {
            id: 1,
            owner: operator,
        }],
        assets: vec![eth(weth, usd(1_000_000))?],
    })
}
