//! Per-asset configuration blocks supplied to pools at creation time.

use alloy_core::{
    dyn_abi::DynSolValue,
    primitives::{Address, U256},
};
use serde::{Deserialize, Serialize};

use crate::{
    client::uint,
    rate::{FormatError, RATE_ONE},
};

/// A rule broken by a static configuration value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigViolation {
    #[error(transparent)]
    Rate(#[from] FormatError),
    #[error("{field} is {value}, above 100%")]
    RateAboveOne { field: &'static str, value: U256 },
    #[error("referral split {parts} exceeds the referral fee rate {parent}")]
    ReferralSplitExceedsParent { parts: U256, parent: U256 },
    #[error("max leverage must be positive")]
    ZeroLeverage,
    #[error("price impact curve has no vertices")]
    EmptyCurve,
    #[error("price impact curve must start at (0%, 0%)")]
    CurveStart,
    #[error("price impact curve must end at a balance rate of 100%")]
    CurveEnd,
    #[error("vertex {index} balance rate does not increase")]
    BalanceNotIncreasing { index: usize },
    #[error("vertex {index} premium rate decreases")]
    PremiumDecreasing { index: usize },
    #[error("liquidation vertex {index} is out of range for {len} vertices")]
    LiquidationVertexOutOfRange { index: usize, len: usize },
    #[error("asset `{0}` is configured twice")]
    DuplicateAsset(String),
    #[error("connector {0} is configured twice")]
    DuplicateConnector(u64),
}

fn ensure_at_most_one(field: &'static str, value: U256) -> Result<(), ConfigViolation> {
    if value > U256::from(RATE_ONE) {
        return Err(ConfigViolation::RateAboveOne { field, value });
    }
    Ok(())
}

/// Margin and liquidation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskConfig {
    pub min_margin_rate: U256,
    /// Whole multiple, not a rate.
    pub max_leverage: U256,
    pub max_risk_ratio: U256,
    pub liquidation_fee_rate: U256,
    /// Amount in base currency units.
    pub liquidation_execution_fee: U256,
    pub interest_rate: U256,
    pub max_funding_rate: U256,
}

impl RiskConfig {
    /// Canonical ABI type of [`RiskConfig::to_abi`].
    pub const ABI_TYPE: &'static str =
        "(uint256,uint256,uint256,uint256,uint256,uint256,uint256)";

    pub fn validate(&self) -> Result<(), ConfigViolation> {
        ensure_at_most_one("min margin rate", self.min_margin_rate)?;
        ensure_at_most_one("max risk ratio", self.max_risk_ratio)?;
        ensure_at_most_one("liquidation fee rate", self.liquidation_fee_rate)?;
        if self.max_leverage.is_zero() {
            return Err(ConfigViolation::ZeroLeverage);
        }
        Ok(())
    }

    pub fn to_abi(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            uint(self.min_margin_rate),
            uint(self.max_leverage),
            uint(self.max_risk_ratio),
            uint(self.liquidation_fee_rate),
            uint(self.liquidation_execution_fee),
            uint(self.interest_rate),
            uint(self.max_funding_rate),
        ])
    }
}

/// Fee rates charged by a pool.
///
/// The referral fee is split into a trader discount and a rebate to the referrer; the
/// two parts together never exceed the referral fee they come out of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    pub trading_fee_rate: U256,
    pub liquidity_fee_rate: U256,
    pub protocol_fee_rate: U256,
    pub referral_fee_rate: U256,
    pub referral_discount_rate: U256,
    pub referral_rebate_rate: U256,
}

impl FeeConfig {
    /// Canonical ABI type of [`FeeConfig::to_abi`].
    pub const ABI_TYPE: &'static str = "(uint256,uint256,uint256,uint256,uint256,uint256)";

    pub fn validate(&self) -> Result<(), ConfigViolation> {
        ensure_at_most_one("trading fee rate", self.trading_fee_rate)?;
        ensure_at_most_one("liquidity fee rate", self.liquidity_fee_rate)?;
        ensure_at_most_one("protocol fee rate", self.protocol_fee_rate)?;
        ensure_at_most_one("referral fee rate", self.referral_fee_rate)?;
        ensure_at_most_one("referral discount rate", self.referral_discount_rate)?;
        ensure_at_most_one("referral rebate rate", self.referral_rebate_rate)?;

        let parts = self.referral_discount_rate + self.referral_rebate_rate;
        if parts > self.referral_fee_rate {
            return Err(ConfigViolation::ReferralSplitExceedsParent {
                parts,
                parent: self.referral_fee_rate,
            });
        }
        Ok(())
    }

    pub fn to_abi(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            uint(self.trading_fee_rate),
            uint(self.liquidity_fee_rate),
            uint(self.protocol_fee_rate),
            uint(self.referral_fee_rate),
            uint(self.referral_discount_rate),
            uint(self.referral_rebate_rate),
        ])
    }
}

/// One point of the price impact curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub balance_rate: U256,
    pub premium_rate: U256,
}

/// Piecewise-linear premium curve from `(0%, 0%)` to `(100%, premium max)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveConfig {
    /// Amount in base currency units.
    pub max_liquidity: U256,
    pub liquidation_vertex: usize,
    pub vertices: Vec<Vertex>,
}

impl CurveConfig {
    /// Canonical ABI type of [`CurveConfig::to_abi`].
    pub const ABI_TYPE: &'static str = "(uint256,uint256,(uint256,uint256)[])";

    pub fn validate(&self) -> Result<(), ConfigViolation> {
        let (first, last) = match (self.vertices.first(), self.vertices.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ConfigViolation::EmptyCurve),
        };

        if !first.balance_rate.is_zero() || !first.premium_rate.is_zero() {
            return Err(ConfigViolation::CurveStart);
        }
        if last.balance_rate != U256::from(RATE_ONE) {
            return Err(ConfigViolation::CurveEnd);
        }

        for (index, pair) in self.vertices.windows(2).enumerate() {
            if pair[1].balance_rate <= pair[0].balance_rate {
                return Err(ConfigViolation::BalanceNotIncreasing { index: index + 1 });
            }
            if pair[1].premium_rate < pair[0].premium_rate {
                return Err(ConfigViolation::PremiumDecreasing { index: index + 1 });
            }
        }

        if self.liquidation_vertex >= self.vertices.len() {
            return Err(ConfigViolation::LiquidationVertexOutOfRange {
                index: self.liquidation_vertex,
                len: self.vertices.len(),
            });
        }

        Ok(())
    }

    pub fn to_abi(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            uint(self.max_liquidity),
            uint(U256::from(self.liquidation_vertex)),
            DynSolValue::Array(
                self.vertices
                    .iter()
                    .map(|v| DynSolValue::Tuple(vec![uint(v.balance_rate), uint(v.premium_rate)]))
                    .collect(),
            ),
        ])
    }
}

/// Everything a pool needs to know about the asset it trades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    pub token: Address,
    pub risk: RiskConfig,
    pub fee: FeeConfig,
    pub curve: CurveConfig,
}

impl AssetConfig {
    pub fn validate(&self) -> Result<(), ConfigViolation> {
        self.risk.validate()?;
        self.fee.validate()?;
        self.curve.validate()
    }
}
