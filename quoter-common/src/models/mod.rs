pub mod error;
pub mod quote;
pub mod route;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Chain {
    #[default]
    Ethereum,
    Arbitrum,
    Optimism,
    Polygon,
    Base,
    Celo,
}

impl Chain {
    pub fn id(&self) -> u64 {
        match self {
            Chain::Ethereum => 1,
            Chain::Arbitrum => 42161,
            Chain::Optimism => 10,
            Chain::Polygon => 137,
            Chain::Base => 8453,
            Chain::Celo => 42220,
        }
    }

    /// Whether the chain accounts storage and compute gas separately.
    ///
    /// On such chains a per-call gas limit inside a multicall cannot guarantee that the node's
    /// own gas cap is respected, so quote runs that keep failing with gas errors are reported as
    /// "no quotes" instead of an error.
    pub fn has_split_gas_accounting(&self) -> bool {
        matches!(self, Chain::Arbitrum)
    }
}

/// The liquidity protocol family a route (or a pool) belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    V2,
    V3,
    Mixed,
}

impl Protocol {
    /// Routes touching V2 pairs can only be quoted by the mixed route quoter.
    pub fn requires_mixed_quoter(&self) -> bool {
        matches!(self, Protocol::V2 | Protocol::Mixed)
    }
}

/// Direction of a quote.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TradeType {
    /// Fixed input amount, quote is the output amount.
    ExactIn,
    /// Fixed output amount, quote is the required input amount.
    ExactOut,
}

impl TradeType {
    /// Name of the quoter function used for this direction.
    pub fn function_name(&self) -> &'static str {
        match self {
            TradeType::ExactIn => "quoteExactInput",
            TradeType::ExactOut => "quoteExactOutput",
        }
    }
}
