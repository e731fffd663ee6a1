use alloy_primitives::aliases::U160;
use serde::{Deserialize, Serialize};

use crate::{models::route::Route, Address, U256};

/// A raw token amount, either the fixed input (exact in) or the fixed output (exact out).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub token: Address,
    pub amount: U256,
}

impl CurrencyAmount {
    pub fn new(token: Address, amount: U256) -> Self {
        Self { token, amount }
    }
}

/// Values returned by the quoter for a successful quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteData {
    /// Output amount for exact in quotes, required input amount for exact out quotes.
    pub quote: U256,
    /// For each V3 pool in the route, the sqrtPriceX96 after the swap.
    pub sqrt_price_x96_after_list: Vec<U160>,
    /// For each V3 pool in the route, the number of initialized ticks crossed.
    pub initialized_ticks_crossed_list: Vec<u32>,
    /// Gas estimate reported by the quoter. It is not exact since the cost of storage reads
    /// depends on what was already touched earlier in the same multicall.
    pub gas_estimate: U256,
}

/// The quote for one amount on one route. `quote` is `None` when the call failed, e.g. because
/// the pools do not hold enough liquidity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountQuote {
    pub amount: CurrencyAmount,
    pub quote: Option<QuoteData>,
}

impl AmountQuote {
    pub fn failed(amount: CurrencyAmount) -> Self {
        Self { amount, quote: None }
    }
}

/// A route with one quote per requested amount, in amount order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteWithQuotes {
    pub route: Route,
    pub quotes: Vec<AmountQuote>,
}

/// Result of a quote run: one entry per requested route, in route order, and the block the
/// quotes were computed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainQuotes {
    pub routes_with_quotes: Vec<RouteWithQuotes>,
    pub block_number: u64,
}

impl OnChainQuotes {
    /// Number of (route, amount) pairs that received a quote.
    pub fn successful_quotes(&self) -> usize {
        self.routes_with_quotes
            .iter()
            .flat_map(|route| route.quotes.iter())
            .filter(|quote| quote.quote.is_some())
            .count()
    }
}
