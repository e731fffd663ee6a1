use core::fmt::{Debug, Display};

use async_trait::async_trait;

use crate::{Address, Bytes};

/// One call inside an aggregated (multicall) request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateCall {
    pub target: Address,
    /// Maximum gas the aggregator forwards to this call.
    pub gas_limit: u64,
    pub call_data: Bytes,
}

/// Outcome of a single call inside an aggregated request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallResult {
    pub success: bool,
    pub gas_used: u64,
    pub return_data: Bytes,
}

/// Outcome of an aggregated request. `results` has one entry per submitted call, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateResult {
    pub block_number: u64,
    pub results: Vec<CallResult>,
}

/// Executes many calls in one node request through an on-chain aggregator contract.
///
/// A failing individual call is reported through its `CallResult`; an `Err` means the whole
/// request failed (node gas cap exceeded, unknown block, transport timeout, ...). The error's
/// `Display` output is what the quote engine classifies.
#[cfg_attr(feature = "test-utils", mockall::automock(type Error = String;))]
#[async_trait]
pub trait AggregatorProvider: Send + Sync {
    type Error: Display + Debug + Send + Sync;

    async fn aggregate(
        &self,
        calls: Vec<AggregateCall>,
        block_number: u64,
    ) -> Result<AggregateResult, Self::Error>;
}

/// Trait for fetching the latest block number of the chain.
#[cfg_attr(feature = "test-utils", mockall::automock(type Error = String;))]
#[async_trait]
pub trait BlockNumberProvider: Send + Sync {
    type Error: Display + Debug + Send + Sync;

    async fn get_block_number(&self) -> Result<u64, Self::Error>;
}
