use alloy::{
    core::sol,
    primitives::{Address, Bytes, U256},
    rpc::types::{BlockNumberOrTag, TransactionInput, TransactionRequest},
    sol_types::SolCall,
};
use async_trait::async_trait;
use quoter_common::traits::{AggregateCall, AggregateResult, AggregatorProvider, CallResult};
use tracing::{instrument, trace};

use crate::{rpc::EthereumRpcClient, RPCError};

// Uniswap interface multicall: every call gets its own gas limit and reports the gas it used.
sol! {
    interface IUniswapInterfaceMulticall {
        struct MulticallCall {
            address target;
            uint256 gasLimit;
            bytes callData;
        }

        struct MulticallResult {
            bool success;
            uint256 gasUsed;
            bytes returnData;
        }

        function multicall(MulticallCall[] memory calls)
            public
            returns (uint256 blockNumber, MulticallResult[] memory returnData);
    }
}

use IUniswapInterfaceMulticall::{multicallCall, MulticallCall, MulticallResult};

/// Aggregates quoter calls through the Uniswap interface multicall with a single `eth_call`.
#[derive(Clone, Debug)]
pub struct UniswapMulticallProvider {
    client: EthereumRpcClient,
    address: Address,
}

impl UniswapMulticallProvider {
    pub fn new(client: EthereumRpcClient, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }
}

#[async_trait]
impl AggregatorProvider for UniswapMulticallProvider {
    type Error = RPCError;

    #[instrument(level = "debug", skip(self, calls), fields(calls = calls.len()))]
    async fn aggregate(
        &self,
        calls: Vec<AggregateCall>,
        block_number: u64,
    ) -> Result<AggregateResult, Self::Error> {
        let calls = calls
            .into_iter()
            .map(|call| MulticallCall {
                target: call.target,
                gasLimit: U256::from(call.gas_limit),
                callData: call.call_data,
            })
            .collect();
        let calldata: Bytes = multicallCall { calls }.abi_encode().into();

        let request = TransactionRequest::default()
            .to(self.address)
            .input(TransactionInput::both(calldata));

        let output = self
            .client
            .eth_call(request, BlockNumberOrTag::Number(block_number))
            .await?;

        let decoded = multicallCall::abi_decode_returns(&output)
            .map_err(|e| RPCError::DecodingError(format!("Failed to decode multicall: {e}")))?;

        trace!(block_number = %decoded.blockNumber, "Multicall returned");

        Ok(AggregateResult {
            block_number: decoded.blockNumber.saturating_to(),
            results: decoded
                .returnData
                .into_iter()
                .map(|MulticallResult { success, gasUsed, returnData }| CallResult {
                    success,
                    gas_used: gasUsed.saturating_to(),
                    return_data: returnData,
                })
                .collect(),
        })
    }
}
