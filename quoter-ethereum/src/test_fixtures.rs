use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use alloy::{
    primitives::{Address, U256},
    sol_types::{
        sol_data::{Bytes as SolBytes, Uint},
        SolType,
    },
};
use async_trait::async_trait;
use quoter_common::traits::{AggregateCall, AggregateResult, AggregatorProvider, CallResult};

use crate::quoter::encode_quote_return;

/// What the aggregator was asked to do in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedCall {
    pub target: Address,
    pub calls: usize,
    pub gas_limit: u64,
    pub block_number: u64,
}

/// In-memory aggregator answering through a closure. The closure gets the 0-based index of
/// the aggregator call, the calls and the requested block.
pub(crate) struct ScriptedAggregator<F> {
    handler: F,
    count: AtomicUsize,
    recorded: Mutex<Vec<RecordedCall>>,
}

impl<F> ScriptedAggregator<F>
where
    F: Fn(usize, &[AggregateCall], u64) -> Result<AggregateResult, String> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler, count: AtomicUsize::new(0), recorded: Mutex::new(Vec::new()) }
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<RecordedCall> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl<F> AggregatorProvider for ScriptedAggregator<F>
where
    F: Fn(usize, &[AggregateCall], u64) -> Result<AggregateResult, String> + Send + Sync,
{
    type Error = String;

    async fn aggregate(
        &self,
        calls: Vec<AggregateCall>,
        block_number: u64,
    ) -> Result<AggregateResult, Self::Error> {
        let call_idx = self.count.fetch_add(1, Ordering::SeqCst);
        self.recorded
            .lock()
            .unwrap()
            .push(RecordedCall {
                target: calls
                    .first()
                    .map(|call| call.target)
                    .unwrap_or_default(),
                calls: calls.len(),
                gas_limit: calls
                    .first()
                    .map(|call| call.gas_limit)
                    .unwrap_or_default(),
                block_number,
            });
        (self.handler)(call_idx, &calls, block_number)
    }
}

/// Answers every quoter call with `amount * 1000 + tag`, where the tag is the last byte of the
/// encoded path, so each result can be traced back to its request.
pub(crate) fn quoted(calls: &[AggregateCall], block_number: u64) -> AggregateResult {
    let results = calls
        .iter()
        .map(|call| {
            let (path, amount) =
                <(SolBytes, Uint<256>)>::abi_decode_params(&call.call_data[4..]).unwrap();
            let tag = *path.last().unwrap();
            let quote = amount * U256::from(1000) + U256::from(tag);
            CallResult {
                success: true,
                gas_used: 100_000,
                return_data: encode_quote_return(quote, 1, U256::from(80_000)),
            }
        })
        .collect();
    AggregateResult { block_number, results }
}
