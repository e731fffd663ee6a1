use std::ops::Range;

use quoter_common::traits::CallResult;

use crate::onchain_quote::classifier::QuoteFailure;

/// Results of a batch whose multicall went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResults {
    pub block_number: u64,
    pub results: Vec<CallResult>,
    /// Highest `gas_used` among the successful calls of the batch.
    pub approx_gas_used_per_success_call: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Success(BatchResults),
    Failed(QuoteFailure),
}

/// A contiguous slice of the run's quote requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteBatch {
    pub inputs: Range<usize>,
    pub state: BatchState,
}

impl QuoteBatch {
    pub fn pending(inputs: Range<usize>) -> Self {
        Self { inputs, state: BatchState::Pending }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn is_success(&self) -> bool {
        matches!(self.state, BatchState::Success(_))
    }

    pub fn failure(&self) -> Option<&QuoteFailure> {
        match &self.state {
            BatchState::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn results(&self) -> Option<&BatchResults> {
        match &self.state {
            BatchState::Success(results) => Some(results),
            _ => None,
        }
    }
}

/// Batch size that splits `total` requests into `ceil(total / chunk)` batches of near equal
/// size, so there is no tiny trailing batch.
pub fn normalized_chunk(total: usize, chunk: usize) -> usize {
    if total == 0 || chunk == 0 {
        return chunk;
    }
    total.div_ceil(total.div_ceil(chunk))
}

/// Splits `total` requests into pending batches, in request order.
pub fn plan_batches(total: usize, chunk: usize) -> Vec<QuoteBatch> {
    let size = normalized_chunk(total, chunk).max(1);
    (0..total)
        .step_by(size)
        .map(|start| QuoteBatch::pending(start..(start + size).min(total)))
        .collect()
}

/// Counts of (success, failed, pending) batches.
pub fn partition(batches: &[QuoteBatch]) -> (usize, usize, usize) {
    batches
        .iter()
        .fold((0, 0, 0), |(success, failed, pending), batch| match batch.state {
            BatchState::Success(_) => (success + 1, failed, pending),
            BatchState::Failed(_) => (success, failed + 1, pending),
            BatchState::Pending => (success, failed, pending + 1),
        })
}
