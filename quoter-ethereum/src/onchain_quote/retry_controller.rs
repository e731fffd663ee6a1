use std::collections::{BTreeSet, HashSet};

use metrics::counter;
use quoter_common::models::Chain;
use tracing::{error, info};

use crate::onchain_quote::{
    batch::{partition, QuoteBatch},
    classifier::{validate_block_numbers, FailureKind, QuoteFailure},
    config::{BatchParams, OnChainQuoteConfig, RollbackConfig},
    errors::QuoteError,
};

/// What to do after a dispatch round settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Every batch succeeded at the same block.
    Complete,
    /// Run another round. With `retry_all`, all requests are re-planned from scratch.
    Retry { retry_all: bool },
    /// Out of attempts with only gas errors on a chain with split gas accounting: report no
    /// quotes instead of failing.
    Degrade,
}

/// Mutable state of one quote run, only touched between rounds.
#[derive(Debug, Clone)]
pub struct RunState {
    pub params: BatchParams,
    pub block_number: u64,
    /// 1-based number of the current round.
    pub attempt: u32,
    pub expected_calls: usize,
    pub total_calls: usize,
    seen: HashSet<FailureKind>,
    block_header_failures: u32,
    rolled_back: bool,
    gas_override_applied: bool,
    success_rate_retried: bool,
}

impl RunState {
    pub fn new(params: BatchParams, block_number: u64) -> Self {
        Self {
            params,
            block_number,
            attempt: 0,
            expected_calls: 0,
            total_calls: 0,
            seen: HashSet::new(),
            block_header_failures: 0,
            rolled_back: false,
            gas_override_applied: false,
            success_rate_retried: false,
        }
    }

    /// Low success rates are accepted once the run already retried for one.
    pub fn accepts_low_success_rate(&self) -> bool {
        self.success_rate_retried
    }

    pub fn saw_timeout(&self) -> bool {
        self.seen
            .contains(&FailureKind::ProviderTimeout)
    }

    pub fn retry_loops(&self) -> u32 {
        self.attempt.saturating_sub(1)
    }

    /// Interprets the settled batches of the current round and updates the run parameters.
    pub fn evaluate(
        &mut self,
        batches: &[QuoteBatch],
        config: &OnChainQuoteConfig,
        chain: Chain,
    ) -> Result<RoundOutcome, QuoteError> {
        let (_, _, pending) = partition(batches);
        if pending > 0 {
            return Err(QuoteError::Internal(
                "Pending quote batch after waiting for all dispatches".to_string(),
            ));
        }

        let block_conflict = validate_block_numbers(
            batches
                .iter()
                .filter_map(|batch| batch.results())
                .map(|results| results.block_number),
            batches.len(),
            self.params.gas_limit_per_call,
        );
        let failures: Vec<&QuoteFailure> = block_conflict
            .iter()
            .chain(
                batches
                    .iter()
                    .filter_map(QuoteBatch::failure),
            )
            .collect();

        if failures.is_empty() {
            return Ok(RoundOutcome::Complete);
        }

        let reasons: BTreeSet<FailureKind> = failures
            .iter()
            .map(|failure| failure.kind)
            .collect();
        info!(
            attempt = self.attempt,
            failed = failures.len(),
            batches = batches.len(),
            reasons = %join_kinds(&reasons),
            "Quote batches failed"
        );

        let mut retry_all = false;
        let mut header_failure_counted = false;
        for failure in &failures {
            info!(attempt = self.attempt, error = %failure.message, "[QuoteFetchError]");

            if self.seen.insert(failure.kind) {
                counter!("quote_retry", "reason" => failure.kind.as_ref().to_string()).increment(1);
            }

            match failure.kind {
                FailureKind::BlockConflict => retry_all = true,
                FailureKind::ProviderBlockHeader => {
                    // several batches failing on the same missing header count once per round
                    if !header_failure_counted {
                        self.block_header_failures += 1;
                        header_failure_counted = true;
                    }
                    if let RollbackConfig::Enabled {
                        rollback_block_offset,
                        attempts_before_rollback,
                    } = config.block_number_config.rollback
                    {
                        if self.block_header_failures >= attempts_before_rollback &&
                            !self.rolled_back
                        {
                            info!(
                                attempt = self.attempt,
                                header_failures = self.block_header_failures,
                                rollback_block_offset,
                                "Rolling back block number for next retry"
                            );
                            self.block_number = self
                                .block_number
                                .saturating_add_signed(rollback_block_offset);
                            self.rolled_back = true;
                            retry_all = true;
                        }
                    }
                }
                FailureKind::ProviderGas => {
                    if !self.gas_override_applied {
                        self.params = config
                            .gas_error_failure_override
                            .apply(&self.params);
                        self.gas_override_applied = true;
                        retry_all = true;
                    }
                }
                FailureKind::SuccessRate => {
                    // a low success rate can mean too little gas per call
                    if !self.success_rate_retried {
                        self.params = config
                            .success_rate_failure_overrides
                            .apply(&self.params);
                        self.success_rate_retried = true;
                        retry_all = true;
                    }
                }
                FailureKind::ProviderTimeout | FailureKind::UnknownProvider => {}
            }
        }

        if self.attempt >= config.max_attempts() {
            if chain.has_split_gas_accounting() &&
                failures
                    .iter()
                    .all(|failure| failure.kind == FailureKind::ProviderGas)
            {
                error!(
                    %chain,
                    "Failed to get quotes due to provider gas error issue. \
                     Overriding error to return 0 quotes."
                );
                return Ok(RoundOutcome::Degrade);
            }
            return Err(QuoteError::QuotesFailed {
                failed: failures.len(),
                reasons: reasons.into_iter().collect(),
            });
        }

        Ok(RoundOutcome::Retry { retry_all })
    }
}

fn join_kinds(kinds: &BTreeSet<FailureKind>) -> String {
    kinds
        .iter()
        .map(FailureKind::as_ref)
        .collect::<Vec<_>>()
        .join(", ")
}
