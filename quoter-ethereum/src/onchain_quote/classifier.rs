//! Failure taxonomy and the checks that produce it.

use std::collections::BTreeSet;

use quoter_common::{
    models::{route::Route, Protocol, TradeType},
    traits::CallResult,
};
use strum_macros::{AsRefStr, Display};
use thiserror::Error;
use tracing::info;

use crate::onchain_quote::errors::QuoteError;

/// Provider error messages embed the full calldata. Anything kept is cut to this many chars.
const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// Why a batch failed. Variants are listed in the order errors are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr)]
pub enum FailureKind {
    #[strum(serialize = "BlockConflictError")]
    BlockConflict,
    #[strum(serialize = "ProviderBlockHeaderError")]
    ProviderBlockHeader,
    #[strum(serialize = "ProviderTimeoutError")]
    ProviderTimeout,
    #[strum(serialize = "ProviderGasError")]
    ProviderGas,
    #[strum(serialize = "SuccessRateError")]
    SuccessRate,
    #[strum(serialize = "UnknownProviderError")]
    UnknownProvider,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct QuoteFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl QuoteFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Maps a provider error message to its failure kind.
///
/// This is plain substring matching on what nodes currently answer, so it is the one place to
/// touch when a provider changes its wording.
pub fn classify(message: &str) -> FailureKind {
    if message.contains("header not found") {
        FailureKind::ProviderBlockHeader
    } else if message.contains("timeout") {
        FailureKind::ProviderTimeout
    } else if message.contains("out of gas") {
        FailureKind::ProviderGas
    } else {
        FailureKind::UnknownProvider
    }
}

fn truncate(message: &str) -> String {
    message
        .chars()
        .take(MAX_ERROR_MESSAGE_CHARS)
        .collect()
}

/// Builds the failure for an aggregator call that errored as a whole.
///
/// `batch_idx`, `batch_count` and `batch_len` only feed the timeout message.
pub fn provider_failure(
    message: &str,
    batch_idx: usize,
    batch_count: usize,
    batch_len: usize,
) -> QuoteFailure {
    let kind = classify(message);
    let truncated = truncate(message);
    let message = match kind {
        FailureKind::ProviderTimeout => format!(
            "Req {batch_idx}/{batch_count}. Request had {batch_len} inputs. {truncated}"
        ),
        FailureKind::UnknownProvider => format!("Unknown error from provider: {truncated}"),
        _ => truncated,
    };
    QuoteFailure::new(kind, message)
}

/// A call only counts as a quote if it succeeded and returned more than a single byte.
pub fn is_successful_call(result: &CallResult) -> bool {
    result.success && result.return_data.len() > 1
}

/// Checks the share of successful calls in a batch.
///
/// Once the run already retried for a low success rate, the rate is logged and accepted.
pub fn validate_success_rate(
    results: &[CallResult],
    min_success_rate: f64,
    accept_low_rate: bool,
) -> Option<QuoteFailure> {
    if results.is_empty() {
        return None;
    }
    let successes = results
        .iter()
        .filter(|result| is_successful_call(result))
        .count();
    let success_rate = successes as f64 / results.len() as f64;

    if success_rate >= min_success_rate {
        return None;
    }
    if accept_low_rate {
        info!(
            min_success_rate,
            success_rate, "Quote success rate still below threshold despite retry. Continuing."
        );
        return None;
    }
    Some(QuoteFailure::new(
        FailureKind::SuccessRate,
        format!("Quote success rate below threshold of {min_success_rate}: {success_rate}"),
    ))
}

/// Checks that all successful batches of a round were executed at the same block.
pub fn validate_block_numbers(
    block_numbers: impl IntoIterator<Item = u64>,
    total_calls: usize,
    gas_limit_per_call: u64,
) -> Option<QuoteFailure> {
    let blocks: BTreeSet<u64> = block_numbers.into_iter().collect();
    if blocks.len() <= 1 {
        return None;
    }
    let blocks = blocks
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    Some(QuoteFailure::new(
        FailureKind::BlockConflict,
        format!(
            "Quotes returned from different blocks. {blocks}. {total_calls} calls were made with \
             gas limit {gas_limit_per_call}"
        ),
    ))
}

/// Rejects route sets no single quoter can serve. Returns whether the mixed route quoter is
/// needed.
pub fn validate_routes(routes: &[Route], trade_type: TradeType) -> Result<bool, QuoteError> {
    let use_mixed_quoter = routes
        .iter()
        .any(Route::requires_mixed_quoter);

    if use_mixed_quoter &&
        routes
            .iter()
            .any(|route| route.protocol() == Protocol::V3)
    {
        return Err(QuoteError::Validation(
            "Cannot use mixed route quoter with V3 routes".to_string(),
        ));
    }

    if use_mixed_quoter && trade_type == TradeType::ExactOut {
        return Err(QuoteError::Validation(
            "Cannot call quoteExactOutput with V2 or Mixed routes".to_string(),
        ));
    }

    Ok(use_mixed_quoter)
}
