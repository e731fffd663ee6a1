use thiserror::Error;

use crate::onchain_quote::classifier::FailureKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    /// Route set and quote direction cannot be served. Raised before anything is dispatched.
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Failed to fetch block number: {0}")]
    BlockNumber(String),
    /// Batches still failing after the last attempt and the distinct kinds of their failures.
    #[error("Failed to get {failed} quotes. Reasons: {}", join_kinds(.reasons))]
    QuotesFailed { failed: usize, reasons: Vec<FailureKind> },
    #[error("Internal error: {0}")]
    Internal(String),
}

fn join_kinds(kinds: &[FailureKind]) -> String {
    kinds
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
