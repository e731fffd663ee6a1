//! RPC retry logic and error classification
//!
//! Transport level retries only: rate limits, unavailable backends and null responses are
//! retried with exponential backoff. Everything else (including reverted or gas-capped calls)
//! is surfaced to the caller, which for quotes is the quote engine's own failure handling.

use std::time::Duration;

use alloy::{
    primitives::private::serde::Deserialize,
    rpc::json_rpc::ErrorPayload,
    transports::{RpcError, TransportErrorKind},
};
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use serde_json::value::RawValue;
use tracing::debug;

use crate::rpc::config::RPCRetryConfig;

/// Node answers returned to the caller without retrying. The quote engine reacts to them itself
/// by rolling back the target block.
const NON_RETRYABLE_MESSAGES: &[&str] = &["header not found"];

fn is_retryable_payload<E>(payload: &ErrorPayload<E>) -> bool {
    payload.is_retry_err() &&
        !NON_RETRYABLE_MESSAGES
            .iter()
            .any(|message| payload.message.contains(message))
}

/// Extension trait to implement retry logic for [`RpcError<TransportErrorKind>`].
///
/// # Attribution
/// Adapted from alloy-transport:
/// https://github.com/alloy-rs/alloy/blob/a3899575fbc0c789275f95661516b99e9a92838d/crates/transport/src/error.rs#L156
/// License: MIT OR Apache-2.0
pub(crate) trait RpcErrorExt {
    /// Analyzes whether to retry the request depending on the error.
    ///
    /// Returns `true` for transient errors that are likely to succeed on retry:
    /// - Rate limiting (429) errors
    /// - Service unavailable (503) errors
    /// - Null responses
    /// - Certain JSON-RPC error codes, except missing block headers
    fn is_retryable(&self) -> bool;

    /// Fetches the backoff hint from the error message if present.
    ///
    /// Some RPC providers (e.g., Infura) include a suggested backoff duration
    /// in their rate limit error responses under `data.rate.backoff_seconds`.
    fn backoff_hint(&self) -> Option<Duration>;
}

impl<E: std::borrow::Borrow<RawValue>> RpcErrorExt for RpcError<TransportErrorKind, E> {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(err) => err.is_retry_err(),
            Self::SerError(_) => false,
            Self::DeserError { text, .. } => {
                if let Ok(resp) = serde_json::from_str::<ErrorPayload>(text) {
                    return is_retryable_payload(&resp);
                }

                // some providers send invalid JSON RPC in the error case (no `id:u64`), but the
                // text should be a `JsonRpcError`
                #[derive(Deserialize)]
                struct Resp {
                    error: ErrorPayload,
                }

                if let Ok(resp) = serde_json::from_str::<Resp>(text) {
                    return is_retryable_payload(&resp.error);
                }

                false
            }
            Self::ErrorResp(err) => is_retryable_payload(err),
            Self::NullResp => true,
            _ => false,
        }
    }

    fn backoff_hint(&self) -> Option<Duration> {
        if let Self::ErrorResp(resp) = self {
            let data = resp.try_data_as::<serde_json::Value>();
            if let Some(Ok(data)) = data {
                let backoff_seconds = &data["rate"]["backoff_seconds"];
                if let Some(seconds) = backoff_seconds.as_u64() {
                    return Some(Duration::from_secs(seconds));
                }
                // round up fractional hints
                if let Some(seconds) = backoff_seconds.as_f64() {
                    return Some(Duration::from_secs(seconds.ceil() as u64));
                }
            }
        }
        None
    }
}

/// Retry behaviour of the RPC client: exponential backoff bounded by a number of retries.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    backoff: ExponentialBackoff,
    max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RPCRetryConfig::default().into()
    }
}

impl From<RPCRetryConfig> for RetryPolicy {
    fn from(config: RPCRetryConfig) -> Self {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(config.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();

        Self { backoff, max_retries: config.max_retries }
    }
}

impl From<&RetryPolicy> for RPCRetryConfig {
    fn from(policy: &RetryPolicy) -> Self {
        RPCRetryConfig {
            max_retries: policy.max_retries,
            initial_backoff_ms: policy.backoff.initial_interval.as_millis() as u64,
            max_backoff_ms: policy.backoff.max_interval.as_millis() as u64,
        }
    }
}

impl RetryPolicy {
    /// Creates a retry policy optimized for testing (very short intervals).
    #[cfg(test)]
    pub fn for_testing() -> Self {
        RPCRetryConfig::new(5, 1, 5).into()
    }

    /// Executes an RPC request, retrying transient failures.
    ///
    /// Waits between attempts follow the exponential backoff unless the provider sent a hint,
    /// in which case the hint is used. After `max_retries` retries the last error is returned.
    pub(crate) async fn retry_request<F, Fut, T>(
        &self,
        mut operation: F,
    ) -> Result<T, RpcError<TransportErrorKind>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, RpcError<TransportErrorKind>>>,
    {
        let mut backoff = self.backoff.clone();
        backoff.reset();
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if retries < self.max_retries && err.is_retryable() => {
                    let Some(wait) = err
                        .backoff_hint()
                        .or_else(|| backoff.next_backoff())
                    else {
                        return Err(err);
                    };
                    retries += 1;
                    debug!(retries, ?wait, error = %err, "Retrying RPC request");
                    tokio::time::sleep(wait).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
