use std::fmt::Display;

use alloy::transports::{RpcError as AlloyRpcError, TransportErrorKind};
use thiserror::Error;

pub(crate) type AlloyError = AlloyRpcError<TransportErrorKind>;

/// A request the node or the transport rejected.
///
/// `Display` keeps the node's own message, the quote engine classifies failures on it.
#[derive(Error, Debug)]
#[error("{context}: {source}")]
pub struct RequestError {
    pub context: String,
    #[source]
    pub source: AlloyError,
}

#[derive(Error, Debug)]
pub enum RPCError {
    #[error("RPC setup error: {0}")]
    SetupError(String),
    #[error("Request error: {0}")]
    RequestError(#[from] RequestError),
    #[error("Decoding error: {0}")]
    DecodingError(String),
    #[error("Unknown error: {0}")]
    UnknownError(String),
}

/// Wraps alloy errors of a request into [`RPCError::RequestError`] with a context message.
pub(crate) trait RpcResultExt<T> {
    fn rpc_context<C: Display>(self, context: C) -> Result<T, RPCError>;

    /// Same as `rpc_context`, the message is only built on error.
    fn with_rpc_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T, RPCError>;
}

impl<T> RpcResultExt<T> for Result<T, AlloyError> {
    fn rpc_context<C: Display>(self, context: C) -> Result<T, RPCError> {
        self.with_rpc_context(|| context)
    }

    fn with_rpc_context<C: Display, F: FnOnce() -> C>(self, f: F) -> Result<T, RPCError> {
        self.map_err(|source| RequestError { context: f().to_string(), source }.into())
    }
}
