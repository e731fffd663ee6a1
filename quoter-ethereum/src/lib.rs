#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod addresses;
pub mod multicall;
pub mod onchain_quote;
pub mod quoter;
pub mod rpc;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use onchain_quote::{
    config::{OnChainQuoteConfig, ProviderConfig},
    errors::QuoteError,
    OnChainQuoteProvider,
};
pub use rpc::{
    errors::{RPCError, RequestError},
    EthereumRpcClient,
};
