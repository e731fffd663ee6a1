use thiserror::Error;

use crate::{models::Protocol, Address};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("Route from {input} to {output} has no pools")]
    Empty { input: Address, output: Address },

    #[error("{protocol} route contains a {pool_protocol} pool: {pool}")]
    ProtocolMismatch { protocol: Protocol, pool_protocol: Protocol, pool: Address },

    #[error("Pool {pool} does not contain token {token}")]
    Disconnected { pool: Address, token: Address },

    #[error("Pool {pool} has fee {fee}, above the largest encodable fee")]
    FeeOutOfRange { pool: Address, fee: u32 },

    #[error("Route ends at {actual} but expected output {expected}")]
    WrongOutput { expected: Address, actual: Address },
}
