//! Deployed contract addresses per chain.

use alloy::primitives::{address, Address};
use quoter_common::models::Chain;

const QUOTER_V2: Address = address!("61fFE014bA17989E743c5F6cB21bF9697530B21e");
const MIXED_ROUTE_QUOTER_V1: Address = address!("84E44095eeBfEC7793Cd7d5b57B7e401D7f1cA2E");
const MULTICALL: Address = address!("1F98415757620B543A52E61c46B32eB19261F984");

/// Quoter for pure V3 routes.
pub fn quoter_v2_address(chain: Chain) -> Address {
    match chain {
        Chain::Ethereum | Chain::Arbitrum | Chain::Optimism | Chain::Polygon => QUOTER_V2,
        Chain::Base => address!("3d4e44Eb1374240CE5F1B871ab261CD16335B76a"),
        Chain::Celo => address!("82825d0554fA07f7FC52Ab63c961F330fdEFa8E8"),
    }
}

/// Quoter for routes that touch V2 pairs. Only deployed on mainnet.
pub fn mixed_route_quoter_address(chain: Chain) -> Option<Address> {
    match chain {
        Chain::Ethereum => Some(MIXED_ROUTE_QUOTER_V1),
        _ => None,
    }
}

pub fn multicall_address(chain: Chain) -> Address {
    match chain {
        Chain::Ethereum | Chain::Arbitrum | Chain::Optimism | Chain::Polygon => MULTICALL,
        Chain::Base => address!("091e99cb1C49331a94dD62755D168E941AbD0693"),
        Chain::Celo => address!("633987602DE5C4F337e3DbF265303A1080324204"),
    }
}
