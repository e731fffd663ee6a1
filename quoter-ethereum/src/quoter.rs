//! Quoter ABI surface: path encoding, calldata and return decoding.
//!
//! QuoterV2 and MixedRouteQuoterV1 expose the same `quoteExactInput(bytes,uint256)` /
//! `quoteExactOutput(bytes,uint256)` selectors and the same return layout, so one interface
//! covers both.

use alloy::{
    core::sol,
    primitives::{Bytes, U256},
    sol_types::{
        sol_data::{Array, Uint},
        SolCall, SolType,
    },
};
use quoter_common::models::{
    quote::QuoteData,
    route::Route,
    Protocol, TradeType,
};

sol! {
    interface IQuoter {
        function quoteExactInput(bytes memory path, uint256 amountIn)
            external
            returns (
                uint256 amountOut,
                uint160[] memory sqrtPriceX96AfterList,
                uint32[] memory initializedTicksCrossedList,
                uint256 gasEstimate
            );

        function quoteExactOutput(bytes memory path, uint256 amountOut)
            external
            returns (
                uint256 amountIn,
                uint160[] memory sqrtPriceX96AfterList,
                uint32[] memory initializedTicksCrossedList,
                uint256 gasEstimate
            );
    }
}

/// Fee slot value the mixed route quoter reads as "this hop is a V2 pair".
pub const V2_FEE_PATH_PLACEHOLDER: u32 = 1 << 23;

type QuoteReturn = (Uint<256>, Array<Uint<160>>, Array<Uint<32>>, Uint<256>);

/// Encodes a route into the packed `token | fee | token | ...` path the quoters expect.
///
/// V3 exact output paths are reversed (output token first). Mixed route paths are never
/// reversed since the mixed quoter only supports exact input.
pub fn encode_route_to_path(route: &Route, trade_type: TradeType) -> Bytes {
    let tokens = route.token_path();
    let mut hops: Vec<(u32, usize)> = route
        .pools()
        .iter()
        .enumerate()
        .map(|(idx, pool)| (pool.fee().unwrap_or(V2_FEE_PATH_PLACEHOLDER), idx))
        .collect();

    let reverse = trade_type == TradeType::ExactOut && route.protocol() == Protocol::V3;
    let mut path = Vec::with_capacity(20 + hops.len() * 23);
    if reverse {
        hops.reverse();
        path.extend_from_slice(tokens[tokens.len() - 1].as_slice());
        for (fee, idx) in hops {
            path.extend_from_slice(&fee.to_be_bytes()[1..]);
            path.extend_from_slice(tokens[idx].as_slice());
        }
    } else {
        path.extend_from_slice(tokens[0].as_slice());
        for (fee, idx) in hops {
            path.extend_from_slice(&fee.to_be_bytes()[1..]);
            path.extend_from_slice(tokens[idx + 1].as_slice());
        }
    }
    path.into()
}

/// One quoter call: an encoded route path and an amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub path: Bytes,
    pub amount: U256,
}

impl QuoteRequest {
    pub fn new(route: &Route, amount: U256, trade_type: TradeType) -> Self {
        Self { path: encode_route_to_path(route, trade_type), amount }
    }

    pub fn encoded_amount_hex(&self) -> String {
        format!("{:#x}", self.amount)
    }

    pub fn calldata(&self, trade_type: TradeType) -> Bytes {
        match trade_type {
            TradeType::ExactIn => {
                IQuoter::quoteExactInputCall { path: self.path.clone(), amountIn: self.amount }
                    .abi_encode()
            }
            TradeType::ExactOut => {
                IQuoter::quoteExactOutputCall { path: self.path.clone(), amountOut: self.amount }
                    .abi_encode()
            }
        }
        .into()
    }
}

/// Decodes a quoter return payload. Both trade directions share the layout.
pub fn decode_quote(data: &[u8]) -> Result<QuoteData, alloy::sol_types::Error> {
    let (quote, sqrt_price_x96_after_list, initialized_ticks_crossed_list, gas_estimate) =
        QuoteReturn::abi_decode_params(data)?;

    Ok(QuoteData {
        quote,
        sqrt_price_x96_after_list,
        initialized_ticks_crossed_list,
        gas_estimate,
    })
}

#[cfg(test)]
pub(crate) fn encode_quote_return(quote: U256, ticks_crossed: u32, gas_estimate: U256) -> Bytes {
    use alloy::primitives::aliases::U160;

    QuoteReturn::abi_encode_params(&(
        quote,
        vec![U160::from(1u64) << 96],
        vec![ticks_crossed],
        gas_estimate,
    ))
    .into()
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{hex, Address};
    use pretty_assertions::assert_eq;
    use quoter_common::models::route::{Pool, MAX_V3_FEE};
    use rstest::rstest;

    use super::*;

    fn token(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    fn v3_route() -> Route {
        Route::new(
            Protocol::V3,
            vec![
                Pool::V3 {
                    address: Address::repeat_byte(0xaa),
                    token0: token(1),
                    token1: token(2),
                    fee: 500,
                },
                Pool::V3 {
                    address: Address::repeat_byte(0xbb),
                    token0: token(3),
                    token1: token(2),
                    fee: 3000,
                },
            ],
            token(1),
            token(3),
        )
        .unwrap()
    }

    fn mixed_route() -> Route {
        Route::new(
            Protocol::Mixed,
            vec![
                Pool::V2 {
                    address: Address::repeat_byte(0xaa),
                    token0: token(1),
                    token1: token(2),
                },
                Pool::V3 {
                    address: Address::repeat_byte(0xbb),
                    token0: token(2),
                    token1: token(3),
                    fee: 100,
                },
            ],
            token(1),
            token(3),
        )
        .unwrap()
    }

    #[test]
    fn test_v3_exact_in_path() {
        let path = encode_route_to_path(&v3_route(), TradeType::ExactIn);

        let mut expected = Vec::new();
        expected.extend_from_slice(token(1).as_slice());
        expected.extend_from_slice(&hex!("0001f4"));
        expected.extend_from_slice(token(2).as_slice());
        expected.extend_from_slice(&hex!("000bb8"));
        expected.extend_from_slice(token(3).as_slice());
        assert_eq!(path.to_vec(), expected);
    }

    #[test]
    fn test_v3_exact_out_path_is_reversed() {
        let path = encode_route_to_path(&v3_route(), TradeType::ExactOut);

        let mut expected = Vec::new();
        expected.extend_from_slice(token(3).as_slice());
        expected.extend_from_slice(&hex!("000bb8"));
        expected.extend_from_slice(token(2).as_slice());
        expected.extend_from_slice(&hex!("0001f4"));
        expected.extend_from_slice(token(1).as_slice());
        assert_eq!(path.to_vec(), expected);
    }

    #[test]
    fn test_mixed_path_uses_v2_placeholder() {
        let path = encode_route_to_path(&mixed_route(), TradeType::ExactIn);

        assert_eq!(path.len(), 66);
        assert_eq!(&path[20..23], &hex!("800000"));
        assert_eq!(&path[43..46], &hex!("000064"));
    }

    #[test]
    fn test_largest_fee_fills_path_field() {
        let route = Route::new(
            Protocol::V3,
            vec![Pool::V3 {
                address: Address::repeat_byte(0xaa),
                token0: token(1),
                token1: token(2),
                fee: MAX_V3_FEE,
            }],
            token(1),
            token(2),
        )
        .unwrap();

        let path = encode_route_to_path(&route, TradeType::ExactIn);

        assert_eq!(&path[20..23], &hex!("7fffff"));
    }

    #[rstest]
    #[case(TradeType::ExactIn, IQuoter::quoteExactInputCall::SELECTOR)]
    #[case(TradeType::ExactOut, IQuoter::quoteExactOutputCall::SELECTOR)]
    fn test_calldata_selector(#[case] trade_type: TradeType, #[case] selector: [u8; 4]) {
        let request = QuoteRequest::new(&v3_route(), U256::from(1000), trade_type);
        let calldata = request.calldata(trade_type);

        assert_eq!(&calldata[..4], &selector);
    }

    #[test]
    fn test_encoded_amount_hex() {
        let request = QuoteRequest::new(&v3_route(), U256::from(1_000_000), TradeType::ExactIn);
        assert_eq!(request.encoded_amount_hex(), "0xf4240");
    }

    #[test]
    fn test_decode_quote() {
        let data = encode_quote_return(U256::from(42), 3, U256::from(90_000));

        let decoded = decode_quote(&data).unwrap();

        assert_eq!(decoded.quote, U256::from(42));
        assert_eq!(decoded.initialized_ticks_crossed_list, vec![3]);
        assert_eq!(decoded.gas_estimate, U256::from(90_000));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode_quote(&hex!("deadbeef")).is_err());
    }
}
