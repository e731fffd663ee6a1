use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::{
    models::{error::RouteError, Protocol},
    Address,
};

/// Largest V3 fee a quoter path can carry. Path fees are 3 bytes wide and the mixed route quoter
/// reads the top bit as the V2 flag.
pub const MAX_V3_FEE: u32 = (1 << 23) - 1;

/// A single liquidity pool a route swaps through.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Pool {
    /// Constant product pair. Quoted through the mixed route quoter only.
    V2 { address: Address, token0: Address, token1: Address },
    /// Concentrated liquidity pool with its fee tier in hundredths of a bip.
    V3 { address: Address, token0: Address, token1: Address, fee: u32 },
}

impl Pool {
    pub fn address(&self) -> Address {
        match self {
            Pool::V2 { address, .. } | Pool::V3 { address, .. } => *address,
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            Pool::V2 { .. } => Protocol::V2,
            Pool::V3 { .. } => Protocol::V3,
        }
    }

    pub fn fee(&self) -> Option<u32> {
        match self {
            Pool::V2 { .. } => None,
            Pool::V3 { fee, .. } => Some(*fee),
        }
    }

    fn tokens(&self) -> (Address, Address) {
        match self {
            Pool::V2 { token0, token1, .. } | Pool::V3 { token0, token1, .. } => {
                (*token0, *token1)
            }
        }
    }

    /// Returns the token received when swapping `token` through this pool, or `None` if the
    /// pool does not hold `token`.
    pub fn counterpart(&self, token: &Address) -> Option<Address> {
        let (token0, token1) = self.tokens();
        if *token == token0 {
            Some(token1)
        } else if *token == token1 {
            Some(token0)
        } else {
            None
        }
    }
}

/// An ordered path of pools connecting `input` to `output`.
///
/// Routes are validated on construction: they are non-empty, every pool shares a token with the
/// previous hop, the last hop ends on `output` and the pools match the route protocol (`Mixed`
/// routes may hold any pool kind).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRoute")]
pub struct Route {
    protocol: Protocol,
    pools: Vec<Pool>,
    input: Address,
    output: Address,
    #[serde(skip_serializing)]
    tokens: Vec<Address>,
}

#[derive(Deserialize)]
struct RawRoute {
    protocol: Protocol,
    pools: Vec<Pool>,
    input: Address,
    output: Address,
}

impl TryFrom<RawRoute> for Route {
    type Error = RouteError;

    fn try_from(raw: RawRoute) -> Result<Self, Self::Error> {
        Route::new(raw.protocol, raw.pools, raw.input, raw.output)
    }
}

impl Route {
    pub fn new(
        protocol: Protocol,
        pools: Vec<Pool>,
        input: Address,
        output: Address,
    ) -> Result<Self, RouteError> {
        if pools.is_empty() {
            return Err(RouteError::Empty { input, output });
        }

        if protocol != Protocol::Mixed {
            if let Some(pool) = pools
                .iter()
                .find(|pool| pool.protocol() != protocol)
            {
                return Err(RouteError::ProtocolMismatch {
                    protocol,
                    pool_protocol: pool.protocol(),
                    pool: pool.address(),
                });
            }
        }

        if let Some((pool, fee)) = pools
            .iter()
            .find_map(|pool| pool.fee().filter(|fee| *fee > MAX_V3_FEE).map(|fee| (pool, fee)))
        {
            return Err(RouteError::FeeOutOfRange { pool: pool.address(), fee });
        }

        let mut tokens = Vec::with_capacity(pools.len() + 1);
        tokens.push(input);
        let mut current = input;
        for pool in &pools {
            current = pool
                .counterpart(&current)
                .ok_or(RouteError::Disconnected { pool: pool.address(), token: current })?;
            tokens.push(current);
        }

        if current != output {
            return Err(RouteError::WrongOutput { expected: output, actual: current });
        }

        Ok(Self { protocol, pools, input, output, tokens })
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    pub fn input(&self) -> Address {
        self.input
    }

    pub fn output(&self) -> Address {
        self.output
    }

    /// Tokens visited by the route, `input` first and `output` last.
    pub fn token_path(&self) -> &[Address] {
        &self.tokens
    }

    pub fn requires_mixed_quoter(&self) -> bool {
        self.protocol.requires_mixed_quoter()
    }
}

fn short_address(address: &Address) -> String {
    let address_str = address.to_string();
    if address_str.len() >= 10 {
        format!("{}...{}", &address_str[0..6], &address_str[address_str.len() - 4..])
    } else {
        address_str
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.protocol, short_address(&self.input))?;
        for (pool, token) in self
            .pools
            .iter()
            .zip(self.tokens.iter().skip(1))
        {
            match pool.fee() {
                Some(fee) => write!(f, " -- {fee} --> {}", short_address(token))?,
                None => write!(f, " -- [{}] --> {}", pool.protocol(), short_address(token))?,
            }
        }
        Ok(())
    }
}
