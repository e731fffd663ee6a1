pub mod models;
pub mod traits;

pub use alloy_primitives::{Address, Bytes, U256};
