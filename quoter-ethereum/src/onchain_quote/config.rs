use std::{fs, path::Path};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::onchain_quote::errors::QuoteError;

/// How quotes are split into multicalls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchParams {
    /// Maximum number of quotes per multicall. Batches are evened out below this size.
    pub multicall_chunk: usize,
    /// Gas forwarded to every single quote inside the multicall.
    pub gas_limit_per_call: u64,
    /// Minimum share of successful quotes for a batch to be accepted as is.
    pub quote_min_success_rate: f64,
}

impl Default for BatchParams {
    fn default() -> Self {
        Self { multicall_chunk: 150, gas_limit_per_call: 1_000_000, quote_min_success_rate: 0.2 }
    }
}

/// Replacement chunk size and gas limit used once a failure kind shows up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureOverrides {
    pub multicall_chunk: usize,
    pub gas_limit_per_call: u64,
}

impl FailureOverrides {
    pub fn gas_error_default() -> Self {
        Self { multicall_chunk: 100, gas_limit_per_call: 1_500_000 }
    }

    pub fn success_rate_default() -> Self {
        Self { multicall_chunk: 110, gas_limit_per_call: 1_300_000 }
    }

    /// The overridden params. The success rate threshold is kept.
    pub fn apply(&self, params: &BatchParams) -> BatchParams {
        BatchParams {
            multicall_chunk: self.multicall_chunk,
            gas_limit_per_call: self.gas_limit_per_call,
            quote_min_success_rate: params.quote_min_success_rate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RollbackConfig {
    #[default]
    Disabled,
    /// After `attempts_before_rollback` rounds with header errors, move the target block by
    /// `rollback_block_offset` (usually negative). Happens at most once per run.
    Enabled { rollback_block_offset: i64, attempts_before_rollback: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockNumberConfig {
    /// Added to the latest block when no block is requested explicitly.
    pub base_block_offset: i64,
    pub rollback: RollbackConfig,
}

/// Engine configuration. Every field has a default, so an empty YAML document is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnChainQuoteConfig {
    /// Retries after the first attempt.
    pub retries: u32,
    pub min_retry_timeout_ms: u64,
    pub max_retry_timeout_ms: u64,
    pub batch_params: BatchParams,
    pub gas_error_failure_override: FailureOverrides,
    pub success_rate_failure_overrides: FailureOverrides,
    pub block_number_config: BlockNumberConfig,
    pub quoter_address_override: Option<Address>,
    pub multicall_address_override: Option<Address>,
}

impl Default for OnChainQuoteConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            min_retry_timeout_ms: 25,
            max_retry_timeout_ms: 250,
            batch_params: BatchParams::default(),
            gas_error_failure_override: FailureOverrides::gas_error_default(),
            success_rate_failure_overrides: FailureOverrides::success_rate_default(),
            block_number_config: BlockNumberConfig::default(),
            quoter_address_override: None,
            multicall_address_override: None,
        }
    }
}

impl OnChainQuoteConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, QuoteError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            QuoteError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, QuoteError> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| QuoteError::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    pub fn validate(&self) -> Result<(), QuoteError> {
        let params = &self.batch_params;
        if params.multicall_chunk == 0 {
            return Err(QuoteError::Config("multicall_chunk must be positive".to_string()));
        }
        if params.gas_limit_per_call == 0 {
            return Err(QuoteError::Config("gas_limit_per_call must be positive".to_string()));
        }
        if !(params.quote_min_success_rate > 0.0 && params.quote_min_success_rate <= 1.0) {
            return Err(QuoteError::Config(format!(
                "quote_min_success_rate must be in (0, 1], got {}",
                params.quote_min_success_rate
            )));
        }
        for (name, overrides) in [
            ("gas_error_failure_override", &self.gas_error_failure_override),
            ("success_rate_failure_overrides", &self.success_rate_failure_overrides),
        ] {
            if overrides.multicall_chunk == 0 || overrides.gas_limit_per_call == 0 {
                return Err(QuoteError::Config(format!("{name} values must be positive")));
            }
        }
        if let RollbackConfig::Enabled { attempts_before_rollback: 0, .. } =
            self.block_number_config.rollback
        {
            return Err(QuoteError::Config(
                "attempts_before_rollback must be positive".to_string(),
            ));
        }
        if self.min_retry_timeout_ms > self.max_retry_timeout_ms {
            return Err(QuoteError::Config(
                "min_retry_timeout_ms must not exceed max_retry_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per call options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderConfig {
    /// Quote at this block. The base block offset is not applied to it.
    pub block_number: Option<u64>,
}
