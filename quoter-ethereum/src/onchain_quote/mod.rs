//! Batched on-chain quoting.
//!
//! Quotes for every (route, amount) pair are encoded as quoter calls, split into batches and sent
//! through a multicall. Failed batches are classified and retried for a bounded number of rounds,
//! adapting batch size, gas limit per call and target block to the kind of failure seen. The
//! flat results are finally regrouped per route, in the order the routes and amounts were given.

pub mod assembler;
pub mod batch;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod retry_controller;

use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};
use futures03::future::join_all;
use metrics::{counter, histogram};
use quoter_common::{
    models::{
        quote::{CurrencyAmount, OnChainQuotes},
        route::Route,
        Chain, TradeType,
    },
    traits::{AggregateCall, AggregateResult, AggregatorProvider, BlockNumberProvider, CallResult},
};
use tracing::{debug, info, instrument};

use crate::{
    addresses::{mixed_route_quoter_address, quoter_v2_address},
    onchain_quote::{
        assembler::process_quote_results,
        batch::{normalized_chunk, partition, plan_batches, BatchResults, BatchState, QuoteBatch},
        classifier::{
            is_successful_call, provider_failure, validate_routes, validate_success_rate,
            FailureKind, QuoteFailure,
        },
        config::{OnChainQuoteConfig, ProviderConfig},
        errors::QuoteError,
        retry_controller::{RoundOutcome, RunState},
    },
    quoter::{encode_route_to_path, QuoteRequest},
};

/// Gets quotes for many routes and amounts with as few node requests as possible.
#[derive(Debug, Clone)]
pub struct OnChainQuoteProvider<A, B> {
    chain: Chain,
    aggregator: A,
    block_number_provider: B,
    config: OnChainQuoteConfig,
}

impl<A, B> OnChainQuoteProvider<A, B>
where
    A: AggregatorProvider,
    B: BlockNumberProvider,
{
    pub fn new(
        chain: Chain,
        aggregator: A,
        block_number_provider: B,
        config: OnChainQuoteConfig,
    ) -> Result<Self, QuoteError> {
        config.validate()?;
        Ok(Self { chain, aggregator, block_number_provider, config })
    }

    pub fn config(&self) -> &OnChainQuoteConfig {
        &self.config
    }

    pub async fn get_quotes_many_exact_in(
        &self,
        amount_ins: &[CurrencyAmount],
        routes: &[Route],
        provider_config: Option<ProviderConfig>,
    ) -> Result<OnChainQuotes, QuoteError> {
        self.get_quotes_many_data(amount_ins, routes, TradeType::ExactIn, provider_config)
            .await
    }

    pub async fn get_quotes_many_exact_out(
        &self,
        amount_outs: &[CurrencyAmount],
        routes: &[Route],
        provider_config: Option<ProviderConfig>,
    ) -> Result<OnChainQuotes, QuoteError> {
        self.get_quotes_many_data(amount_outs, routes, TradeType::ExactOut, provider_config)
            .await
    }

    fn quoter_address(&self, use_mixed_route_quoter: bool) -> Result<Address, QuoteError> {
        if let Some(address) = self.config.quoter_address_override {
            return Ok(address);
        }
        if use_mixed_route_quoter {
            mixed_route_quoter_address(self.chain).ok_or_else(|| {
                QuoteError::Config(format!(
                    "No address for the mixed route quoter contract on chain {}",
                    self.chain
                ))
            })
        } else {
            Ok(quoter_v2_address(self.chain))
        }
    }

    async fn target_block_number(
        &self,
        provider_config: Option<ProviderConfig>,
    ) -> Result<u64, QuoteError> {
        if let Some(block_number) = provider_config.and_then(|config| config.block_number) {
            return Ok(block_number);
        }
        let latest = self
            .block_number_provider
            .get_block_number()
            .await
            .map_err(|e| QuoteError::BlockNumber(e.to_string()))?;
        let offset = self
            .config
            .block_number_config
            .base_block_offset;
        debug!(latest, offset, "Seeding target block");
        Ok(latest.saturating_add_signed(offset))
    }

    fn retry_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.min_retry_timeout_ms))
            .with_max_interval(Duration::from_millis(self.config.max_retry_timeout_ms))
            .with_max_elapsed_time(None)
            .build()
    }

    #[instrument(
        skip_all,
        fields(
            chain = %self.chain,
            function = trade_type.function_name(),
            routes = routes.len(),
            amounts = amounts.len()
        )
    )]
    async fn get_quotes_many_data(
        &self,
        amounts: &[CurrencyAmount],
        routes: &[Route],
        trade_type: TradeType,
        provider_config: Option<ProviderConfig>,
    ) -> Result<OnChainQuotes, QuoteError> {
        let use_mixed_route_quoter = validate_routes(routes, trade_type)?;
        let quoter = self.quoter_address(use_mixed_route_quoter)?;
        let block_number = self
            .target_block_number(provider_config)
            .await?;

        let calldata: Vec<Bytes> = routes
            .iter()
            .flat_map(|route| {
                let path = encode_route_to_path(route, trade_type);
                amounts.iter().map(move |amount| {
                    QuoteRequest { path: path.clone(), amount: amount.amount }.calldata(trade_type)
                })
            })
            .collect();

        if calldata.is_empty() {
            debug!(block_number, "Nothing to quote");
            return Ok(OnChainQuotes {
                routes_with_quotes: process_quote_results(&[], routes, amounts),
                block_number,
            });
        }

        let mut state = RunState::new(self.config.batch_params, block_number);
        let mut batches = plan_batches(calldata.len(), state.params.multicall_chunk);
        state.expected_calls = batches.len();

        info!(
            quotes = calldata.len(),
            chunk = normalized_chunk(calldata.len(), state.params.multicall_chunk),
            chunk_sizes = ?batches.iter().map(QuoteBatch::len).collect::<Vec<_>>(),
            gas_limit_per_call = state.params.gas_limit_per_call,
            block_number,
            quoter = %quoter,
            "About to get quotes"
        );
        histogram!("quote_batch_size", "chain" => self.chain.to_string())
            .record(calldata.len() as f64);

        let mut backoff = self.retry_backoff();
        loop {
            state.attempt += 1;
            let (success, failed, pending) = partition(&batches);
            info!(
                attempt = state.attempt,
                success,
                failed,
                pending,
                gas_limit_per_call = state.params.gas_limit_per_call,
                block_number = state.block_number,
                "Starting attempt"
            );

            self.dispatch_round(&mut batches, &calldata, quoter, &mut state)
                .await;

            match state.evaluate(&batches, &self.config, self.chain)? {
                RoundOutcome::Complete => break,
                RoundOutcome::Degrade => {
                    let quotes = OnChainQuotes {
                        routes_with_quotes: process_quote_results(&[], routes, amounts),
                        block_number: 0,
                    };
                    self.report(&state, &quotes, 0);
                    return Ok(quotes);
                }
                RoundOutcome::Retry { retry_all } => {
                    if retry_all {
                        info!(
                            attempt = state.attempt,
                            "Resetting all requests to pending for next attempt"
                        );
                        batches = plan_batches(calldata.len(), state.params.multicall_chunk);
                    }
                    if let Some(wait) = backoff.next_backoff() {
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        let mut results: Vec<CallResult> = Vec::with_capacity(calldata.len());
        let mut result_block_number = state.block_number;
        let mut approx_gas_used_per_success_call = 0;
        for (idx, batch) in batches.into_iter().enumerate() {
            if let BatchState::Success(batch_results) = batch.state {
                if idx == 0 {
                    result_block_number = batch_results.block_number;
                }
                approx_gas_used_per_success_call = approx_gas_used_per_success_call
                    .max(batch_results.approx_gas_used_per_success_call);
                results.extend(batch_results.results);
            }
        }

        let quotes = OnChainQuotes {
            routes_with_quotes: process_quote_results(&results, routes, amounts),
            block_number: result_block_number,
        };
        self.report(&state, &quotes, approx_gas_used_per_success_call);
        Ok(quotes)
    }

    /// Sends every batch that has not succeeded yet, concurrently, and waits for all of them.
    async fn dispatch_round(
        &self,
        batches: &mut [QuoteBatch],
        calldata: &[Bytes],
        quoter: Address,
        state: &mut RunState,
    ) {
        let batch_count = batches.len();
        let block_number = state.block_number;
        let gas_limit = state.params.gas_limit_per_call;
        let min_success_rate = state.params.quote_min_success_rate;
        let accept_low_rate = state.accepts_low_success_rate();
        let aggregator = &self.aggregator;

        let dispatches: Vec<_> = batches
            .iter_mut()
            .enumerate()
            .filter(|(_, batch)| !batch.is_success())
            .map(move |(idx, batch)| async move {
                let calls = calldata[batch.inputs.clone()]
                    .iter()
                    .map(|call_data| AggregateCall {
                        target: quoter,
                        gas_limit,
                        call_data: call_data.clone(),
                    })
                    .collect();

                batch.state = match aggregator
                    .aggregate(calls, block_number)
                    .await
                {
                    Ok(result) => {
                        settle_batch(result, batch.len(), min_success_rate, accept_low_rate)
                    }
                    Err(err) => BatchState::Failed(provider_failure(
                        &err.to_string(),
                        idx,
                        batch_count,
                        batch.len(),
                    )),
                };
            })
            .collect();

        state.total_calls += dispatches.len();
        join_all(dispatches).await;
    }

    fn report(
        &self,
        state: &RunState,
        quotes: &OnChainQuotes,
        approx_gas_used_per_success_call: u64,
    ) {
        let successful = quotes.successful_quotes();
        let failed = quotes
            .routes_with_quotes
            .iter()
            .map(|route| route.quotes.len())
            .sum::<usize>() -
            successful;

        histogram!("quote_approx_gas_used_per_success_call")
            .record(approx_gas_used_per_success_call as f64);
        histogram!("quote_num_retry_loops").record(state.retry_loops() as f64);
        counter!("quote_total_calls_to_provider").increment(state.total_calls as u64);
        counter!("quote_expected_calls_to_provider").increment(state.expected_calls as u64);
        counter!("quote_num_retried_calls")
            .increment(state.total_calls.saturating_sub(state.expected_calls) as u64);

        info!(
            successful,
            failed,
            retry_loops = state.retry_loops(),
            total_calls = state.total_calls,
            saw_timeout = state.saw_timeout(),
            block_number = quotes.block_number,
            "Got on chain quotes"
        );
    }
}

fn settle_batch(
    result: AggregateResult,
    expected_results: usize,
    min_success_rate: f64,
    accept_low_rate: bool,
) -> BatchState {
    if result.results.len() != expected_results {
        return BatchState::Failed(QuoteFailure::new(
            FailureKind::UnknownProvider,
            format!(
                "Unknown error from provider: got {} results for {expected_results} calls",
                result.results.len()
            ),
        ));
    }
    if let Some(failure) = validate_success_rate(&result.results, min_success_rate, accept_low_rate)
    {
        return BatchState::Failed(failure);
    }

    let approx_gas_used_per_success_call = result
        .results
        .iter()
        .filter(|call| is_successful_call(call))
        .map(|call| call.gas_used)
        .max()
        .unwrap_or_default();

    BatchState::Success(BatchResults {
        block_number: result.block_number,
        results: result.results,
        approx_gas_used_per_success_call,
    })
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use pretty_assertions::assert_eq;
    use quoter_common::{
        models::{route::Pool, Protocol},
        traits::{MockAggregatorProvider, MockBlockNumberProvider},
    };

    use super::*;
    use crate::test_fixtures::{quoted, ScriptedAggregator};

    fn token(n: u8) -> Address {
        Address::with_last_byte(n)
    }

    /// Single pool V3 route from token 1 to `token(tag)`.
    fn v3_route(tag: u8) -> Route {
        Route::new(
            Protocol::V3,
            vec![Pool::V3 {
                address: Address::repeat_byte(tag),
                token0: token(1),
                token1: token(tag),
                fee: 500,
            }],
            token(1),
            token(tag),
        )
        .unwrap()
    }

    fn v2_route(tag: u8) -> Route {
        Route::new(
            Protocol::V2,
            vec![Pool::V2 {
                address: Address::repeat_byte(tag),
                token0: token(1),
                token1: token(tag),
            }],
            token(1),
            token(tag),
        )
        .unwrap()
    }

    fn amounts(n: u64) -> Vec<CurrencyAmount> {
        (1..=n)
            .map(|i| CurrencyAmount::new(token(1), U256::from(i)))
            .collect()
    }

    fn test_config() -> OnChainQuoteConfig {
        OnChainQuoteConfig {
            min_retry_timeout_ms: 1,
            max_retry_timeout_ms: 2,
            ..Default::default()
        }
    }

    fn block_provider(block_number: u64) -> MockBlockNumberProvider {
        let mut provider = MockBlockNumberProvider::new();
        provider
            .expect_get_block_number()
            .returning(move || Ok(block_number));
        provider
    }

    fn engine<A: AggregatorProvider>(
        chain: Chain,
        aggregator: A,
        config: OnChainQuoteConfig,
    ) -> OnChainQuoteProvider<A, MockBlockNumberProvider> {
        OnChainQuoteProvider::new(chain, aggregator, block_provider(100), config).unwrap()
    }

    fn always_quoting() -> ScriptedAggregator<
        impl Fn(usize, &[AggregateCall], u64) -> Result<AggregateResult, String> + Send + Sync,
    > {
        ScriptedAggregator::new(|_, calls, block_number| Ok(quoted(calls, block_number)))
    }

    /// Quote value the scripted aggregator answers for `amount` on `v3_route(tag)`.
    fn expected_quote(amount: u64, tag: u8) -> U256 {
        U256::from(amount * 1000 + tag as u64)
    }

    fn assert_all_quoted(quotes: &OnChainQuotes, tags: &[u8], amount_count: u64) {
        assert_eq!(quotes.routes_with_quotes.len(), tags.len());
        for (route_quotes, tag) in quotes.routes_with_quotes.iter().zip(tags) {
            assert_eq!(route_quotes.route, v3_route(*tag));
            assert_eq!(route_quotes.quotes.len() as u64, amount_count);
            for (amount_idx, quote) in route_quotes.quotes.iter().enumerate() {
                let amount = amount_idx as u64 + 1;
                assert_eq!(quote.amount.amount, U256::from(amount));
                assert_eq!(quote.quote.as_ref().unwrap().quote, expected_quote(amount, *tag));
            }
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_all_calls_succeed_in_one_round() {
        let aggregator = always_quoting();
        let engine = engine(Chain::Ethereum, aggregator, test_config());
        let routes = vec![v3_route(2), v3_route(3), v3_route(4)];

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(4), &routes, None)
            .await
            .unwrap();

        assert_all_quoted(&quotes, &[2, 3, 4], 4);
        assert_eq!(quotes.block_number, 100);
        assert_eq!(engine.aggregator.call_count(), 1);
        assert_eq!(engine.aggregator.recorded()[0].calls, 12);
    }

    #[tokio::test]
    async fn test_order_is_kept_across_batches() {
        let config = OnChainQuoteConfig {
            batch_params: config::BatchParams { multicall_chunk: 5, ..Default::default() },
            ..test_config()
        };
        let aggregator = always_quoting();
        let engine = engine(Chain::Ethereum, aggregator, config);
        let routes = vec![v3_route(2), v3_route(3), v3_route(4), v3_route(5)];

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(3), &routes, None)
            .await
            .unwrap();

        assert_all_quoted(&quotes, &[2, 3, 4, 5], 3);
        let sizes: Vec<usize> = engine
            .aggregator
            .recorded()
            .iter()
            .map(|call| call.calls)
            .collect();
        assert_eq!(sizes, vec![4, 4, 4]);
    }

    #[tokio::test]
    async fn test_repeated_runs_are_identical() {
        let aggregator = always_quoting();
        let engine = engine(Chain::Ethereum, aggregator, test_config());
        let routes = vec![v3_route(2), v3_route(3)];

        let first = engine
            .get_quotes_many_exact_in(&amounts(3), &routes, None)
            .await
            .unwrap();
        let second = engine
            .get_quotes_many_exact_in(&amounts(3), &routes, None)
            .await
            .unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_single_failed_call_only_voids_its_slot() {
        let aggregator = ScriptedAggregator::new(|_, calls, block_number| {
            let mut result = quoted(calls, block_number);
            // route 1, amount 2
            result.results[5] =
                CallResult { success: false, gas_used: 0, return_data: Bytes::new() };
            Ok(result)
        });
        let engine = engine(Chain::Ethereum, aggregator, test_config());
        let routes = vec![v3_route(2), v3_route(3), v3_route(4)];

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(4), &routes, None)
            .await
            .unwrap();

        assert_eq!(quotes.successful_quotes(), 11);
        let failed = &quotes.routes_with_quotes[1].quotes[1];
        assert_eq!(failed.quote, None);
        assert_eq!(failed.amount.amount, U256::from(2));
        assert!(quotes.routes_with_quotes[1].quotes[2].quote.is_some());
    }

    #[test_log::test(tokio::test)]
    async fn test_gas_error_switches_to_override() {
        // 250 quotes: two batches of 125 with the default chunk of 150, three batches with the
        // override chunk of 100
        let aggregator = ScriptedAggregator::new(|call_idx, calls, block_number| {
            if call_idx < 2 {
                Err("execution reverted: out of gas".to_string())
            } else {
                Ok(quoted(calls, block_number))
            }
        });
        let engine = engine(Chain::Ethereum, aggregator, test_config());
        let tags = [2, 3, 4, 5, 6];
        let routes: Vec<Route> = tags.iter().copied().map(v3_route).collect();

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(50), &routes, None)
            .await
            .unwrap();

        assert_all_quoted(&quotes, &tags, 50);
        let recorded = engine.aggregator.recorded();
        assert_eq!(recorded.len(), 5);
        assert!(recorded[..2]
            .iter()
            .all(|call| call.calls == 125 && call.gas_limit == 1_000_000));
        let mut retried_sizes: Vec<usize> = recorded[2..]
            .iter()
            .map(|call| call.calls)
            .collect();
        retried_sizes.sort_unstable();
        assert_eq!(retried_sizes, vec![82, 84, 84]);
        assert!(recorded[2..]
            .iter()
            .all(|call| call.gas_limit == 1_500_000));
    }

    #[tokio::test]
    async fn test_block_conflict_retries_all_at_one_block() {
        let config = OnChainQuoteConfig {
            batch_params: config::BatchParams { multicall_chunk: 6, ..Default::default() },
            ..test_config()
        };
        let aggregator = ScriptedAggregator::new(|call_idx, calls, block_number| {
            // the first round answers from two different blocks
            let answered_at = if call_idx == 1 { block_number + 1 } else { block_number };
            Ok(quoted(calls, answered_at))
        });
        let engine = engine(Chain::Ethereum, aggregator, config);
        let routes = vec![v3_route(2), v3_route(3), v3_route(4)];

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(4), &routes, None)
            .await
            .unwrap();

        assert_all_quoted(&quotes, &[2, 3, 4], 4);
        assert_eq!(quotes.block_number, 100);
        let recorded = engine.aggregator.recorded();
        assert_eq!(recorded.len(), 4);
        assert!(recorded[2..]
            .iter()
            .all(|call| call.block_number == 100));
    }

    #[tokio::test]
    async fn test_exact_out_with_mixed_routes_is_rejected_before_dispatch() {
        let mut aggregator = MockAggregatorProvider::new();
        aggregator.expect_aggregate().times(0);
        let mut block_provider = MockBlockNumberProvider::new();
        block_provider
            .expect_get_block_number()
            .times(0);
        let engine =
            OnChainQuoteProvider::new(Chain::Ethereum, aggregator, block_provider, test_config())
                .unwrap();

        let err = engine
            .get_quotes_many_exact_out(&amounts(2), &[v2_route(2)], None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            QuoteError::Validation(
                "Cannot call quoteExactOutput with V2 or Mixed routes".to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_mixed_with_v3_routes_is_rejected() {
        let mut aggregator = MockAggregatorProvider::new();
        aggregator.expect_aggregate().times(0);
        let engine = engine(Chain::Ethereum, aggregator, test_config());

        let err = engine
            .get_quotes_many_exact_in(&amounts(2), &[v3_route(2), v2_route(3)], None)
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::Validation(_)));
    }

    #[test_log::test(tokio::test)]
    async fn test_gas_errors_on_split_gas_chain_degrade_to_no_quotes() {
        let aggregator = ScriptedAggregator::new(|_, _, _| {
            Err("gas required exceeds allowance: out of gas".to_string())
        });
        let engine = engine(Chain::Arbitrum, aggregator, test_config());
        let routes = vec![v3_route(2), v3_route(3)];

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(3), &routes, None)
            .await
            .unwrap();

        assert_eq!(quotes.block_number, 0);
        assert_eq!(quotes.successful_quotes(), 0);
        assert_eq!(quotes.routes_with_quotes.len(), 2);
        assert_eq!(engine.aggregator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_gas_errors_on_mainnet_fail() {
        let aggregator = ScriptedAggregator::new(|_, _, _| Err("out of gas".to_string()));
        let engine = engine(Chain::Ethereum, aggregator, test_config());

        let err = engine
            .get_quotes_many_exact_in(&amounts(3), &[v3_route(2)], None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            QuoteError::QuotesFailed { failed: 1, reasons: vec![FailureKind::ProviderGas] }
        );
        assert_eq!(engine.aggregator.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_errors_exhaust_attempts() {
        let aggregator = ScriptedAggregator::new(|_, _, _| Err("connection reset".to_string()));
        let config = OnChainQuoteConfig { retries: 1, ..test_config() };
        let engine = engine(Chain::Ethereum, aggregator, config);

        let err = engine
            .get_quotes_many_exact_in(&amounts(3), &[v3_route(2)], None)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            QuoteError::QuotesFailed { failed: 1, reasons: vec![FailureKind::UnknownProvider] }
        );
        assert_eq!(engine.aggregator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_only_failed_batches_are_resent() {
        let config = OnChainQuoteConfig {
            batch_params: config::BatchParams { multicall_chunk: 4, ..Default::default() },
            ..test_config()
        };
        let aggregator = ScriptedAggregator::new(|call_idx, calls, block_number| {
            if call_idx == 1 {
                Err("request timeout".to_string())
            } else {
                Ok(quoted(calls, block_number))
            }
        });
        let engine = engine(Chain::Ethereum, aggregator, config);
        let routes = vec![v3_route(2), v3_route(3), v3_route(4)];

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(4), &routes, None)
            .await
            .unwrap();

        assert_all_quoted(&quotes, &[2, 3, 4], 4);
        // 3 batches in the first round, then only the timed out one
        assert_eq!(engine.aggregator.call_count(), 4);
    }

    #[tokio::test]
    async fn test_low_success_rate_is_accepted_on_second_occurrence() {
        let aggregator = ScriptedAggregator::new(|_, calls, block_number| {
            let mut result = quoted(calls, block_number);
            for call in result.results.iter_mut() {
                call.success = false;
            }
            Ok(result)
        });
        let engine = engine(Chain::Ethereum, aggregator, test_config());

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(3), &[v3_route(2)], None)
            .await
            .unwrap();

        assert_eq!(quotes.successful_quotes(), 0);
        assert_eq!(quotes.routes_with_quotes[0].quotes.len(), 3);
        let recorded = engine.aggregator.recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].gas_limit, 1_300_000);
    }

    #[tokio::test]
    async fn test_block_header_errors_roll_back_explicit_block() {
        let mut config = test_config();
        config.block_number_config.rollback = config::RollbackConfig::Enabled {
            rollback_block_offset: -5,
            attempts_before_rollback: 1,
        };
        let aggregator = ScriptedAggregator::new(|_, calls, block_number| {
            if block_number == 500 {
                Err("header not found".to_string())
            } else {
                Ok(quoted(calls, block_number))
            }
        });
        let mut block_provider = MockBlockNumberProvider::new();
        block_provider
            .expect_get_block_number()
            .times(0);
        let engine =
            OnChainQuoteProvider::new(Chain::Ethereum, aggregator, block_provider, config).unwrap();

        let quotes = engine
            .get_quotes_many_exact_in(
                &amounts(2),
                &[v3_route(2)],
                Some(ProviderConfig { block_number: Some(500) }),
            )
            .await
            .unwrap();

        assert_eq!(quotes.block_number, 495);
        assert_eq!(quotes.successful_quotes(), 2);
    }

    #[tokio::test]
    async fn test_base_block_offset_applied_to_latest_block() {
        let mut config = test_config();
        config.block_number_config.base_block_offset = -2;
        let aggregator = always_quoting();
        let engine = engine(Chain::Ethereum, aggregator, config);

        let quotes = engine
            .get_quotes_many_exact_in(&amounts(1), &[v3_route(2)], None)
            .await
            .unwrap();

        assert_eq!(quotes.block_number, 98);
        assert_eq!(engine.aggregator.recorded()[0].block_number, 98);
    }

    #[tokio::test]
    async fn test_exact_out_quotes_v3_routes() {
        let aggregator = always_quoting();
        let engine = engine(Chain::Ethereum, aggregator, test_config());

        let quotes = engine
            .get_quotes_many_exact_out(&amounts(2), &[v3_route(7)], None)
            .await
            .unwrap();

        // exact out paths start at the output token
        let values: Vec<U256> = quotes.routes_with_quotes[0]
            .quotes
            .iter()
            .map(|q| q.quote.as_ref().unwrap().quote)
            .collect();
        assert_eq!(values, vec![U256::from(1001), U256::from(2001)]);
    }

    #[tokio::test]
    async fn test_empty_amounts_skip_dispatch() {
        let mut aggregator = MockAggregatorProvider::new();
        aggregator.expect_aggregate().times(0);
        let engine = engine(Chain::Ethereum, aggregator, test_config());

        let quotes = engine
            .get_quotes_many_exact_in(&[], &[v3_route(2), v3_route(3)], None)
            .await
            .unwrap();

        assert_eq!(quotes.block_number, 100);
        assert_eq!(quotes.routes_with_quotes.len(), 2);
        assert!(quotes.routes_with_quotes.iter().all(|route| route.quotes.is_empty()));
    }

    #[tokio::test]
    async fn test_missing_mixed_quoter_is_config_error() {
        let mut aggregator = MockAggregatorProvider::new();
        aggregator.expect_aggregate().times(0);
        let engine = engine(Chain::Base, aggregator, test_config());

        let err = engine
            .get_quotes_many_exact_in(&amounts(1), &[v2_route(2)], None)
            .await
            .unwrap_err();

        assert!(matches!(err, QuoteError::Config(_)));
    }

    #[tokio::test]
    async fn test_quoter_override_is_used() {
        let quoter = Address::repeat_byte(0x42);
        let config = OnChainQuoteConfig { quoter_address_override: Some(quoter), ..test_config() };
        let aggregator = always_quoting();
        let engine = engine(Chain::Base, aggregator, config);

        engine
            .get_quotes_many_exact_in(&amounts(1), &[v2_route(2)], None)
            .await
            .unwrap();

        assert_eq!(engine.aggregator.recorded()[0].target, quoter);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = OnChainQuoteConfig {
            batch_params: config::BatchParams { multicall_chunk: 0, ..Default::default() },
            ..Default::default()
        };

        let result = OnChainQuoteProvider::new(
            Chain::Ethereum,
            MockAggregatorProvider::new(),
            MockBlockNumberProvider::new(),
            config,
        );

        assert!(matches!(result, Err(QuoteError::Config(_))));
    }

    #[test]
    fn test_settle_batch_rejects_result_count_mismatch() {
        let state = settle_batch(
            AggregateResult { block_number: 1, results: vec![CallResult::default()] },
            2,
            0.2,
            false,
        );

        assert!(matches!(
            state,
            BatchState::Failed(QuoteFailure { kind: FailureKind::UnknownProvider, .. })
        ));
    }
}
