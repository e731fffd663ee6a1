use std::collections::BTreeMap;

use quoter_common::{
    models::{
        quote::{AmountQuote, CurrencyAmount, RouteWithQuotes},
        route::Route,
    },
    traits::CallResult,
};
use tracing::{debug, enabled, Level};

use crate::{onchain_quote::classifier::is_successful_call, quoter::decode_quote};

/// Failed quotes are logged in groups of this size.
const DEBUG_CHUNK: usize = 80;

/// Regroups the flat, request ordered call results into one quote list per route.
///
/// Result `i * amounts.len() + j` belongs to `routes[i]` and `amounts[j]`. Missing, failed or
/// undecodable results become `quote: None`, so every route gets exactly one entry per amount.
pub fn process_quote_results(
    results: &[CallResult],
    routes: &[Route],
    amounts: &[CurrencyAmount],
) -> Vec<RouteWithQuotes> {
    let mut failed_quotes = Vec::new();

    let routes_with_quotes = routes
        .iter()
        .enumerate()
        .map(|(route_idx, route)| {
            let quotes = amounts
                .iter()
                .enumerate()
                .map(|(amount_idx, amount)| {
                    let quote = results
                        .get(route_idx * amounts.len() + amount_idx)
                        .filter(|result| is_successful_call(result))
                        .and_then(|result| match decode_quote(&result.return_data) {
                            Ok(quote) => Some(quote),
                            Err(error) => {
                                debug!(%error, %route, "Undecodable quote");
                                None
                            }
                        });
                    match quote {
                        Some(quote) => AmountQuote { amount: amount.clone(), quote: Some(quote) },
                        None => {
                            let percent = 100.0 / amounts.len() as f64 * (amount_idx + 1) as f64;
                            failed_quotes.push((route_idx, percent, amount.amount));
                            AmountQuote::failed(amount.clone())
                        }
                    }
                })
                .collect();
            RouteWithQuotes { route: route.clone(), quotes }
        })
        .collect();

    if enabled!(Level::DEBUG) {
        log_failed_quotes(&failed_quotes, routes);
    }

    routes_with_quotes
}

fn log_failed_quotes<A: std::fmt::Display>(failed_quotes: &[(usize, f64, A)], routes: &[Route]) {
    let parts = failed_quotes.len().div_ceil(DEBUG_CHUNK);
    for (part, chunk) in failed_quotes
        .chunks(DEBUG_CHUNK)
        .enumerate()
    {
        let mut by_route: BTreeMap<usize, Vec<String>> = BTreeMap::new();
        for (route_idx, percent, amount) in chunk {
            by_route
                .entry(*route_idx)
                .or_default()
                .push(format!("{percent}%[{amount}]"));
        }
        let failed: Vec<String> = by_route
            .into_iter()
            .map(|(route_idx, amounts)| format!("{} : {}", routes[route_idx], amounts.join(",")))
            .collect();
        debug!(failed_quotes = ?failed, "Failed on chain quotes for routes Part {part}/{parts}");
    }
}
