use std::fs;

use anyhow::Context;
use clap::Parser;
use quoter_common::models::{quote::CurrencyAmount, route::Route, TradeType};
use quoter_ethereum::{
    addresses::multicall_address, multicall::UniswapMulticallProvider, EthereumRpcClient,
    OnChainQuoteConfig, OnChainQuoteProvider, ProviderConfig,
};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, GlobalArgs, QuoteArgs};

mod cli;

/// Contents of a quote request file.
#[derive(Debug, Deserialize)]
struct QuoteRequestFile {
    trade_type: TradeType,
    amounts: Vec<CurrencyAmount>,
    routes: Vec<Route>,
}

fn main() -> Result<(), anyhow::Error> {
    create_tracing_subscriber();

    let cli: Cli = Cli::parse();
    let global_args = cli.args();
    match cli.command() {
        Command::Quote(quote_args) => run_quote(global_args, quote_args)?,
    };
    Ok(())
}

fn create_tracing_subscriber() {
    let format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_target(false)
        .compact();
    tracing_subscriber::fmt()
        .event_format(format)
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn run_quote(global_args: GlobalArgs, quote_args: QuoteArgs) -> Result<(), anyhow::Error> {
    let config = match &global_args.config {
        Some(path) => OnChainQuoteConfig::from_yaml(path)?,
        None => OnChainQuoteConfig::default(),
    };

    let request_path = &quote_args.request;
    let request: QuoteRequestFile = serde_json::from_str(
        &fs::read_to_string(request_path)
            .with_context(|| format!("Failed to read request file {}", request_path.display()))?,
    )
    .with_context(|| format!("Invalid request file {}", request_path.display()))?;

    let chain = global_args.chain;
    let client = EthereumRpcClient::new(&global_args.rpc_url)?;
    let multicall = config
        .multicall_address_override
        .unwrap_or_else(|| multicall_address(chain));
    info!(
        %chain,
        chain_id = chain.id(),
        %multicall,
        routes = request.routes.len(),
        amounts = request.amounts.len(),
        "Quoting"
    );

    let aggregator = UniswapMulticallProvider::new(client.clone(), multicall);
    let provider = OnChainQuoteProvider::new(chain, aggregator, client, config)?;
    let provider_config = Some(ProviderConfig { block_number: quote_args.block_number });

    let quotes = match request.trade_type {
        TradeType::ExactIn => {
            provider
                .get_quotes_many_exact_in(&request.amounts, &request.routes, provider_config)
                .await?
        }
        TradeType::ExactOut => {
            provider
                .get_quotes_many_exact_out(&request.amounts, &request.routes, provider_config)
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&quotes)?);
    Ok(())
}
