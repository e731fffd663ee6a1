use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quoter_common::models::Chain;

/// Batched on-chain quotes
///
/// Quotes many routes and amounts through the Uniswap quoter contracts, batched in multicalls.
#[derive(Parser, PartialEq, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    global_args: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn args(&self) -> GlobalArgs {
        self.global_args.clone()
    }

    pub fn command(&self) -> Command {
        self.command.clone()
    }
}

#[derive(Subcommand, Clone, PartialEq, Debug)]
pub enum Command {
    /// Quotes the routes and amounts of a JSON request file and prints the result.
    Quote(QuoteArgs),
}

#[derive(Parser, Debug, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    /// The RPC URL to connect to the node
    #[clap(env = "RPC_URL", long, hide_env_values = true)]
    pub rpc_url: String,

    /// Chain the node belongs to
    #[clap(long, default_value = "ethereum")]
    pub chain: Chain,

    /// Path to a YAML engine configuration. Defaults are used when omitted.
    #[clap(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct QuoteArgs {
    /// JSON file with `trade_type`, `amounts` and `routes`
    pub request: PathBuf,

    /// Quote at this block instead of the latest one
    #[clap(long)]
    pub block_number: Option<u64>,
}
