use std::time::Duration;

use alloy::{
    primitives::Bytes,
    rpc::{
        client::{ClientBuilder, ReqwestClient},
        types::{BlockNumberOrTag, TransactionRequest},
    },
    transports::http::reqwest,
};
use async_trait::async_trait;
use quoter_common::traits::BlockNumberProvider;
use tracing::instrument;

use crate::{
    rpc::{config::RPCRetryConfig, errors::RpcResultExt, retry::RetryPolicy},
    RPCError,
};

pub mod config;
pub mod errors;
mod retry;

/// This struct wraps the ReqwestClient and provides the Ethereum RPC methods the quote engine
/// needs, with retry logic for transient transport failures.
/// It is cheap to clone, as the `inner` internally uses an Arc for the ReqwestClient.
#[derive(Clone, Debug)]
pub struct EthereumRpcClient {
    inner: ReqwestClient,
    retry_policy: RetryPolicy,
    url: String,
}

impl EthereumRpcClient {
    /// Creates a new EthereumRpcClient with the given RPC URL.
    ///
    /// Retry: enabled with defaults (max retries 3, initial backoff 100ms, max backoff 5000ms).
    pub fn new(rpc_url: &str) -> Result<Self, RPCError> {
        let url = rpc_url
            .parse()
            .map_err(|e| RPCError::SetupError(format!("Invalid RPC URL: {e}")))?;

        let http_client = reqwest::ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RPCError::SetupError(format!("Failed to create HTTP client: {e}")))?;

        let rpc = ClientBuilder::default().http_with_client(http_client, url);

        Ok(Self { inner: rpc, retry_policy: RetryPolicy::default(), url: rpc_url.to_string() })
    }

    pub fn get_url(&self) -> &str {
        &self.url
    }

    pub fn get_retry_config(&self) -> RPCRetryConfig {
        (&self.retry_policy).into()
    }

    pub fn with_retry(mut self, retry_config: RPCRetryConfig) -> Self {
        self.retry_policy = retry_config.into();
        self
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn get_block_number(&self) -> Result<u64, RPCError> {
        let block_number = self
            .retry_policy
            .retry_request(|| async {
                self.inner
                    .request_noparams("eth_blockNumber")
                    .await
            })
            .await
            .rpc_context("Failed to get block number")?;

        if let BlockNumberOrTag::Number(num) = block_number {
            Ok(num)
        } else {
            Err(RPCError::UnknownError(format!(
                "Failed to get block number: unexpected block tag {block_number}"
            )))
        }
    }

    /// Executes a new message call immediately without creating a transaction on the blockchain.
    /// See https://ethereum.org/en/developers/docs/apis/json-rpc/#eth_call
    ///
    /// Returns the output data from the call or an error if the call failed. The node's error
    /// message (e.g. `out of gas`, `header not found`) is kept in the returned error's `Display`.
    #[instrument(level = "debug", skip(self, request))]
    pub async fn eth_call(
        &self,
        request: TransactionRequest,
        block: BlockNumberOrTag,
    ) -> Result<Bytes, RPCError> {
        self.retry_policy
            .retry_request(|| async {
                self.inner
                    .request("eth_call", (&request, block))
                    .await
            })
            .await
            .with_rpc_context(|| format!("Failed to send eth_call for block {block}"))
    }
}

#[async_trait]
impl BlockNumberProvider for EthereumRpcClient {
    type Error = RPCError;

    async fn get_block_number(&self) -> Result<u64, Self::Error> {
        EthereumRpcClient::get_block_number(self).await
    }
}
