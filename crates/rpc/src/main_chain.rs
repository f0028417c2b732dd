//! HTTP client a side chain uses to reach its main chain.

use crate::alien::AlienApiClient;
use alien_config::AlienConfig;
use alien_consensus::constants::MAIN_CHAIN_TIMEOUT;
use alien_consensus::{AlienError, MainChainClient, MainChainSnapshot};
use alien_types::{Address, H256};
use async_trait::async_trait;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use std::time::Duration;
use tracing::{debug, warn};

/// [`MainChainClient`] over the main chain's HTTP JSON-RPC endpoint.
///
/// Every request is bounded by the same timeout the engine applies to
/// cross-chain calls.
pub struct HttpMainChainClient {
    client: HttpClient,
    url: String,
}

impl HttpMainChainClient {
    /// Client for the main chain named in `config`.
    pub fn new(config: &AlienConfig) -> alien_consensus::Result<Self> {
        let url = config
            .main_chain_rpc_url
            .as_deref()
            .ok_or(AlienError::MainChainClientMissing)?;
        Self::connect(url, MAIN_CHAIN_TIMEOUT)
    }

    /// Client for `url` with a custom request timeout.
    pub fn connect(url: &str, timeout: Duration) -> alien_consensus::Result<Self> {
        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(url)
            .map_err(|e| AlienError::MainChainUnavailable(e.to_string()))?;
        debug!(url, ?timeout, "Main chain client ready");
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Endpoint this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn client_error(method: &'static str, err: ClientError) -> AlienError {
    match err {
        ClientError::RequestTimeout => {
            warn!(method, "Main chain request timed out");
            AlienError::MainChainTimeout
        }
        other => {
            warn!(method, error = %other, "Main chain request failed");
            AlienError::MainChainUnavailable(other.to_string())
        }
    }
}

fn parse_quantity(value: &str) -> alien_consensus::Result<u64> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| AlienError::MainChainUnavailable(format!("bad quantity {value}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|_| AlienError::MainChainUnavailable(format!("bad quantity {value}")))
}

#[async_trait]
impl MainChainClient for HttpMainChainClient {
    async fn snapshot_by_header_time(
        &self,
        time: u64,
        sc_hash: H256,
    ) -> alien_consensus::Result<MainChainSnapshot> {
        self.client
            .get_snapshot_by_header_time(time, sc_hash)
            .await
            .map_err(|e| client_error("alien_getSnapshotByHeaderTime", e))
    }

    async fn send_raw_transaction(&self, raw: Vec<u8>) -> alien_consensus::Result<H256> {
        let hash: H256 = self
            .client
            .request(
                "eth_sendRawTransaction",
                rpc_params![format!("0x{}", hex::encode(&raw))],
            )
            .await
            .map_err(|e| client_error("eth_sendRawTransaction", e))?;
        debug!(%hash, "Submitted main chain transaction");
        Ok(hash)
    }

    async fn transaction_count(&self, address: Address) -> alien_consensus::Result<u64> {
        let count: String = self
            .client
            .request("eth_getTransactionCount", rpc_params![address, "latest"])
            .await
            .map_err(|e| client_error("eth_getTransactionCount", e))?;
        parse_quantity(&count)
    }
}
