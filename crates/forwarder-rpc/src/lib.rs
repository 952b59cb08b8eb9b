//! On-chain reads against a forwarder over Ethereum JSON-RPC.
//!
//! - `RpcClient`: eth_chainId / eth_call over HTTP
//! - `RpcNonceReader`: the forwarder's `getNonce(address)` as a `NonceReader`

pub mod rpc_client;

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use forwarder_nonce::NonceReader;
use forwarder_types::{ForwarderError, Result};
use rpc_client::RpcClient;

/// JSON-RPC endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RpcConfig {
    pub fn client(&self) -> RpcClient {
        RpcClient::new(&self.url, Some(self.timeout_ms))
    }
}

/// Reads `getNonce(signer)` from forwarder contracts through JSON-RPC.
pub struct RpcNonceReader {
    client: Arc<RpcClient>,
}

impl RpcNonceReader {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NonceReader for RpcNonceReader {
    async fn current_nonce(&self, forwarder: Address, signer: Address) -> Result<U256> {
        let data = forwarder_tx::pack_get_nonce(signer);
        let ret = self.client.eth_call(forwarder, &data).await?;
        let nonce = forwarder_tx::unpack_get_nonce(&ret).map_err(|e| match e {
            ForwarderError::Query(_) => e,
            other => ForwarderError::Query(format!("getNonce on {}: {}", forwarder, other)),
        })?;
        debug!(%forwarder, %signer, %nonce, "read on-chain nonce");
        Ok(nonce)
    }
}
