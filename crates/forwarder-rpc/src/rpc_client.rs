//! Minimal JSON-RPC client for an Ethereum node.
//!
//! Methods:
//! - eth_chainId
//! - eth_call (against the "latest" block)

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, Bytes};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use forwarder_types::{ForwarderError, Result};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// JSON-RPC response envelope.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// Error object returned by the node.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rpc error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " (data: {})", data)?;
        }
        Ok(())
    }
}

/// Ethereum JSON-RPC client.
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str, timeout_ms: Option<u64>) -> Self {
        let timeout_ms = timeout_ms.unwrap_or(30_000);
        Self {
            url: url.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout: Duration::from_millis(timeout_ms),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(url = %self.url, method, id = body.id, "sending rpc request");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ForwarderError::Query(format!("{} request failed: {}", method, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ForwarderError::Query(format!(
                "{} returned status {}: {}",
                method, status, text
            )));
        }

        let body: JsonRpcResponse<T> = resp.json().await.map_err(|e| {
            ForwarderError::Query(format!("failed to parse {} response: {}", method, e))
        })?;

        if let Some(error) = body.error {
            return Err(ForwarderError::Query(format!("{} failed: {}", method, error)));
        }
        body.result
            .ok_or_else(|| ForwarderError::Query(format!("{} response has no result", method)))
    }

    /// eth_chainId
    pub async fn chain_id(&self) -> Result<u64> {
        let quantity: String = self.request("eth_chainId", json!([])).await?;
        parse_quantity(&quantity)
    }

    /// eth_call with `data` sent to `to`, evaluated at the latest block.
    pub async fn eth_call(&self, to: Address, data: &Bytes) -> Result<Bytes> {
        self.request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await
    }
}

/// Parse a hex quantity ("0x539") into a u64.
pub fn parse_quantity(quantity: &str) -> Result<u64> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| ForwarderError::Query(format!("malformed quantity {:?}", quantity)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ForwarderError::Query(format!("malformed quantity {:?}: {}", quantity, e)))
}
