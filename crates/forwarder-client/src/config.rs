//! JSON configuration for one forwarder deployment.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use forwarder_rpc::RpcConfig;
use forwarder_types::{ForwarderError, ForwarderVariant, Result};

/// Which forwarder to talk to, on which chain, and through which endpoint.
///
/// ```json
/// {
///   "forwarder": "0x5FbDB2315678afecb367f032d93F642f64180aa3",
///   "chain_id": 1337,
///   "variant": { "kind": "minimal" },
///   "rpc": { "url": "http://127.0.0.1:8545" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwarderConfig {
    pub forwarder: Address,
    /// Read from the endpoint (`eth_chainId`) when absent.
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "ForwarderVariant::minimal")]
    pub variant: ForwarderVariant,
    #[serde(default)]
    pub rpc: RpcConfig,
}

impl ForwarderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ForwarderError::Config(format!("invalid forwarder config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.forwarder.is_zero() {
            return Err(ForwarderError::Config("forwarder address is zero".into()));
        }
        if self.variant.name().is_empty() {
            return Err(ForwarderError::Config("domain name is empty".into()));
        }
        if self.rpc.url.is_empty() {
            return Err(ForwarderError::Config("rpc url is empty".into()));
        }
        Ok(())
    }
}
