//! Shared types for the forwarder client.
//!
//! - `ForwardRequest` and its builder
//! - `ForwarderVariant` (minimal vs. registered-domain forwarders)
//! - `Signature` (65-byte `r ‖ s ‖ v`)
//! - `ForwarderError`, the error type used across the workspace

use alloy_primitives::Address;
use thiserror::Error;

pub mod request;
pub mod signature;
pub mod variant;

pub use request::{ForwardRequest, ForwardRequestBuilder};
pub use signature::{RecoveryConvention, Signature};
pub use variant::ForwarderVariant;

/// Forwarder client error types.
#[derive(Debug, Error)]
pub enum ForwarderError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),

    #[error("digest must be exactly 32 bytes, got {0}")]
    InvalidDigestLength(usize),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("request is missing `{0}`, required by the configured forwarder variant")]
    MissingField(&'static str),

    #[error("on-chain query failed: {0}")]
    Query(String),

    #[error("no outstanding nonce reservation for signer {signer} on forwarder {forwarder}")]
    NotLocked { signer: Address, forwarder: Address },

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ForwarderError>;

/// Parse a hex string (with or without 0x prefix) to bytes.
pub fn hex_to_bytes(hex_str: &str) -> Result<Vec<u8>> {
    let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
    hex::decode(hex_str).map_err(|e| ForwarderError::InvalidHex(e.to_string()))
}

/// Convert bytes to a 0x-prefixed hex string.
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Interpret a byte slice as an address. Anything other than 20 bytes is rejected.
pub fn address_from_slice(bytes: &[u8]) -> Result<Address> {
    if bytes.len() != 20 {
        return Err(ForwarderError::Encoding(format!(
            "address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(bytes))
}

/// Parse a hex-encoded address.
pub fn hex_to_address(hex_str: &str) -> Result<Address> {
    address_from_slice(&hex_to_bytes(hex_str)?)
}
