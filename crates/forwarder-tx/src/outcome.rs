//! Execution results and classification of forwarder reverts.

use alloy_primitives::Bytes;
use alloy_sol_types::{Revert, SolError};
use serde::{Deserialize, Serialize};

/// What `execute` returned: whether the inner call succeeded and its raw return data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOutcome {
    pub success: bool,
    pub return_data: Bytes,
}

impl ExecuteOutcome {
    /// The `Error(string)` reason of a failed inner call, if it carried one.
    pub fn revert_reason(&self) -> Option<String> {
        if self.success {
            return None;
        }
        decode_revert_reason(&self.return_data)
    }
}

/// Decode an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    if data.len() < 4 || data[..4] != Revert::SELECTOR {
        return None;
    }
    Revert::abi_decode(data, true).ok().map(|r| r.reason)
}

/// Why a forwarder rejected a request.
///
/// These are never detected locally; they are read back from a reverted
/// `execute` so the caller can decide whether to re-reserve a nonce,
/// re-sign or register the domain first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Rejection {
    NonceMismatch,
    /// The minimal forwarder reports a stale nonce this way as well, since its
    /// `verify` folds the nonce check into the signature check.
    SignatureMismatch,
    DomainNotRegistered,
    Other(String),
}

impl Rejection {
    pub fn classify(reason: &str) -> Self {
        let lower = reason.to_ascii_lowercase();
        if lower.contains("unregistered domain") || lower.contains("domain not registered") {
            Self::DomainNotRegistered
        } else if lower.contains("nonce") {
            Self::NonceMismatch
        } else if lower.contains("signature") {
            Self::SignatureMismatch
        } else {
            Self::Other(reason.to_string())
        }
    }

    /// Classify raw revert data; payloads that are not `Error(string)` become `Other`.
    pub fn from_revert_data(data: &[u8]) -> Self {
        match decode_revert_reason(data) {
            Some(reason) => Self::classify(&reason),
            None => Self::Other(format!("0x{}", hex::encode(data))),
        }
    }

    /// True when the request must be rebuilt around a freshly reserved nonce.
    pub fn needs_fresh_nonce(&self) -> bool {
        matches!(self, Self::NonceMismatch)
    }
}
