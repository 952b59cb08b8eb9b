//! 65-byte ECDSA signature as consumed by the forwarder's `execute`.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

use crate::{ForwarderError, Result};

/// Recovery-byte convention expected by a contract's `ecrecover` wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryConvention {
    /// `v ∈ {27, 28}`, the only form OpenZeppelin's `ECDSA.recover` accepts.
    Offset27,
    /// `v ∈ {0, 1}`.
    Raw,
}

/// An ECDSA signature split into `r`, `s` and the recovery byte `v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
}

impl Signature {
    pub const LEN: usize = 65;

    pub fn new(r: B256, s: B256, v: u8) -> Self {
        Self { r, s, v }
    }

    /// Parse `r ‖ s ‖ v`. The recovery byte is kept as-is.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::LEN {
            return Err(ForwarderError::Encoding(format!(
                "signature must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            )));
        }
        Ok(Self {
            r: B256::from_slice(&bytes[0..32]),
            s: B256::from_slice(&bytes[32..64]),
            v: bytes[64],
        })
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0..32].copy_from_slice(self.r.as_slice());
        out[32..64].copy_from_slice(self.s.as_slice());
        out[64] = self.v;
        out
    }

    /// The y-parity bit, for any of the accepted encodings (0/1 or 27/28).
    pub fn y_parity(&self) -> Result<bool> {
        match self.v {
            0 | 27 => Ok(false),
            1 | 28 => Ok(true),
            other => Err(ForwarderError::InvalidSignature(format!(
                "unsupported recovery byte {}",
                other
            ))),
        }
    }

    /// Re-encode the recovery byte for the given convention.
    pub fn with_convention(self, convention: RecoveryConvention) -> Result<Self> {
        let parity = self.y_parity()? as u8;
        let v = match convention {
            RecoveryConvention::Offset27 => 27 + parity,
            RecoveryConvention::Raw => parity,
        };
        Ok(Self { v, ..self })
    }
}
