//! Nonce reservation for forwarder requests.
//!
//! Defines the `NonceReader` trait that reads the forwarder's authoritative
//! nonce counter, and the `NonceCoordinator` that hands out nonces one
//! reservation at a time per (signer, forwarder) pair.
//! Provides a `StaticNonceReader` for testing.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use forwarder_types::Result;

pub mod coordinator;
pub mod memory;

pub use coordinator::{NonceCoordinator, NonceReservation};
pub use memory::StaticNonceReader;

/// Identifies one replay-protection counter: a signer on a given forwarder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonceKey {
    pub signer: Address,
    pub forwarder: Address,
}

impl NonceKey {
    pub fn new(signer: Address, forwarder: Address) -> Self {
        Self { signer, forwarder }
    }
}

/// Read-only access to a forwarder's nonce counter.
///
/// Implementations must report failures as `ForwarderError::Query` rather
/// than falling back to zero.
#[async_trait]
pub trait NonceReader: Send + Sync {
    async fn current_nonce(&self, forwarder: Address, signer: Address) -> Result<U256>;
}
