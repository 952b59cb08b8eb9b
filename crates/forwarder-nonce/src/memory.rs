//! In-memory nonce reader for testing.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::*;
use forwarder_types::ForwarderError;

/// Nonce reader backed by a map (for testing and offline use).
///
/// Unknown (forwarder, signer) pairs read as zero, like a fresh on-chain mapping.
pub struct StaticNonceReader {
    nonces: Mutex<HashMap<NonceKey, U256>>,
    failure: Mutex<Option<String>>,
    queries: AtomicUsize,
}

impl StaticNonceReader {
    pub fn new() -> Self {
        Self {
            nonces: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, forwarder: Address, signer: Address, nonce: U256) {
        let mut nonces = self.nonces.lock().unwrap();
        nonces.insert(NonceKey::new(signer, forwarder), nonce);
    }

    /// Make every following query fail with the given message, or succeed again with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        let mut failure = self.failure.lock().unwrap();
        *failure = message.map(str::to_string);
    }

    /// Number of `current_nonce` calls served so far, failed ones included.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl Default for StaticNonceReader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NonceReader for StaticNonceReader {
    async fn current_nonce(&self, forwarder: Address, signer: Address) -> Result<U256> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(ForwarderError::Query(message));
        }
        let nonces = self.nonces.lock().unwrap();
        Ok(nonces
            .get(&NonceKey::new(signer, forwarder))
            .copied()
            .unwrap_or_default())
    }
}
