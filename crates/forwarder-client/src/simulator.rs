//! In-process forwarder contract used by the client tests.
//!
//! Verification re-derives the EIP-712 digest with alloy's `SolStruct`
//! implementation rather than the crate's own hasher, so a hashing bug on the
//! client side shows up as a rejected signature here.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{Eip712Domain, Revert, SolCall, SolError, SolStruct};
use async_trait::async_trait;

use forwarder_crypto::recover_strict;
use forwarder_nonce::NonceReader;
use forwarder_tx::encoder::{minimal, relay, unpack_register_domain};
use forwarder_tx::{pack_execute_result, ExecuteOutcome};
use forwarder_types::{ForwarderError, Result, Signature};

pub const MINIMAL_MISMATCH: &str = "MinimalForwarder: signature does not match request";
pub const UNREGISTERED_DOMAIN: &str = "FWD: unregistered domain sep.";
pub const NONCE_MISMATCH: &str = "FWD: nonce mismatch";
pub const RELAY_SIGNATURE_MISMATCH: &str = "FWD: signature mismatch";

enum Kind {
    Minimal { domain: Eip712Domain },
    Relay,
}

pub struct ForwarderSimulator {
    address: Address,
    chain_id: u64,
    kind: Kind,
    nonces: Mutex<HashMap<Address, U256>>,
    domains: Mutex<HashSet<B256>>,
}

fn revert(reason: &str) -> Bytes {
    Revert {
        reason: reason.to_string(),
    }
    .abi_encode()
    .into()
}

impl ForwarderSimulator {
    pub fn minimal(address: Address, chain_id: u64) -> Self {
        let domain = Eip712Domain::new(
            Some("MinimalForwarder".into()),
            Some("0.0.1".into()),
            Some(U256::from(chain_id)),
            Some(address),
            None,
        );
        Self::with_kind(address, chain_id, Kind::Minimal { domain })
    }

    pub fn relay(address: Address, chain_id: u64) -> Self {
        Self::with_kind(address, chain_id, Kind::Relay)
    }

    fn with_kind(address: Address, chain_id: u64, kind: Kind) -> Self {
        Self {
            address,
            chain_id,
            kind,
            nonces: Mutex::new(HashMap::new()),
            domains: Mutex::new(HashSet::new()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn nonce_of(&self, signer: Address) -> U256 {
        self.nonces
            .lock()
            .unwrap()
            .get(&signer)
            .copied()
            .unwrap_or_default()
    }

    /// Run `registerDomainSeparator(name, version)` and return the registered separator.
    pub fn register_domain(&self, calldata: &[u8]) -> B256 {
        let (name, version) = unpack_register_domain(calldata).unwrap();
        let separator = Eip712Domain::new(
            Some(name.into()),
            Some(version.into()),
            Some(U256::from(self.chain_id)),
            Some(self.address),
            None,
        )
        .separator();
        self.domains.lock().unwrap().insert(separator);
        separator
    }

    /// Run `execute`. `Ok` holds the ABI-encoded return value; `Err` holds
    /// the revert payload of the outer call.
    pub fn execute(&self, calldata: &[u8]) -> std::result::Result<Bytes, Bytes> {
        let (from, nonce) = match &self.kind {
            Kind::Minimal { domain } => {
                let call = minimal::executeCall::abi_decode(calldata, true)
                    .map_err(|e| revert(&e.to_string()))?;
                let digest = call.req.eip712_signing_hash(domain);
                let expected = self.nonce_of(call.req.from);
                let signer = Signature::from_slice(&call.signature)
                    .and_then(|sig| recover_strict(&digest, &sig))
                    .ok();
                if expected != call.req.nonce || signer != Some(call.req.from) {
                    return Err(revert(MINIMAL_MISMATCH));
                }
                (call.req.from, call.req.nonce)
            }
            Kind::Relay => {
                let call = relay::executeCall::abi_decode(calldata, true)
                    .map_err(|e| revert(&e.to_string()))?;
                if !self.domains.lock().unwrap().contains(&call.domainSeparator) {
                    return Err(revert(UNREGISTERED_DOMAIN));
                }
                if self.nonce_of(call.req.from) != call.req.nonce {
                    return Err(revert(NONCE_MISMATCH));
                }
                let mut preimage = Vec::with_capacity(66);
                preimage.extend_from_slice(&[0x19, 0x01]);
                preimage.extend_from_slice(call.domainSeparator.as_slice());
                preimage.extend_from_slice(call.req.eip712_hash_struct().as_slice());
                let digest = alloy_primitives::keccak256(&preimage);
                let signer = Signature::from_slice(&call.signature)
                    .and_then(|sig| recover_strict(&digest, &sig))
                    .ok();
                if signer != Some(call.req.from) {
                    return Err(revert(RELAY_SIGNATURE_MISMATCH));
                }
                (call.req.from, call.req.nonce)
            }
        };

        self.nonces.lock().unwrap().insert(from, nonce + U256::from(1));
        Ok(pack_execute_result(&ExecuteOutcome {
            success: true,
            return_data: Bytes::new(),
        }))
    }
}

#[async_trait]
impl NonceReader for ForwarderSimulator {
    async fn current_nonce(&self, forwarder: Address, signer: Address) -> Result<U256> {
        if forwarder != self.address {
            return Err(ForwarderError::Query(format!("no contract at {}", forwarder)));
        }
        Ok(self.nonce_of(signer))
    }
}
