//! EIP-712 hashing of forward requests, as recomputed by the forwarder contracts.
//!
//! domainSeparator = keccak256(DOMAIN_TYPEHASH ‖ keccak(name) ‖ keccak(version) ‖ chainId ‖ verifyingContract)
//! structHash      = keccak256(REQUEST_TYPEHASH ‖ from ‖ to ‖ value ‖ gas ‖ nonce ‖ keccak(data) [‖ chainId ‖ verifyingContract])
//! digest          = keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)

use alloy_primitives::{Address, B256, U256};
use sha3::{Digest, Keccak256};
use tracing::debug;

use forwarder_types::{ForwardRequest, ForwarderError, ForwarderVariant, Result};

pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Request type of the minimal forwarder.
pub const MINIMAL_REQUEST_TYPE: &str =
    "ForwardRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,bytes data)";

/// Request type of the relay-network forwarder; binds chain id and forwarder address.
pub const RELAY_REQUEST_TYPE: &str = concat!(
    "ForwardRequest(address from,address to,uint256 value,uint256 gas,uint256 nonce,bytes data,",
    "uint256 chainId,address verifyingContract)"
);

pub fn keccak256(bytes: &[u8]) -> B256 {
    let mut h = Keccak256::new();
    h.update(bytes);
    B256::from_slice(h.finalize().as_slice())
}

fn address_word(addr: Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..32].copy_from_slice(addr.as_slice());
    word
}

/// Compute an EIP-712 domain separator for (name, version, chainId, verifyingContract).
pub fn domain_separator(
    name: &str,
    version: &str,
    chain_id: U256,
    verifying_contract: Address,
) -> B256 {
    let mut buf = Vec::with_capacity(32 * 5);
    buf.extend_from_slice(keccak256(EIP712_DOMAIN_TYPE.as_bytes()).as_slice());
    buf.extend_from_slice(keccak256(name.as_bytes()).as_slice());
    buf.extend_from_slice(keccak256(version.as_bytes()).as_slice());
    buf.extend_from_slice(&chain_id.to_be_bytes::<32>());
    buf.extend_from_slice(&address_word(verifying_contract));
    keccak256(&buf)
}

/// Type hash of the request struct for a variant.
pub fn request_type_hash(variant: &ForwarderVariant) -> B256 {
    match variant {
        ForwarderVariant::Minimal { .. } => keccak256(MINIMAL_REQUEST_TYPE.as_bytes()),
        ForwarderVariant::RegisteredDomain { .. } => keccak256(RELAY_REQUEST_TYPE.as_bytes()),
    }
}

/// `keccak256(0x19 ‖ 0x01 ‖ domainSeparator ‖ structHash)`.
pub fn signing_digest(domain_separator: &B256, struct_hash: &B256) -> B256 {
    let mut buf = Vec::with_capacity(2 + 32 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(domain_separator.as_slice());
    buf.extend_from_slice(struct_hash.as_slice());
    keccak256(&buf)
}

/// Hashes forward requests for one configured forwarder deployment.
///
/// The domain separator is computed once at construction and reused for the
/// lifetime of the hasher.
#[derive(Debug, Clone)]
pub struct TypedDataHasher {
    variant: ForwarderVariant,
    chain_id: U256,
    verifying_contract: Address,
    domain_separator: B256,
    type_hash: B256,
}

impl TypedDataHasher {
    pub fn new(variant: ForwarderVariant, chain_id: u64, verifying_contract: Address) -> Self {
        let chain_id = U256::from(chain_id);
        let domain_separator =
            domain_separator(variant.name(), variant.version(), chain_id, verifying_contract);
        let type_hash = request_type_hash(&variant);
        debug!(
            name = variant.name(),
            version = variant.version(),
            %chain_id,
            %verifying_contract,
            %domain_separator,
            "computed forwarder domain separator"
        );
        Self {
            variant,
            chain_id,
            verifying_contract,
            domain_separator,
            type_hash,
        }
    }

    pub fn variant(&self) -> &ForwarderVariant {
        &self.variant
    }

    pub fn chain_id(&self) -> U256 {
        self.chain_id
    }

    pub fn verifying_contract(&self) -> Address {
        self.verifying_contract
    }

    pub fn domain_separator(&self) -> B256 {
        self.domain_separator
    }

    pub fn type_hash(&self) -> B256 {
        self.type_hash
    }

    /// Struct hash of `request` under the configured variant's type.
    ///
    /// The relay-network variant fails with `MissingField` when the request
    /// does not carry a chain id or verifying contract, and with `Encoding`
    /// when either differs from this hasher's domain.
    pub fn struct_hash(&self, request: &ForwardRequest) -> Result<B256> {
        let mut buf = Vec::with_capacity(32 * 9);
        buf.extend_from_slice(self.type_hash.as_slice());
        buf.extend_from_slice(&address_word(request.from()));
        buf.extend_from_slice(&address_word(request.to()));
        buf.extend_from_slice(&request.value().to_be_bytes::<32>());
        buf.extend_from_slice(&request.gas().to_be_bytes::<32>());
        buf.extend_from_slice(&request.nonce().to_be_bytes::<32>());
        buf.extend_from_slice(keccak256(request.data()).as_slice());

        if let ForwarderVariant::RegisteredDomain { .. } = self.variant {
            let chain_id = request
                .chain_id()
                .ok_or(ForwarderError::MissingField("chainId"))?;
            let verifying_contract = request
                .verifying_contract()
                .ok_or(ForwarderError::MissingField("verifyingContract"))?;
            if chain_id != self.chain_id {
                return Err(ForwarderError::Encoding(format!(
                    "request chainId {} does not match domain chain id {}",
                    chain_id, self.chain_id
                )));
            }
            if verifying_contract != self.verifying_contract {
                return Err(ForwarderError::Encoding(format!(
                    "request verifyingContract {} does not match forwarder {}",
                    verifying_contract, self.verifying_contract
                )));
            }
            buf.extend_from_slice(&chain_id.to_be_bytes::<32>());
            buf.extend_from_slice(&address_word(verifying_contract));
        }

        Ok(keccak256(&buf))
    }

    /// The 32-byte digest the signer must sign.
    pub fn digest(&self, request: &ForwardRequest) -> Result<B256> {
        let struct_hash = self.struct_hash(request)?;
        Ok(signing_digest(&self.domain_separator, &struct_hash))
    }
}
