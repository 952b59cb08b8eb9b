//! ECDSA (secp256k1) signing of forwarder digests and matching recovery.
//!
//! The forwarder contracts recover through OpenZeppelin's `ECDSA.recover`,
//! which only accepts low-s signatures with `v ∈ {27, 28}`.

use std::fmt;

use alloy_primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};

use forwarder_types::{hex_to_bytes, ForwarderError, RecoveryConvention, Result, Signature};

use crate::typed_data::keccak256;

/// Something that can sign a 32-byte digest on behalf of one address.
///
/// Key custody stays behind this trait; the client only ever sees the
/// resulting signature.
pub trait SigningCapability: Send + Sync {
    /// Address the signatures recover to.
    fn address(&self) -> Address;

    /// Sign a raw 32-byte digest without further hashing or prefixing.
    /// The recovery byte may use either the 0/1 or 27/28 convention.
    fn sign_prehash(&self, digest: &B256) -> Result<Signature>;
}

/// Signing capability backed by an in-process secp256k1 key.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn from_bytes(secret: &[u8]) -> Result<Self> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| ForwarderError::InvalidKey(e.to_string()))?;
        let address = address_of(key.verifying_key());
        Ok(Self { key, address })
    }

    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let bytes =
            hex_to_bytes(secret_hex).map_err(|e| ForwarderError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl SigningCapability for LocalSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_prehash(&self, digest: &B256) -> Result<Signature> {
        // RFC 6979 nonces; k256 returns low-s and adjusts the recovery id.
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| ForwarderError::InvalidKey(e.to_string()))?;
        let (r, s) = sig.split_bytes();
        Ok(Signature::new(
            B256::from_slice(r.as_slice()),
            B256::from_slice(s.as_slice()),
            recid.to_byte(),
        ))
    }
}

/// Ethereum address of a secp256k1 public key.
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..32])
}

/// Sign `digest` with `capability`, returning a signature with `v ∈ {27, 28}`.
pub fn sign(digest: &[u8], capability: &dyn SigningCapability) -> Result<Signature> {
    if digest.len() != 32 {
        return Err(ForwarderError::InvalidDigestLength(digest.len()));
    }
    let digest = B256::from_slice(digest);
    let raw = capability.sign_prehash(&digest).map_err(|e| match e {
        ForwarderError::InvalidKey(_) => e,
        other => ForwarderError::InvalidKey(other.to_string()),
    })?;
    raw.with_convention(RecoveryConvention::Offset27)
}

fn to_ecdsa(signature: &Signature) -> Result<EcdsaSignature> {
    let sig = EcdsaSignature::from_scalars(signature.r.0, signature.s.0)
        .map_err(|e| ForwarderError::InvalidSignature(e.to_string()))?;
    if sig.normalize_s().is_some() {
        return Err(ForwarderError::InvalidSignature(
            "invalid signature 's' value".into(),
        ));
    }
    Ok(sig)
}

/// Recover the signer of `digest`. Accepts `v` in {0, 1, 27, 28}.
pub fn recover(digest: &B256, signature: &Signature) -> Result<Address> {
    let sig = to_ecdsa(signature)?;
    let recid = RecoveryId::from_byte(signature.y_parity()? as u8)
        .ok_or_else(|| ForwarderError::InvalidSignature("invalid recovery id".into()))?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &sig, recid)
        .map_err(|e| ForwarderError::InvalidSignature(e.to_string()))?;
    Ok(address_of(&key))
}

/// Recover exactly as the forwarder contracts do: `v` must be 27 or 28.
pub fn recover_strict(digest: &B256, signature: &Signature) -> Result<Address> {
    if signature.v != 27 && signature.v != 28 {
        return Err(ForwarderError::InvalidSignature(
            "invalid signature 'v' value".into(),
        ));
    }
    recover(digest, signature)
}
