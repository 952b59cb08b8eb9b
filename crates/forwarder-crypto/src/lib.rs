//! Hashing and signing for forwarder meta-transactions.
//!
//! - `typed_data`: EIP-712 domain separator, struct hash and digest per forwarder variant
//! - `signer`: signing capability trait, local secp256k1 signer, recovery

pub mod signer;
pub mod typed_data;

pub use signer::{recover, recover_strict, sign, LocalSigner, SigningCapability};
pub use typed_data::{keccak256, TypedDataHasher};
