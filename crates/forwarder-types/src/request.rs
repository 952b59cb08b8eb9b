//! Forward request value and its builder.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::{address_from_slice, hex_to_bytes, ForwarderError, Result};

/// A request for the forwarder to call `to` on behalf of `from`.
///
/// Fields are only readable; a request is assembled once through
/// [`ForwardRequestBuilder`] and never changes afterwards, since every field
/// ends up in the signed digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    from: Address,
    to: Address,
    value: U256,
    gas: U256,
    nonce: U256,
    data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chain_id: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    verifying_contract: Option<Address>,
}

impl ForwardRequest {
    pub fn builder() -> ForwardRequestBuilder {
        ForwardRequestBuilder::new()
    }

    pub fn from(&self) -> Address {
        self.from
    }

    pub fn to(&self) -> Address {
        self.to
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn gas(&self) -> U256 {
        self.gas
    }

    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Target chain id, bound into the struct hash by the relay-network variant.
    pub fn chain_id(&self) -> Option<U256> {
        self.chain_id
    }

    /// Forwarder address, bound into the struct hash by the relay-network variant.
    pub fn verifying_contract(&self) -> Option<Address> {
        self.verifying_contract
    }
}

/// Fluent builder for [`ForwardRequest`].
///
/// `from`, `to`, `gas` and `nonce` are mandatory; `value` defaults to zero and
/// `data` to empty.
#[derive(Debug, Clone, Default)]
pub struct ForwardRequestBuilder {
    from: Option<Address>,
    to: Option<Address>,
    value: U256,
    gas: Option<U256>,
    nonce: Option<U256>,
    data: Bytes,
    chain_id: Option<U256>,
    verifying_contract: Option<Address>,
}

impl ForwardRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    /// Sets the signer from raw bytes; must be exactly 20 bytes.
    pub fn from_slice(mut self, bytes: &[u8]) -> Result<Self> {
        self.from = Some(address_from_slice(bytes)?);
        Ok(self)
    }

    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    /// Sets the call target from raw bytes; must be exactly 20 bytes.
    pub fn to_slice(mut self, bytes: &[u8]) -> Result<Self> {
        self.to = Some(address_from_slice(bytes)?);
        Ok(self)
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the value from big-endian bytes (at most 32).
    pub fn value_be_bytes(mut self, bytes: &[u8]) -> Result<Self> {
        self.value = u256_from_be_slice("value", bytes)?;
        Ok(self)
    }

    pub fn gas(mut self, gas: U256) -> Self {
        self.gas = Some(gas);
        self
    }

    pub fn gas_u64(self, gas: u64) -> Self {
        self.gas(U256::from(gas))
    }

    pub fn nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    /// Sets the call payload from a hex string. "0x" and "" both mean empty.
    pub fn data_hex(mut self, hex: &str) -> Result<Self> {
        self.data = hex_to_bytes(hex)?.into();
        Ok(self)
    }

    pub fn chain_id(mut self, chain_id: U256) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn chain_id_u64(self, chain_id: u64) -> Self {
        self.chain_id(U256::from(chain_id))
    }

    pub fn verifying_contract(mut self, forwarder: Address) -> Self {
        self.verifying_contract = Some(forwarder);
        self
    }

    pub fn build(self) -> Result<ForwardRequest> {
        Ok(ForwardRequest {
            from: self.from.ok_or(ForwarderError::MissingField("from"))?,
            to: self.to.ok_or(ForwarderError::MissingField("to"))?,
            value: self.value,
            gas: self.gas.ok_or(ForwarderError::MissingField("gas"))?,
            nonce: self.nonce.ok_or(ForwarderError::MissingField("nonce"))?,
            data: self.data,
            chain_id: self.chain_id,
            verifying_contract: self.verifying_contract,
        })
    }
}

fn u256_from_be_slice(field: &str, bytes: &[u8]) -> Result<U256> {
    U256::try_from_be_slice(bytes).ok_or_else(|| {
        ForwarderError::Encoding(format!(
            "{} does not fit in 256 bits ({} bytes)",
            field,
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    #[test]
    fn test_build_with_defaults() {
        let req = ForwardRequest::builder()
            .from(alice())
            .to(alice())
            .gas_u64(100_000)
            .nonce(U256::ZERO)
            .data_hex("0x")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(req.from(), alice());
        assert_eq!(req.value(), U256::ZERO);
        assert_eq!(req.gas(), U256::from(100_000u64));
        assert!(req.data().is_empty());
        assert_eq!(req.chain_id(), None);
        assert_eq!(req.verifying_contract(), None);
    }

    #[test]
    fn test_missing_required_fields() {
        let err = ForwardRequest::builder().to(alice()).build().unwrap_err();
        assert!(matches!(err, ForwarderError::MissingField("from")));

        let err = ForwardRequest::builder()
            .from(alice())
            .to(alice())
            .gas_u64(1)
            .build()
            .unwrap_err();
        assert!(matches!(err, ForwarderError::MissingField("nonce")));
    }

    #[test]
    fn test_width_checks() {
        assert!(ForwardRequest::builder().from_slice(&[1u8; 21]).is_err());
        assert!(ForwardRequest::builder().to_slice(&[1u8; 20]).is_ok());

        let ok = ForwardRequest::builder().value_be_bytes(&[0xff; 32]).unwrap();
        assert_eq!(ok.value, U256::MAX);

        let err = ForwardRequest::builder().value_be_bytes(&[0x01; 33]).unwrap_err();
        assert!(matches!(err, ForwarderError::Encoding(_)));
    }

    #[test]
    fn test_serde_shape() {
        let req = ForwardRequest::builder()
            .from(alice())
            .to(alice())
            .gas_u64(21_000)
            .nonce(U256::from(7))
            .chain_id_u64(5)
            .verifying_contract(Address::repeat_byte(0xf0))
            .build()
            .unwrap();

        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("chainId").is_some());
        assert!(json.get("verifyingContract").is_some());

        let back: ForwardRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }
}
