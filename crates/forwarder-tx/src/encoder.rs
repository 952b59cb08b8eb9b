//! ABI encoding of forwarder contract calls.
//!
//! Minimal forwarder:
//! - execute((address,address,uint256,uint256,uint256,bytes),bytes) returns (bool,bytes)
//! - verify((address,address,uint256,uint256,uint256,bytes),bytes) returns (bool)
//!
//! Relay-network forwarder:
//! - execute((address,address,uint256,uint256,uint256,bytes,uint256,address),bytes32,bytes) returns (bool,bytes)
//! - verify((address,address,uint256,uint256,uint256,bytes,uint256,address),bytes32,bytes) returns (bool)
//! - registerDomainSeparator(string,string)
//!
//! Both: getNonce(address) returns (uint256)

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};

use forwarder_types::{ForwardRequest, ForwarderError, ForwarderVariant, Result, Signature};

use crate::outcome::ExecuteOutcome;

sol! {
    function getNonce(address from) external view returns (uint256 nonce);
}

pub mod minimal {
    alloy_sol_types::sol! {
        struct ForwardRequest {
            address from;
            address to;
            uint256 value;
            uint256 gas;
            uint256 nonce;
            bytes data;
        }

        function execute(ForwardRequest req, bytes signature)
            external
            payable
            returns (bool success, bytes returnData);

        function verify(ForwardRequest req, bytes signature) external view returns (bool valid);
    }
}

pub mod relay {
    alloy_sol_types::sol! {
        struct ForwardRequest {
            address from;
            address to;
            uint256 value;
            uint256 gas;
            uint256 nonce;
            bytes data;
            uint256 chainId;
            address verifyingContract;
        }

        function execute(ForwardRequest req, bytes32 domainSeparator, bytes signature)
            external
            payable
            returns (bool success, bytes returnData);

        function verify(ForwardRequest req, bytes32 domainSeparator, bytes signature)
            external
            view
            returns (bool valid);

        function registerDomainSeparator(string name, string version) external;
    }
}

/// Call layout of one forwarder deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderAbi {
    Minimal,
    /// The relay-network forwarder is told which registered domain to verify against.
    RegisteredDomain { domain_separator: B256 },
}

impl ForwarderAbi {
    pub fn for_variant(variant: &ForwarderVariant, domain_separator: B256) -> Self {
        match variant {
            ForwarderVariant::Minimal { .. } => Self::Minimal,
            ForwarderVariant::RegisteredDomain { .. } => {
                Self::RegisteredDomain { domain_separator }
            }
        }
    }
}

/// A decoded `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedExecute {
    pub request: ForwardRequest,
    pub signature: Signature,
    pub domain_separator: Option<B256>,
}

fn decode_err(what: &str, e: alloy_sol_types::Error) -> ForwarderError {
    ForwarderError::Encoding(format!("failed to decode {}: {}", what, e))
}

fn to_minimal(request: &ForwardRequest) -> minimal::ForwardRequest {
    minimal::ForwardRequest {
        from: request.from(),
        to: request.to(),
        value: request.value(),
        gas: request.gas(),
        nonce: request.nonce(),
        data: request.data().clone(),
    }
}

fn to_relay(request: &ForwardRequest) -> Result<relay::ForwardRequest> {
    Ok(relay::ForwardRequest {
        from: request.from(),
        to: request.to(),
        value: request.value(),
        gas: request.gas(),
        nonce: request.nonce(),
        data: request.data().clone(),
        chainId: request
            .chain_id()
            .ok_or(ForwarderError::MissingField("chainId"))?,
        verifyingContract: request
            .verifying_contract()
            .ok_or(ForwarderError::MissingField("verifyingContract"))?,
    })
}

fn from_minimal(req: minimal::ForwardRequest) -> Result<ForwardRequest> {
    ForwardRequest::builder()
        .from(req.from)
        .to(req.to)
        .value(req.value)
        .gas(req.gas)
        .nonce(req.nonce)
        .data(req.data)
        .build()
}

fn from_relay(req: relay::ForwardRequest) -> Result<ForwardRequest> {
    ForwardRequest::builder()
        .from(req.from)
        .to(req.to)
        .value(req.value)
        .gas(req.gas)
        .nonce(req.nonce)
        .data(req.data)
        .chain_id(req.chainId)
        .verifying_contract(req.verifyingContract)
        .build()
}

/// Call data for `execute(request, signature)`.
pub fn pack_execute(
    abi: &ForwarderAbi,
    request: &ForwardRequest,
    signature: &Signature,
) -> Result<Bytes> {
    let signature = Bytes::copy_from_slice(&signature.to_bytes());
    let data = match abi {
        ForwarderAbi::Minimal => minimal::executeCall {
            req: to_minimal(request),
            signature,
        }
        .abi_encode(),
        ForwarderAbi::RegisteredDomain { domain_separator } => relay::executeCall {
            req: to_relay(request)?,
            domainSeparator: *domain_separator,
            signature,
        }
        .abi_encode(),
    };
    Ok(data.into())
}

/// Decode call data produced by [`pack_execute`].
pub fn unpack_execute_call(abi: &ForwarderAbi, data: &[u8]) -> Result<DecodedExecute> {
    match abi {
        ForwarderAbi::Minimal => {
            let call = minimal::executeCall::abi_decode(data, true)
                .map_err(|e| decode_err("execute call", e))?;
            Ok(DecodedExecute {
                request: from_minimal(call.req)?,
                signature: Signature::from_slice(&call.signature)?,
                domain_separator: None,
            })
        }
        ForwarderAbi::RegisteredDomain { .. } => {
            let call = relay::executeCall::abi_decode(data, true)
                .map_err(|e| decode_err("execute call", e))?;
            Ok(DecodedExecute {
                request: from_relay(call.req)?,
                signature: Signature::from_slice(&call.signature)?,
                domain_separator: Some(call.domainSeparator),
            })
        }
    }
}

/// Decode the `(bool success, bytes returnData)` returned by `execute`.
///
/// Both variants share the same return layout.
pub fn unpack_execute_result(data: &[u8]) -> Result<ExecuteOutcome> {
    let ret = minimal::executeCall::abi_decode_returns(data, true)
        .map_err(|e| decode_err("execute result", e))?;
    Ok(ExecuteOutcome {
        success: ret.success,
        return_data: ret.returnData,
    })
}

/// Encode an `execute` return value. Used by simulators and tests.
pub fn pack_execute_result(outcome: &ExecuteOutcome) -> Bytes {
    minimal::executeCall::abi_encode_returns(&(outcome.success, outcome.return_data.clone()))
        .into()
}

/// Call data for the contract's read-only `verify`.
pub fn pack_verify(
    abi: &ForwarderAbi,
    request: &ForwardRequest,
    signature: &Signature,
) -> Result<Bytes> {
    let signature = Bytes::copy_from_slice(&signature.to_bytes());
    let data = match abi {
        ForwarderAbi::Minimal => minimal::verifyCall {
            req: to_minimal(request),
            signature,
        }
        .abi_encode(),
        ForwarderAbi::RegisteredDomain { domain_separator } => relay::verifyCall {
            req: to_relay(request)?,
            domainSeparator: *domain_separator,
            signature,
        }
        .abi_encode(),
    };
    Ok(data.into())
}

pub fn unpack_verify_result(data: &[u8]) -> Result<bool> {
    let ret = minimal::verifyCall::abi_decode_returns(data, true)
        .map_err(|e| decode_err("verify result", e))?;
    Ok(ret.valid)
}

/// Call data for `registerDomainSeparator(name, version)` (relay-network variant only).
pub fn pack_register_domain(name: &str, version: &str) -> Bytes {
    relay::registerDomainSeparatorCall {
        name: name.to_string(),
        version: version.to_string(),
    }
    .abi_encode()
    .into()
}

pub fn unpack_register_domain(data: &[u8]) -> Result<(String, String)> {
    let call = relay::registerDomainSeparatorCall::abi_decode(data, true)
        .map_err(|e| decode_err("registerDomainSeparator call", e))?;
    Ok((call.name, call.version))
}

/// Call data for `getNonce(signer)`.
pub fn pack_get_nonce(signer: Address) -> Bytes {
    getNonceCall { from: signer }.abi_encode().into()
}

pub fn unpack_get_nonce_call(data: &[u8]) -> Result<Address> {
    let call = getNonceCall::abi_decode(data, true).map_err(|e| decode_err("getNonce call", e))?;
    Ok(call.from)
}

pub fn unpack_get_nonce(data: &[u8]) -> Result<U256> {
    let ret = getNonceCall::abi_decode_returns(data, true)
        .map_err(|e| decode_err("getNonce result", e))?;
    Ok(ret.nonce)
}
