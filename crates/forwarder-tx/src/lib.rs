//! Call data for the forwarder contracts.
//!
//! - Pack/unpack `execute`, `verify`, `getNonce`, `registerDomainSeparator`
//! - Decode execution results and classify reverts
//!
//! Submitting the packed bytes is left to the caller's transaction pipeline.

pub mod encoder;
pub mod outcome;

pub use encoder::{
    pack_execute, pack_execute_result, pack_get_nonce, pack_register_domain, pack_verify,
    unpack_execute_call, unpack_execute_result, unpack_get_nonce, unpack_get_nonce_call,
    unpack_register_domain, unpack_verify_result, DecodedExecute, ForwarderAbi,
};
pub use outcome::{decode_revert_reason, ExecuteOutcome, Rejection};
