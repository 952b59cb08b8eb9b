//! Forwarder contract variants.

use serde::{Deserialize, Serialize};

use crate::RecoveryConvention;

pub const MINIMAL_FORWARDER_NAME: &str = "MinimalForwarder";
pub const MINIMAL_FORWARDER_VERSION: &str = "0.0.1";

fn default_minimal_name() -> String {
    MINIMAL_FORWARDER_NAME.to_string()
}

fn default_minimal_version() -> String {
    MINIMAL_FORWARDER_VERSION.to_string()
}

/// Which forwarder contract the client talks to.
///
/// The variant is chosen by configuration, never by inspecting deployed code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForwarderVariant {
    /// Domain fixed in the constructor (name, version, chain id, own address).
    Minimal {
        #[serde(default = "default_minimal_name")]
        name: String,
        #[serde(default = "default_minimal_version")]
        version: String,
    },
    /// Relay-network forwarder. The (name, version) pair must have been
    /// registered through `registerDomainSeparator` before signatures under it
    /// verify.
    RegisteredDomain { name: String, version: String },
}

impl ForwarderVariant {
    /// A stock `MinimalForwarder` deployment.
    pub fn minimal() -> Self {
        Self::Minimal {
            name: default_minimal_name(),
            version: default_minimal_version(),
        }
    }

    pub fn registered_domain(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::RegisteredDomain {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Minimal { name, .. } | Self::RegisteredDomain { name, .. } => name,
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Minimal { version, .. } | Self::RegisteredDomain { version, .. } => version,
        }
    }

    pub fn requires_registration(&self) -> bool {
        matches!(self, Self::RegisteredDomain { .. })
    }

    /// Both deployed variants recover through OpenZeppelin's `ECDSA.recover`.
    pub fn recovery_convention(&self) -> RecoveryConvention {
        match self {
            Self::Minimal { .. } | Self::RegisteredDomain { .. } => RecoveryConvention::Offset27,
        }
    }
}
