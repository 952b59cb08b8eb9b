//! Relay-side forwarder client: reserve a nonce, build and sign the request,
//! pack the `execute` call.
//!
//! Submitting the packed call and waiting for it is left to the caller, who
//! then commits the reservation on success or releases it otherwise.

pub mod config;
#[cfg(test)]
mod simulator;

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use tracing::{debug, info};

use forwarder_crypto::{sign, SigningCapability, TypedDataHasher};
use forwarder_nonce::{NonceCoordinator, NonceReader, NonceReservation};
use forwarder_rpc::rpc_client::RpcClient;
use forwarder_rpc::RpcNonceReader;
use forwarder_tx::ForwarderAbi;
use forwarder_types::{ForwardRequest, ForwarderError, ForwarderVariant, Result, Signature};

pub use config::ForwarderConfig;

/// A signed request and the `execute` call data carrying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedForward {
    pub request: ForwardRequest,
    pub digest: B256,
    pub signature: Signature,
    pub calldata: Bytes,
}

/// Client for one forwarder deployment.
///
/// Clients for different forwarders may share one `NonceCoordinator`; its
/// locks are per (signer, forwarder).
pub struct ForwarderClient {
    forwarder: Address,
    hasher: TypedDataHasher,
    abi: ForwarderAbi,
    coordinator: Arc<NonceCoordinator>,
    rpc: Option<Arc<RpcClient>>,
}

impl ForwarderClient {
    pub fn new(
        forwarder: Address,
        chain_id: u64,
        variant: ForwarderVariant,
        coordinator: Arc<NonceCoordinator>,
    ) -> Self {
        let hasher = TypedDataHasher::new(variant, chain_id, forwarder);
        let abi = ForwarderAbi::for_variant(hasher.variant(), hasher.domain_separator());
        Self {
            forwarder,
            hasher,
            abi,
            coordinator,
            rpc: None,
        }
    }

    /// Attach a JSON-RPC endpoint for on-chain reads.
    pub fn with_rpc(mut self, rpc: Arc<RpcClient>) -> Self {
        self.rpc = Some(rpc);
        self
    }

    /// Build a client whose nonces are seeded from the configured endpoint.
    ///
    /// Asks the endpoint for the chain id when the config leaves it out.
    pub async fn from_config(config: &ForwarderConfig) -> Result<Self> {
        config.validate()?;
        let rpc = Arc::new(config.rpc.client());
        let chain_id = match config.chain_id {
            Some(chain_id) => chain_id,
            None => rpc.chain_id().await?,
        };
        let reader: Arc<dyn NonceReader> = Arc::new(RpcNonceReader::new(rpc.clone()));
        let coordinator = Arc::new(NonceCoordinator::new(reader));
        info!(
            forwarder = %config.forwarder,
            chain_id,
            variant = config.variant.name(),
            rpc = rpc.url(),
            "forwarder client configured"
        );
        Ok(Self::new(config.forwarder, chain_id, config.variant.clone(), coordinator).with_rpc(rpc))
    }

    pub fn forwarder(&self) -> Address {
        self.forwarder
    }

    pub fn chain_id(&self) -> U256 {
        self.hasher.chain_id()
    }

    pub fn variant(&self) -> &ForwarderVariant {
        self.hasher.variant()
    }

    pub fn domain_separator(&self) -> B256 {
        self.hasher.domain_separator()
    }

    pub fn hasher(&self) -> &TypedDataHasher {
        &self.hasher
    }

    pub fn abi(&self) -> &ForwarderAbi {
        &self.abi
    }

    pub fn coordinator(&self) -> &Arc<NonceCoordinator> {
        &self.coordinator
    }

    /// Reserve the next nonce of `signer` on this forwarder. The pair stays
    /// locked until [`unlock_and_set_nonce`](Self::unlock_and_set_nonce) or
    /// [`unlock`](Self::unlock).
    pub async fn lock_and_next_nonce(&self, signer: Address) -> Result<U256> {
        self.coordinator.reserve(signer, self.forwarder).await
    }

    /// Mark `used_nonce` as consumed and unlock.
    pub fn unlock_and_set_nonce(&self, signer: Address, used_nonce: U256) -> Result<()> {
        self.coordinator.commit(signer, self.forwarder, used_nonce)
    }

    /// Unlock without consuming the reserved nonce.
    pub fn unlock(&self, signer: Address) -> Result<()> {
        self.coordinator.release(signer, self.forwarder)
    }

    pub async fn reserve_scoped(&self, signer: Address) -> Result<NonceReservation<'_>> {
        self.coordinator.reserve_scoped(signer, self.forwarder).await
    }

    /// Assemble a request for this forwarder. The relay-network variant also
    /// binds the chain id and forwarder address into the request.
    pub fn build_request(
        &self,
        from: Address,
        to: Address,
        data: impl Into<Bytes>,
        nonce: U256,
        value: U256,
        gas: U256,
    ) -> Result<ForwardRequest> {
        let builder = ForwardRequest::builder()
            .from(from)
            .to(to)
            .data(data)
            .nonce(nonce)
            .value(value)
            .gas(gas);
        let builder = match self.variant() {
            ForwarderVariant::Minimal { .. } => builder,
            ForwarderVariant::RegisteredDomain { .. } => builder
                .chain_id(self.chain_id())
                .verifying_contract(self.forwarder),
        };
        builder.build()
    }

    /// Sign an already built request and pack it into `execute` call data.
    pub fn sign_request(
        &self,
        request: ForwardRequest,
        capability: &dyn SigningCapability,
    ) -> Result<PreparedForward> {
        if capability.address() != request.from() {
            return Err(ForwarderError::InvalidKey(format!(
                "signing capability is {} but the request is from {}",
                capability.address(),
                request.from()
            )));
        }
        let digest = self.hasher.digest(&request)?;
        let signature = sign(digest.as_slice(), capability)?
            .with_convention(self.variant().recovery_convention())?;
        let calldata = forwarder_tx::pack_execute(&self.abi, &request, &signature)?;
        debug!(
            forwarder = %self.forwarder,
            from = %request.from(),
            nonce = %request.nonce(),
            %digest,
            "forward request signed"
        );
        Ok(PreparedForward {
            request,
            digest,
            signature,
            calldata,
        })
    }

    /// Build, sign and pack in one step.
    #[allow(clippy::too_many_arguments)]
    pub fn pack_and_sign(
        &self,
        from: Address,
        to: Address,
        data: impl Into<Bytes>,
        nonce: U256,
        value: U256,
        gas: U256,
        capability: &dyn SigningCapability,
    ) -> Result<PreparedForward> {
        let request = self.build_request(from, to, data, nonce, value, gas)?;
        self.sign_request(request, capability)
    }

    /// `registerDomainSeparator(name, version)` call data for this client's domain.
    pub fn register_domain_calldata(&self) -> Result<Bytes> {
        match self.variant() {
            ForwarderVariant::RegisteredDomain { name, version } => {
                Ok(forwarder_tx::pack_register_domain(name, version))
            }
            ForwarderVariant::Minimal { .. } => Err(ForwarderError::Config(
                "the minimal forwarder has no domain registration".into(),
            )),
        }
    }

    fn rpc(&self) -> Result<&Arc<RpcClient>> {
        self.rpc
            .as_ref()
            .ok_or_else(|| ForwarderError::Config("no rpc endpoint configured".into()))
    }

    /// The forwarder's current `getNonce(signer)`, bypassing the cache.
    pub async fn on_chain_nonce(&self, signer: Address) -> Result<U256> {
        RpcNonceReader::new(self.rpc()?.clone())
            .current_nonce(self.forwarder, signer)
            .await
    }

    /// Ask the forwarder's read-only `verify` whether it would accept the request now.
    pub async fn verify_on_chain(&self, prepared: &PreparedForward) -> Result<bool> {
        let data = forwarder_tx::pack_verify(&self.abi, &prepared.request, &prepared.signature)?;
        let ret = self.rpc()?.eth_call(self.forwarder, &data).await?;
        forwarder_tx::unpack_verify_result(&ret)
    }
}
