//! Per-(signer, forwarder) nonce reservation.
//!
//! Per pair: Unlocked → reserve → Locked(n) → commit → Unlocked(n + 1)
//!                                 Locked(n) → release → Unlocked(n)
//!
//! Each pair has its own async mutex, so reservations for different pairs
//! never wait on each other. A reservation holds the pair's mutex until it is
//! committed or released; later `reserve` calls queue on it in FIFO order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_primitives::{Address, U256};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::{NonceKey, NonceReader};
use forwarder_types::{ForwarderError, Result};

/// Cached next-usable nonce; `None` until seeded from the chain.
type Slot = Arc<AsyncMutex<Option<U256>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Hands out forwarder nonces without collisions between concurrent relays.
///
/// One coordinator is meant to be shared (behind an `Arc`) by every relay
/// attempt of a process; independent coordinators never see each other's
/// reservations.
pub struct NonceCoordinator {
    reader: Arc<dyn NonceReader>,
    slots: Mutex<HashMap<NonceKey, Slot>>,
    held: Mutex<HashMap<NonceKey, OwnedMutexGuard<Option<U256>>>>,
}

impl NonceCoordinator {
    pub fn new(reader: Arc<dyn NonceReader>) -> Self {
        Self {
            reader,
            slots: Mutex::new(HashMap::new()),
            held: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: NonceKey) -> Slot {
        lock(&self.slots)
            .entry(key)
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    fn take_held(&self, key: NonceKey) -> Result<OwnedMutexGuard<Option<U256>>> {
        lock(&self.held)
            .remove(&key)
            .ok_or(ForwarderError::NotLocked {
                signer: key.signer,
                forwarder: key.forwarder,
            })
    }

    /// Lock the pair and return the nonce to sign with.
    ///
    /// Waits while another reservation for the same pair is outstanding. On
    /// first use of a pair the on-chain counter is read; a failed read is
    /// returned as-is and leaves the pair unlocked and unseeded.
    pub async fn reserve(&self, signer: Address, forwarder: Address) -> Result<U256> {
        let key = NonceKey::new(signer, forwarder);
        debug!(%signer, %forwarder, "waiting for nonce lock");
        let mut guard = self.slot(key).lock_owned().await;

        let nonce = match *guard {
            Some(nonce) => nonce,
            None => {
                let nonce = self.reader.current_nonce(forwarder, signer).await?;
                info!(%signer, %forwarder, %nonce, "seeded nonce from chain");
                *guard = Some(nonce);
                nonce
            }
        };

        lock(&self.held).insert(key, guard);
        debug!(%signer, %forwarder, %nonce, "nonce reserved");
        Ok(nonce)
    }

    /// Like [`reserve`](Self::reserve), but returns a guard that releases the
    /// pair when dropped without being committed.
    pub async fn reserve_scoped(
        &self,
        signer: Address,
        forwarder: Address,
    ) -> Result<NonceReservation<'_>> {
        let nonce = self.reserve(signer, forwarder).await?;
        Ok(NonceReservation {
            coordinator: self,
            key: NonceKey::new(signer, forwarder),
            nonce,
            settled: false,
        })
    }

    /// Record that `used_nonce` was consumed and unlock the pair.
    ///
    /// The cache moves to `used_nonce + 1` but never backwards.
    pub fn commit(&self, signer: Address, forwarder: Address, used_nonce: U256) -> Result<()> {
        let key = NonceKey::new(signer, forwarder);
        let next = used_nonce
            .checked_add(U256::from(1))
            .ok_or_else(|| ForwarderError::Encoding("nonce overflows uint256".into()))?;
        let mut guard = self.take_held(key)?;

        let reserved = guard.unwrap_or_default();
        if used_nonce != reserved {
            warn!(
                %signer,
                %forwarder,
                %reserved,
                %used_nonce,
                "committed nonce differs from reservation"
            );
        }
        let advanced = reserved.max(next);
        *guard = Some(advanced);
        debug!(%signer, %forwarder, next = %advanced, "nonce committed");
        Ok(())
    }

    /// Unlock the pair without consuming the reserved nonce.
    pub fn release(&self, signer: Address, forwarder: Address) -> Result<()> {
        let key = NonceKey::new(signer, forwarder);
        let guard = self.take_held(key)?;
        debug!(%signer, %forwarder, nonce = ?*guard, "nonce reservation released");
        Ok(())
    }

    /// Re-read the on-chain counter and move the cache forward to it if the
    /// chain is ahead (e.g. another relayer consumed nonces for this signer).
    ///
    /// Takes the pair's lock like `reserve`, so it must not be called while
    /// the caller itself holds a reservation for the same pair.
    pub async fn reconcile(&self, signer: Address, forwarder: Address) -> Result<U256> {
        let key = NonceKey::new(signer, forwarder);
        let mut guard = self.slot(key).lock_owned().await;
        let on_chain = self.reader.current_nonce(forwarder, signer).await?;

        let next = match *guard {
            Some(cached) if cached >= on_chain => cached,
            cached => {
                info!(%signer, %forwarder, ?cached, %on_chain, "nonce cache advanced to chain");
                on_chain
            }
        };
        *guard = Some(next);
        Ok(next)
    }

    /// Whether a reservation for the pair is outstanding.
    pub fn is_reserved(&self, signer: Address, forwarder: Address) -> bool {
        lock(&self.held).contains_key(&NonceKey::new(signer, forwarder))
    }

    /// The cached next nonce, without waiting. `None` if the pair was never
    /// seeded or is being seeded right now.
    pub fn cached_nonce(&self, signer: Address, forwarder: Address) -> Option<U256> {
        let key = NonceKey::new(signer, forwarder);
        if let Some(guard) = lock(&self.held).get(&key) {
            return **guard;
        }
        let slot = lock(&self.slots).get(&key).cloned()?;
        let cached = slot.try_lock().ok().and_then(|guard| *guard);
        cached
    }
}

/// An outstanding reservation that unlocks its pair on drop.
pub struct NonceReservation<'a> {
    coordinator: &'a NonceCoordinator,
    key: NonceKey,
    nonce: U256,
    settled: bool,
}

impl NonceReservation<'_> {
    pub fn nonce(&self) -> U256 {
        self.nonce
    }

    pub fn signer(&self) -> Address {
        self.key.signer
    }

    pub fn forwarder(&self) -> Address {
        self.key.forwarder
    }

    /// Mark the reserved nonce as used.
    pub fn commit(mut self) -> Result<()> {
        self.settled = true;
        self.coordinator
            .commit(self.key.signer, self.key.forwarder, self.nonce)
    }

    pub fn release(mut self) -> Result<()> {
        self.settled = true;
        self.coordinator.release(self.key.signer, self.key.forwarder)
    }
}

impl Drop for NonceReservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let _ = self.coordinator.release(self.key.signer, self.key.forwarder);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticNonceReader;
    use std::time::Duration;

    const SIGNER_A: Address = Address::repeat_byte(0xaa);
    const SIGNER_B: Address = Address::repeat_byte(0xbb);
    const FORWARDER: Address = Address::repeat_byte(0xf0);

    fn coordinator() -> (Arc<StaticNonceReader>, NonceCoordinator) {
        let reader = Arc::new(StaticNonceReader::new());
        let coord = NonceCoordinator::new(reader.clone());
        (reader, coord)
    }

    #[tokio::test]
    async fn test_first_reserve_seeds_from_chain() {
        let (reader, coord) = coordinator();
        reader.set(FORWARDER, SIGNER_A, U256::from(5));

        assert_eq!(coord.reserve(SIGNER_A, FORWARDER).await.unwrap(), U256::from(5));
        coord.commit(SIGNER_A, FORWARDER, U256::from(5)).unwrap();
        assert_eq!(coord.reserve(SIGNER_A, FORWARDER).await.unwrap(), U256::from(6));
        coord.release(SIGNER_A, FORWARDER).unwrap();

        assert_eq!(reader.queries(), 1);
    }

    #[tokio::test]
    async fn test_release_keeps_nonce() {
        let (_, coord) = coordinator();
        let first = coord.reserve(SIGNER_A, FORWARDER).await.unwrap();
        coord.release(SIGNER_A, FORWARDER).unwrap();
        let second = coord.reserve(SIGNER_A, FORWARDER).await.unwrap();
        assert_eq!(first, second);
        assert!(coord.is_reserved(SIGNER_A, FORWARDER));
    }

    #[tokio::test]
    async fn test_not_locked() {
        let (_, coord) = coordinator();
        assert!(matches!(
            coord.commit(SIGNER_A, FORWARDER, U256::ZERO),
            Err(ForwarderError::NotLocked { .. })
        ));
        assert!(matches!(
            coord.release(SIGNER_A, FORWARDER),
            Err(ForwarderError::NotLocked { .. })
        ));

        coord.reserve(SIGNER_A, FORWARDER).await.unwrap();
        coord.commit(SIGNER_A, FORWARDER, U256::ZERO).unwrap();
        assert!(matches!(
            coord.commit(SIGNER_A, FORWARDER, U256::ZERO),
            Err(ForwarderError::NotLocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_seed_is_not_zero() {
        let (reader, coord) = coordinator();
        reader.set(FORWARDER, SIGNER_A, U256::from(3));
        reader.set_failure(Some("rpc down"));

        assert!(matches!(
            coord.reserve(SIGNER_A, FORWARDER).await,
            Err(ForwarderError::Query(_))
        ));
        assert!(!coord.is_reserved(SIGNER_A, FORWARDER));
        assert_eq!(coord.cached_nonce(SIGNER_A, FORWARDER), None);

        reader.set_failure(None);
        assert_eq!(coord.reserve(SIGNER_A, FORWARDER).await.unwrap(), U256::from(3));
    }

    #[tokio::test]
    async fn test_sequential_commits_are_contiguous() {
        let (reader, coord) = coordinator();
        reader.set(FORWARDER, SIGNER_A, U256::from(10));

        let mut seen = Vec::new();
        for _ in 0..5 {
            let nonce = coord.reserve(SIGNER_A, FORWARDER).await.unwrap();
            coord.commit(SIGNER_A, FORWARDER, nonce).unwrap();
            seen.push(nonce.to::<u64>());
        }
        assert_eq!(seen, vec![10, 11, 12, 13, 14]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reservations_never_collide() {
        let (_, coord) = coordinator();
        let coord = Arc::new(coord);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let coord = coord.clone();
            handles.push(tokio::spawn(async move {
                let nonce = coord.reserve(SIGNER_A, FORWARDER).await.unwrap();
                tokio::task::yield_now().await;
                coord.commit(SIGNER_A, FORWARDER, nonce).unwrap();
                nonce.to::<u64>()
            }));
        }

        let mut nonces = Vec::new();
        for handle in handles {
            nonces.push(handle.await.unwrap());
        }
        nonces.sort_unstable();
        assert_eq!(nonces, (0..16).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_same_pair_blocks_other_pairs_do_not() {
        let (_, coord) = coordinator();
        coord.reserve(SIGNER_A, FORWARDER).await.unwrap();

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            coord.reserve(SIGNER_A, FORWARDER),
        )
        .await;
        assert!(blocked.is_err());

        let other = tokio::time::timeout(
            Duration::from_millis(50),
            coord.reserve(SIGNER_B, FORWARDER),
        )
        .await;
        assert!(other.is_ok());

        let other_forwarder = tokio::time::timeout(
            Duration::from_millis(50),
            coord.reserve(SIGNER_A, Address::repeat_byte(0xf1)),
        )
        .await;
        assert!(other_forwarder.is_ok());

        coord.release(SIGNER_A, FORWARDER).unwrap();
        let unblocked = tokio::time::timeout(
            Duration::from_millis(50),
            coord.reserve(SIGNER_A, FORWARDER),
        )
        .await;
        assert!(unblocked.is_ok());
    }

    #[tokio::test]
    async fn test_scoped_reservation_releases_on_drop() {
        let (_, coord) = coordinator();
        {
            let reservation = coord.reserve_scoped(SIGNER_A, FORWARDER).await.unwrap();
            assert_eq!(reservation.nonce(), U256::ZERO);
            assert!(coord.is_reserved(SIGNER_A, FORWARDER));
        }
        assert!(!coord.is_reserved(SIGNER_A, FORWARDER));

        let reservation = coord.reserve_scoped(SIGNER_A, FORWARDER).await.unwrap();
        assert_eq!(reservation.nonce(), U256::ZERO);
        reservation.commit().unwrap();
        assert_eq!(coord.cached_nonce(SIGNER_A, FORWARDER), Some(U256::from(1)));
    }

    #[tokio::test]
    async fn test_commit_never_moves_backwards() {
        let (reader, coord) = coordinator();
        reader.set(FORWARDER, SIGNER_A, U256::from(8));
        coord.reserve(SIGNER_A, FORWARDER).await.unwrap();
        coord.commit(SIGNER_A, FORWARDER, U256::from(2)).unwrap();
        assert_eq!(coord.cached_nonce(SIGNER_A, FORWARDER), Some(U256::from(8)));
    }

    #[tokio::test]
    async fn test_overflowing_commit_keeps_reservation() {
        let (reader, coord) = coordinator();
        reader.set(FORWARDER, SIGNER_A, U256::MAX);
        assert_eq!(coord.reserve(SIGNER_A, FORWARDER).await.unwrap(), U256::MAX);

        assert!(matches!(
            coord.commit(SIGNER_A, FORWARDER, U256::MAX),
            Err(ForwarderError::Encoding(_))
        ));
        assert!(coord.is_reserved(SIGNER_A, FORWARDER));
        assert_eq!(coord.cached_nonce(SIGNER_A, FORWARDER), Some(U256::MAX));
        coord.release(SIGNER_A, FORWARDER).unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_only_advances() {
        let (reader, coord) = coordinator();
        coord.reserve(SIGNER_A, FORWARDER).await.unwrap();
        coord.commit(SIGNER_A, FORWARDER, U256::ZERO).unwrap();

        // Chain behind the cache (commit not yet mined): cache kept.
        assert_eq!(coord.reconcile(SIGNER_A, FORWARDER).await.unwrap(), U256::from(1));

        // Another relayer used nonces 1..=3 for this signer.
        reader.set(FORWARDER, SIGNER_A, U256::from(4));
        assert_eq!(coord.reconcile(SIGNER_A, FORWARDER).await.unwrap(), U256::from(4));
        assert_eq!(coord.reserve(SIGNER_A, FORWARDER).await.unwrap(), U256::from(4));
    }

    #[tokio::test]
    async fn test_coordinators_are_independent() {
        let reader = Arc::new(StaticNonceReader::new());
        let first = NonceCoordinator::new(reader.clone());
        let second = NonceCoordinator::new(reader);

        first.reserve(SIGNER_A, FORWARDER).await.unwrap();
        let other = tokio::time::timeout(
            Duration::from_millis(50),
            second.reserve(SIGNER_A, FORWARDER),
        )
        .await;
        assert!(other.is_ok());
    }
}
