//! Delegated session keys.
//!
//! Creation protocol:
//! 1. Generate a fresh single-use keypair locally.
//! 2. The owner signs a canonical message binding
//!    {delegate address, purpose, expiry}.
//! 3. Self-verify: recover the address from the authorization signature
//!    and assert equality with the owner before marking the key usable.
//!    A mismatch aborts creation entirely.
//!
//! The delegation bundle travels with every delegate-signed order so a
//! verifier can re-run the same recovery before trusting the order
//! signature.

use alloy::primitives::{keccak256, Address, B256, PrimitiveSignature};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tapgrid_core::Clock;

use crate::error::SessionKeyError;
use crate::owner::OwnerSigner;

/// Purpose string bound into every delegation message.
pub const SESSION_KEY_PURPOSE: &str = "tapgrid.session";

/// Canonical delegation message.
///
/// Serialized with msgpack in declaration order; field order is part of
/// the wire contract because the hash is recomputed by verifiers.
#[derive(Debug, Clone, Serialize)]
struct DelegationMessage {
    /// Lowercase hex delegate address.
    delegate: String,
    /// Delegation purpose tag.
    purpose: String,
    /// Expiry in milliseconds since Unix epoch.
    #[serde(rename = "expiresAt")]
    expires_at_ms: u64,
}

/// Canonical hash the owner signs to authorize a delegate.
fn delegation_hash(delegate: Address, expires_at_ms: u64) -> Result<B256, SessionKeyError> {
    let message = DelegationMessage {
        delegate: format!("{delegate:#x}"),
        purpose: SESSION_KEY_PURPOSE.to_string(),
        expires_at_ms,
    };
    let bytes = rmp_serde::to_vec_named(&message)
        .map_err(|e| SessionKeyError::SerializationFailed(e.to_string()))?;
    Ok(keccak256(&bytes))
}

/// A delegated, time-boxed signing capability.
#[derive(Debug, Clone)]
pub struct SessionKey {
    /// Delegate address (the fresh keypair).
    pub address: Address,
    /// Expiry in milliseconds since Unix epoch.
    pub expires_at_ms: u64,
    /// Owner who authorized the delegation.
    pub authorized_by: Address,
    /// Owner signature over the canonical delegation hash.
    pub auth_signature: PrimitiveSignature,
}

impl SessionKey {
    /// Verify this delegation for a claimed trader at a point in time.
    ///
    /// Recovers the authorizer from `auth_signature`, checks it matches
    /// the claimed trader, and checks expiry. This is exactly what a
    /// relayer-side verifier runs before trusting an order signature.
    ///
    /// # Errors
    /// `TraderMismatch`, `Expired`, or recovery failures.
    pub fn verify(&self, claimed_trader: Address, now_ms: u64) -> Result<(), SessionKeyError> {
        let hash = delegation_hash(self.address, self.expires_at_ms)?;
        let recovered = self
            .auth_signature
            .recover_address_from_prehash(&hash)
            .map_err(|e| SessionKeyError::RecoveryFailed(e.to_string()))?;

        if recovered != claimed_trader {
            return Err(SessionKeyError::TraderMismatch {
                bound: recovered,
                claimed: claimed_trader,
            });
        }
        if now_ms >= self.expires_at_ms {
            return Err(SessionKeyError::Expired {
                expires_at_ms: self.expires_at_ms,
            });
        }
        Ok(())
    }

    /// Wire form carried alongside delegate-signed orders.
    #[must_use]
    pub fn to_wire(&self) -> SessionKeyBundle {
        SessionKeyBundle {
            delegate: format!("{:#x}", self.address),
            expires_at_ms: self.expires_at_ms,
            authorized_by: format!("{:#x}", self.authorized_by),
            auth_signature: format!("0x{}", hex::encode(self.auth_signature.as_bytes())),
        }
    }
}

/// Hex-encoded delegation bundle for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionKeyBundle {
    /// Delegate address, lowercase hex.
    pub delegate: String,
    /// Expiry in milliseconds since Unix epoch.
    #[serde(rename = "expiresAt")]
    pub expires_at_ms: u64,
    /// Authorizing owner address, lowercase hex.
    #[serde(rename = "authorizedBy")]
    pub authorized_by: String,
    /// 65-byte owner signature, hex with 0x prefix.
    #[serde(rename = "authSignature")]
    pub auth_signature: String,
}

/// Creates, holds, and expires one delegated signing capability.
///
/// The manager is the only producer of delegated signatures. Dependent
/// trading modes subscribe to the expiry watch and auto-deactivate when
/// it fires; expiry never silently falls back to per-tap prompting.
pub struct SessionKeyManager<C: Clock> {
    delegate: PrivateKeySigner,
    key: SessionKey,
    clock: C,
    expiry_tx: watch::Sender<bool>,
    expiry_task: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock> SessionKeyManager<C> {
    /// Run the delegation protocol and self-verify the result.
    ///
    /// # Errors
    /// - `SigningRejected` when the owner declines the prompt; no key is
    ///   created.
    /// - `SelfCheckFailed` when recovery does not yield the owner
    ///   address; creation aborts rather than proceeding in a
    ///   degraded-trust state.
    pub async fn create(
        owner: &dyn OwnerSigner,
        duration_ms: u64,
        clock: C,
    ) -> Result<Self, SessionKeyError> {
        let delegate = PrivateKeySigner::random();
        let expires_at_ms = clock.now_ms() + duration_ms;

        let hash = delegation_hash(delegate.address(), expires_at_ms)?;
        let auth_signature = owner.sign_hash(hash).await?;

        // Self-check before the key is marked usable.
        let recovered = auth_signature
            .recover_address_from_prehash(&hash)
            .map_err(|e| SessionKeyError::RecoveryFailed(e.to_string()))?;
        if recovered != owner.address() {
            return Err(SessionKeyError::SelfCheckFailed {
                expected: owner.address(),
                recovered,
            });
        }

        let key = SessionKey {
            address: delegate.address(),
            expires_at_ms,
            authorized_by: owner.address(),
            auth_signature,
        };

        info!(
            delegate = %key.address,
            expires_at_ms,
            "session key created and self-verified"
        );

        let (expiry_tx, _) = watch::channel(false);
        Ok(Self {
            delegate,
            key,
            clock,
            expiry_tx,
            expiry_task: Mutex::new(None),
        })
    }

    /// The delegation bundle.
    #[must_use]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Strictly time-bounded validity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.clock.now_ms() < self.key.expires_at_ms
    }

    /// Sign a payload hash with the delegate key.
    ///
    /// Returns `None` once the key has expired; callers fall back to an
    /// explicit owner prompt (or the dependent mode deactivates).
    pub async fn sign_with_session(&self, hash: B256) -> Option<PrimitiveSignature> {
        if !self.is_valid() {
            return None;
        }
        match self.delegate.sign_hash(&hash).await {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!(error = %e, "delegate signing failed");
                None
            }
        }
    }

    /// Subscribe to the expiry event. The value flips to `true` exactly
    /// once, when the key expires.
    #[must_use]
    pub fn subscribe_expiry(&self) -> watch::Receiver<bool> {
        self.expiry_tx.subscribe()
    }

    /// Spawn the expiry timer. Idempotent; the timer fires the watch
    /// channel once at expiry.
    pub fn start_expiry_watch(&self) {
        let mut task = self.expiry_task.lock();
        if task.is_some() {
            return;
        }

        let remaining_ms = self.key.expires_at_ms.saturating_sub(self.clock.now_ms());
        let tx = self.expiry_tx.clone();
        *task = Some(tokio::spawn(async move {
            tokio::time::sleep(tokio::time::Duration::from_millis(remaining_ms)).await;
            let _ = tx.send(true);
            info!("session key expired");
        }));
    }

    /// Stop the expiry timer without firing it. Idempotent.
    pub fn stop_expiry_watch(&self) {
        if let Some(task) = self.expiry_task.lock().take() {
            task.abort();
        }
    }
}

impl<C: Clock> Drop for SessionKeyManager<C> {
    fn drop(&mut self) {
        self.stop_expiry_watch();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::owner::test_support::RejectingOwnerSigner;
    use crate::owner::LocalOwnerSigner;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    struct MockClock {
        time_ms: AtomicU64,
    }

    impl MockClock {
        fn new(initial_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                time_ms: AtomicU64::new(initial_ms),
            })
        }

        fn advance(&self, delta_ms: u64) {
            self.time_ms.fetch_add(delta_ms, Ordering::AcqRel);
        }
    }

    impl Clock for MockClock {
        fn now_ms(&self) -> u64 {
            self.time_ms.load(Ordering::Acquire)
        }
    }

    fn owner() -> LocalOwnerSigner {
        let key = PrivateKeySigner::from_slice(&hex::decode(TEST_PRIVATE_KEY).unwrap()).unwrap();
        LocalOwnerSigner::new(key)
    }

    const BASE: u64 = 1_700_000_000_000;

    #[tokio::test]
    async fn test_create_self_verifies() {
        let clock = MockClock::new(BASE);
        let owner = owner();
        let manager = SessionKeyManager::create(&owner, 600_000, clock).await.unwrap();

        assert!(manager.is_valid());
        assert_eq!(manager.key().authorized_by, owner.address());
        assert_ne!(manager.key().address, owner.address());
        manager.key().verify(owner.address(), BASE + 1).unwrap();
    }

    #[tokio::test]
    async fn test_rejected_prompt_creates_nothing() {
        let clock = MockClock::new(BASE);
        let owner = RejectingOwnerSigner::new(Address::ZERO);
        let result = SessionKeyManager::create(&owner, 600_000, clock).await;
        assert!(matches!(result, Err(SessionKeyError::SigningRejected)));
    }

    #[tokio::test]
    async fn test_expired_key_stops_signing() {
        let clock = MockClock::new(BASE);
        let manager = SessionKeyManager::create(&owner(), 600_000, Arc::clone(&clock))
            .await
            .unwrap();

        let hash = B256::repeat_byte(0x11);
        assert!(manager.sign_with_session(hash).await.is_some());

        clock.advance(600_000);
        assert!(!manager.is_valid());
        assert!(manager.sign_with_session(hash).await.is_none());
    }

    #[tokio::test]
    async fn test_delegate_signature_recovers_to_delegate() {
        let clock = MockClock::new(BASE);
        let manager = SessionKeyManager::create(&owner(), 600_000, clock).await.unwrap();

        let hash = B256::repeat_byte(0x22);
        let sig = manager.sign_with_session(hash).await.unwrap();
        let recovered = sig.recover_address_from_prehash(&hash).unwrap();
        assert_eq!(recovered, manager.key().address);
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_trader() {
        let clock = MockClock::new(BASE);
        let manager = SessionKeyManager::create(&owner(), 600_000, clock).await.unwrap();

        let err = manager.key().verify(Address::ZERO, BASE + 1);
        assert!(matches!(err, Err(SessionKeyError::TraderMismatch { .. })));
    }

    #[tokio::test]
    async fn test_verify_rejects_expired_bundle() {
        let clock = MockClock::new(BASE);
        let owner = owner();
        let manager = SessionKeyManager::create(&owner, 600_000, clock).await.unwrap();

        let err = manager.key().verify(owner.address(), BASE + 600_000);
        assert!(matches!(err, Err(SessionKeyError::Expired { .. })));
    }

    #[tokio::test]
    async fn test_tampered_bundle_fails_verification() {
        let clock = MockClock::new(BASE);
        let owner = owner();
        let manager = SessionKeyManager::create(&owner, 600_000, clock).await.unwrap();

        // Re-bind the same signature to a different expiry: the hash no
        // longer matches, so recovery yields some other address.
        let mut tampered = manager.key().clone();
        tampered.expires_at_ms += 1;
        assert!(tampered.verify(owner.address(), BASE + 1).is_err());
    }

    #[tokio::test]
    async fn test_expiry_watch_fires_once() {
        let clock = MockClock::new(BASE);
        // Wall-clock sleep drives the timer; MockClock drives validity.
        let manager = SessionKeyManager::create(&owner(), 30, Arc::clone(&clock))
            .await
            .unwrap();

        let mut rx = manager.subscribe_expiry();
        manager.start_expiry_watch();
        manager.start_expiry_watch(); // idempotent

        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_wire_bundle_round_trips_as_json() {
        let clock = MockClock::new(BASE);
        let manager = SessionKeyManager::create(&owner(), 600_000, clock).await.unwrap();

        let wire = manager.key().to_wire();
        let json = serde_json::to_string(&wire).unwrap();
        assert!(json.contains("expiresAt"));
        assert!(json.contains("authSignature"));

        let parsed: SessionKeyBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, wire);
    }
}
