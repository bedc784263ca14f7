//! Owner signing seam.
//!
//! In the real client every owner signature goes through a wallet prompt
//! the user can decline. The trait keeps that interaction dyn-compatible
//! and testable; `LocalOwnerSigner` is the promptless implementation used
//! when the key is held locally.

use std::pin::Pin;
use std::sync::Arc;

use alloy::primitives::{Address, B256, PrimitiveSignature};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer as AlloySigner;

use crate::error::SessionKeyError;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A capability that can produce owner signatures over 32-byte hashes.
///
/// `Err(SessionKeyError::SigningRejected)` models the user declining the
/// wallet prompt; in that case no order or delegation is ever created.
pub trait OwnerSigner: Send + Sync {
    /// The owner's address.
    fn address(&self) -> Address;

    /// Sign a prehashed 32-byte digest.
    fn sign_hash(&self, hash: B256) -> BoxFuture<'_, Result<PrimitiveSignature, SessionKeyError>>;
}

/// Arc wrapper for OwnerSigner trait objects.
pub type DynOwnerSigner = Arc<dyn OwnerSigner>;

/// Owner signer backed by a locally held private key. Never prompts.
pub struct LocalOwnerSigner {
    signer: PrivateKeySigner,
}

impl LocalOwnerSigner {
    /// Wrap a local private key signer.
    #[must_use]
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }
}

impl OwnerSigner for LocalOwnerSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    fn sign_hash(&self, hash: B256) -> BoxFuture<'_, Result<PrimitiveSignature, SessionKeyError>> {
        Box::pin(async move {
            self.signer
                .sign_hash(&hash)
                .await
                .map_err(|e| SessionKeyError::SigningFailed(e.to_string()))
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Owner signer that declines every request, modelling a user
    /// dismissing the wallet prompt.
    pub struct RejectingOwnerSigner {
        address: Address,
    }

    impl RejectingOwnerSigner {
        pub fn new(address: Address) -> Self {
            Self { address }
        }
    }

    impl OwnerSigner for RejectingOwnerSigner {
        fn address(&self) -> Address {
            self.address
        }

        fn sign_hash(
            &self,
            _hash: B256,
        ) -> BoxFuture<'_, Result<PrimitiveSignature, SessionKeyError>> {
            Box::pin(async { Err(SessionKeyError::SigningRejected) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PRIVATE_KEY: &str =
        "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[tokio::test]
    async fn test_local_signer_roundtrip() {
        let key = PrivateKeySigner::from_slice(&hex::decode(TEST_PRIVATE_KEY).unwrap()).unwrap();
        let owner = LocalOwnerSigner::new(key);

        let hash = B256::repeat_byte(0x42);
        let sig = owner.sign_hash(hash).await.unwrap();
        let recovered = sig.recover_address_from_prehash(&hash).unwrap();
        assert_eq!(recovered, owner.address());
    }

    #[tokio::test]
    async fn test_rejecting_signer_declines() {
        let owner = test_support::RejectingOwnerSigner::new(Address::ZERO);
        let result = owner.sign_hash(B256::ZERO).await;
        assert!(matches!(result, Err(SessionKeyError::SigningRejected)));
    }
}
