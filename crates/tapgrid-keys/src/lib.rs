//! Owner key management and delegated session keys.
//!
//! A session key is a fresh, single-use keypair authorized by one owner
//! signature over a canonical delegation message. Every delegate-signed
//! order travels with the delegation bundle so any verifier can recover
//! the owner from the bundle, match it against the claimed trader, and
//! check expiry before trusting the order signature.

pub mod error;
pub mod keys;
pub mod owner;
pub mod session_key;

pub use error::{KeyError, SessionKeyError};
pub use keys::{KeyManager, KeySource};
pub use owner::{DynOwnerSigner, LocalOwnerSigner, OwnerSigner};
pub use session_key::{SessionKey, SessionKeyBundle, SessionKeyManager, SESSION_KEY_PURPOSE};
