//! Cryptographic primitives for sealed volumes: key derivation, key
//! wrapping and the session key hierarchy.

pub mod kdf;
pub mod key_wrap;
pub mod keys;

use thiserror::Error;

/// Errors that can occur during cryptographic operations.
///
/// Wrong-credential and tampered-header failures are indistinguishable by
/// design: both produce the wrong key-encryption key, and the authentication
/// tag of the wrapped root key fails either way.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Unwrapping the root key failed its authentication check.
    ///
    /// Almost always a wrong passphrase or stale cached key; can also mean
    /// the wrapped-key section of the volume header was tampered with.
    #[error("key unwrap failed - incorrect credential or tampered volume header")]
    KeyUnwrapFailed,

    /// The scrypt computation was rejected, typically because the stored
    /// cost parameters are out of range.
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    /// The wrapped root key has the wrong length to even attempt unwrapping.
    #[error("invalid wrapped key length: expected {expected} bytes, got {actual}")]
    InvalidWrappedKeyLength { expected: usize, actual: usize },

    /// HKDF subkey expansion failed. Does not happen for the fixed output
    /// lengths this crate requests; kept as an error rather than a panic.
    #[error("subkey expansion failed")]
    KeyExpansionFailed,
}

pub use kdf::KdfParams;
pub use keys::{CachedKey, Credential, MasterKey, RootKey};
