//! Key material for an open volume.
//!
//! A volume has a single 32-byte root key, stored only in wrapped form in
//! the volume header. Session subkeys (content encryption, filename
//! encryption) are derived from the root key with HKDF-SHA256, so the two
//! concerns can never share cipher state. All key types zero their memory
//! on drop and redact themselves from `Debug` output.

use std::fmt;

use rand::RngCore;
use ring::hkdf;
use zeroize::Zeroizing;

use super::CryptoError;
use super::kdf::KEK_LEN;

/// Length of the root master key in bytes.
pub const ROOT_KEY_LEN: usize = 32;

/// Length of the content-encryption subkey in bytes.
pub const CONTENT_KEY_LEN: usize = 32;

/// Length of the filename-encryption subkey in bytes (AES-SIV-256 takes a
/// double-width key).
pub const NAME_KEY_LEN: usize = 64;

const HKDF_INFO_CONTENT: &[u8] = b"sealfs file content encryption";
const HKDF_INFO_NAMES: &[u8] = b"sealfs filename encryption";

/// The volume's root secret.
///
/// Exists in unwrapped form only transiently: during volume creation,
/// password changes, and at session open while subkeys are derived.
pub struct RootKey(Zeroizing<[u8; ROOT_KEY_LEN]>);

impl RootKey {
    /// Generate a fresh random root key (volume creation).
    pub fn random() -> Self {
        let mut bytes = Zeroizing::new([0u8; ROOT_KEY_LEN]);
        rand::rng().fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    pub(crate) fn from_bytes(bytes: Zeroizing<[u8; ROOT_KEY_LEN]>) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; ROOT_KEY_LEN] {
        &self.0
    }

    /// Derive the session subkeys.
    pub fn derive_master_key(&self) -> Result<MasterKey, CryptoError> {
        let mut content_key = Zeroizing::new([0u8; CONTENT_KEY_LEN]);
        let mut name_key = Zeroizing::new([0u8; NAME_KEY_LEN]);
        hkdf_expand(&self.0[..], HKDF_INFO_CONTENT, &mut content_key[..])?;
        hkdf_expand(&self.0[..], HKDF_INFO_NAMES, &mut name_key[..])?;
        Ok(MasterKey {
            content_key,
            name_key,
        })
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RootKey").field(&"[REDACTED]").finish()
    }
}

/// The derived subkeys a session actually encrypts with.
///
/// Owned exclusively by the session for its lifetime; zeroed on drop.
pub struct MasterKey {
    content_key: Zeroizing<[u8; CONTENT_KEY_LEN]>,
    name_key: Zeroizing<[u8; NAME_KEY_LEN]>,
}

impl MasterKey {
    pub(crate) fn content_key(&self) -> &[u8; CONTENT_KEY_LEN] {
        &self.content_key
    }

    pub(crate) fn name_key(&self) -> &[u8; NAME_KEY_LEN] {
        &self.name_key
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("content_key", &"[REDACTED]")
            .field("name_key", &"[REDACTED]")
            .finish()
    }
}

/// A cached key-encryption key.
///
/// This is the scrypt output handed back by
/// [`open_with_key_cache`](crate::vault::SessionRegistry::open_with_key_cache);
/// callers may store it and pass it back as [`Credential::CachedKey`] to
/// skip the KDF on later opens. It grants the same access as the passphrase
/// and must be protected accordingly. Zeroed on drop.
#[derive(Clone)]
pub struct CachedKey(Zeroizing<[u8; KEK_LEN]>);

impl CachedKey {
    pub(crate) fn new(bytes: Zeroizing<[u8; KEK_LEN]>) -> Self {
        Self(bytes)
    }

    /// Reconstruct a cached key from bytes persisted by the caller.
    pub fn from_bytes(bytes: [u8; KEK_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Raw key bytes, for callers that persist the cache themselves.
    pub fn as_bytes(&self) -> &[u8; KEK_LEN] {
        &self.0
    }
}

impl fmt::Debug for CachedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CachedKey").field(&"[REDACTED]").finish()
    }
}

/// Credential presented when opening a volume or changing its password.
#[derive(Clone, Copy)]
pub enum Credential<'a> {
    /// Run the volume's KDF over a passphrase.
    Passphrase(&'a str),
    /// Use a previously derived KEK directly, skipping the KDF.
    CachedKey(&'a CachedKey),
}

impl fmt::Debug for Credential<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Passphrase(_) => f.write_str("Credential::Passphrase([REDACTED])"),
            Credential::CachedKey(_) => f.write_str("Credential::CachedKey([REDACTED])"),
        }
    }
}

struct HkdfLen(usize);

impl hkdf::KeyType for HkdfLen {
    fn len(&self) -> usize {
        self.0
    }
}

fn hkdf_expand(secret: &[u8], info: &[u8], out: &mut [u8]) -> Result<(), CryptoError> {
    let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, &[]).extract(secret);
    let info_parts = [info];
    let okm = prk
        .expand(&info_parts, HkdfLen(out.len()))
        .map_err(|_| CryptoError::KeyExpansionFailed)?;
    okm.fill(out).map_err(|_| CryptoError::KeyExpansionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subkey_derivation_is_deterministic() {
        let root = RootKey::from_bytes(Zeroizing::new([7u8; ROOT_KEY_LEN]));
        let a = root.derive_master_key().unwrap();
        let b = root.derive_master_key().unwrap();
        assert_eq!(a.content_key(), b.content_key());
        assert_eq!(a.name_key(), b.name_key());
    }

    #[test]
    fn subkeys_are_domain_separated() {
        let root = RootKey::from_bytes(Zeroizing::new([7u8; ROOT_KEY_LEN]));
        let key = root.derive_master_key().unwrap();
        assert_ne!(&key.content_key()[..], &key.name_key()[..32]);
    }

    #[test]
    fn different_roots_different_subkeys() {
        let a = RootKey::from_bytes(Zeroizing::new([1u8; ROOT_KEY_LEN]))
            .derive_master_key()
            .unwrap();
        let b = RootKey::from_bytes(Zeroizing::new([2u8; ROOT_KEY_LEN]))
            .derive_master_key()
            .unwrap();
        assert_ne!(a.content_key(), b.content_key());
    }

    #[test]
    fn random_root_keys_differ() {
        assert_ne!(RootKey::random().as_bytes(), RootKey::random().as_bytes());
    }

    #[test]
    fn debug_output_is_redacted() {
        let root = RootKey::random();
        let key = root.derive_master_key().unwrap();
        let cached = CachedKey::from_bytes([3u8; KEK_LEN]);
        for rendered in [
            format!("{root:?}"),
            format!("{key:?}"),
            format!("{cached:?}"),
            format!("{:?}", Credential::Passphrase("secret")),
        ] {
            assert!(rendered.contains("REDACTED"), "leaky debug: {rendered}");
            assert!(!rendered.contains("secret"));
        }
    }
}
