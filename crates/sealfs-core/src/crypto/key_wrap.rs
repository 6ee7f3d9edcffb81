//! Root key wrapping.
//!
//! The root key is stored in the volume header encrypted under the
//! scrypt-derived KEK with AES-256-GCM. The GCM tag doubles as the
//! credential-verification block: a wrong passphrase produces a wrong KEK,
//! which fails authentication here. The wrapped blob is
//! `nonce || ciphertext || tag`.

use aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use zeroize::Zeroizing;

use super::CryptoError;
use super::kdf::KEK_LEN;
use super::keys::{ROOT_KEY_LEN, RootKey};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Total length of a wrapped root key blob.
pub const WRAPPED_ROOT_KEY_LEN: usize = NONCE_LEN + ROOT_KEY_LEN + TAG_LEN;

/// Wrap the root key under the KEK. A fresh nonce is drawn per call, so
/// rewrapping during a password change never reuses one.
pub fn wrap_root_key(root: &RootKey, kek: &[u8; KEK_LEN]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(kek));

    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), root.as_bytes().as_slice())
        .map_err(|_| CryptoError::KeyUnwrapFailed)?;

    let mut wrapped = Vec::with_capacity(WRAPPED_ROOT_KEY_LEN);
    wrapped.extend_from_slice(&nonce);
    wrapped.extend_from_slice(&ciphertext);
    Ok(wrapped)
}

/// Unwrap the root key. Fails with [`CryptoError::KeyUnwrapFailed`] when the
/// KEK is wrong or the blob was tampered with.
pub fn unwrap_root_key(wrapped: &[u8], kek: &[u8; KEK_LEN]) -> Result<RootKey, CryptoError> {
    if wrapped.len() != WRAPPED_ROOT_KEY_LEN {
        return Err(CryptoError::InvalidWrappedKeyLength {
            expected: WRAPPED_ROOT_KEY_LEN,
            actual: wrapped.len(),
        });
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(kek));
    let nonce = Nonce::from_slice(&wrapped[..NONCE_LEN]);

    let plaintext = Zeroizing::new(
        cipher
            .decrypt(nonce, &wrapped[NONCE_LEN..])
            .map_err(|_| CryptoError::KeyUnwrapFailed)?,
    );

    let mut root = Zeroizing::new([0u8; ROOT_KEY_LEN]);
    root.copy_from_slice(&plaintext);
    Ok(RootKey::from_bytes(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_unwrap_round_trip() {
        let root = RootKey::random();
        let kek = [0x42u8; KEK_LEN];
        let wrapped = wrap_root_key(&root, &kek).unwrap();
        assert_eq!(wrapped.len(), WRAPPED_ROOT_KEY_LEN);
        let unwrapped = unwrap_root_key(&wrapped, &kek).unwrap();
        assert_eq!(root.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn wrong_kek_fails() {
        let root = RootKey::random();
        let wrapped = wrap_root_key(&root, &[0x42u8; KEK_LEN]).unwrap();
        assert!(matches!(
            unwrap_root_key(&wrapped, &[0x43u8; KEK_LEN]),
            Err(CryptoError::KeyUnwrapFailed)
        ));
    }

    #[test]
    fn tampered_blob_fails() {
        let root = RootKey::random();
        let kek = [0x42u8; KEK_LEN];
        let mut wrapped = wrap_root_key(&root, &kek).unwrap();
        for i in 0..wrapped.len() {
            wrapped[i] ^= 0x01;
            assert!(
                unwrap_root_key(&wrapped, &kek).is_err(),
                "bit flip at byte {i} went undetected"
            );
            wrapped[i] ^= 0x01;
        }
    }

    #[test]
    fn truncated_blob_fails_with_length_error() {
        let root = RootKey::random();
        let kek = [0x42u8; KEK_LEN];
        let wrapped = wrap_root_key(&root, &kek).unwrap();
        assert!(matches!(
            unwrap_root_key(&wrapped[..WRAPPED_ROOT_KEY_LEN - 1], &kek),
            Err(CryptoError::InvalidWrappedKeyLength { .. })
        ));
    }

    #[test]
    fn rewrapping_produces_distinct_blobs() {
        // Fresh nonce per wrap: same key, same KEK, different ciphertext.
        let root = RootKey::random();
        let kek = [0x42u8; KEK_LEN];
        let a = wrap_root_key(&root, &kek).unwrap();
        let b = wrap_root_key(&root, &kek).unwrap();
        assert_ne!(a, b);
    }
}
