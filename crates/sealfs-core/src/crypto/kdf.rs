//! Passphrase-based key derivation.
//!
//! A volume's key-encryption key (KEK) is derived from the passphrase with
//! scrypt, using the salt and cost parameters recorded in the volume header.
//! The 32-byte KEK is also what callers may cache (see
//! [`CachedKey`](super::CachedKey)) to skip the derivation cost on
//! subsequent opens.

use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroizing;

use super::CryptoError;

/// Length of the derived key-encryption key in bytes.
pub const KEK_LEN: usize = 32;

/// Length of the per-volume scrypt salt in bytes.
pub const SALT_LEN: usize = 16;

/// Default scrypt cost parameter (log2 of the iteration count).
pub const DEFAULT_LOG_N: u8 = 16;

/// Fixed scrypt block size parameter.
pub const SCRYPT_R: u32 = 8;

/// Fixed scrypt parallelism parameter.
pub const SCRYPT_P: u32 = 1;

/// Scrypt parameters persisted in the volume header.
///
/// `r` and `p` are stored explicitly even though creation always uses the
/// fixed values above, so a header written by a different tool with other
/// choices still derives correctly.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    #[serde_as(as = "Base64")]
    pub salt: Vec<u8>,
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl KdfParams {
    /// Generate fresh parameters with a random salt and the given cost.
    pub fn generate(log_n: u8) -> Self {
        use rand::RngCore;

        let mut salt = vec![0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        Self {
            salt,
            log_n,
            r: SCRYPT_R,
            p: SCRYPT_P,
        }
    }
}

/// Derive the key-encryption key from a passphrase.
///
/// The passphrase is NFC-normalized first, so visually identical inputs
/// typed on different platforms derive the same key. The normalized copy is
/// zeroed when this function returns, on every exit path.
pub fn derive_kek(
    passphrase: &str,
    params: &KdfParams,
) -> Result<Zeroizing<[u8; KEK_LEN]>, CryptoError> {
    let normalized = Zeroizing::new(passphrase.nfc().collect::<String>());

    let scrypt_params = scrypt::Params::new(params.log_n, params.r, params.p, KEK_LEN)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    let mut kek = Zeroizing::new([0u8; KEK_LEN]);
    scrypt::scrypt(
        normalized.as_bytes(),
        &params.salt,
        &scrypt_params,
        &mut kek[..],
    )
    .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(kek)
}
