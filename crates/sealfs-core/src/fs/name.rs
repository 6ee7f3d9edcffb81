//! Path segment encryption.
//!
//! Each directory holds a random 16-byte IV in a `sealfs.diriv` file.
//! Entry names are encrypted segment by segment with AES-SIV-256 keyed by
//! the volume's filename subkey, binding the directory IV as associated
//! data, and encoded base64url without padding. AES-SIV is deterministic,
//! so lookup-by-name works without decrypting a whole directory, and the
//! synthetic IV makes distinct names collide only with SIV forgery odds.
//!
//! Because the binding is to the directory's own IV (which travels with the
//! directory), renaming a directory re-encrypts only its own entry name,
//! never its descendants'.
//!
//! In plaintext mode segments pass through untouched apart from validation.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use aes_siv::KeyInit;
use aes_siv::siv::Aes256Siv;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use generic_array::GenericArray;
use rand::RngCore;
use thiserror::Error;
use tracing::trace;

use crate::crypto::MasterKey;
use crate::header::{FilenameMode, HEADER_FILE_NAME};

/// Name of the per-directory IV file.
pub const DIRIV_FILE_NAME: &str = "sealfs.diriv";

/// Length of a directory IV in bytes.
pub const DIR_IV_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum NameError {
    /// SIV encryption rejected the input. Does not happen for valid
    /// segments; surfaced instead of panicking.
    #[error("filename encryption failed for segment {name:?}")]
    Encrypt { name: String },

    /// The stored name does not authenticate under this directory's IV -
    /// foreign file, corruption, or tampering.
    #[error("failed to decrypt directory entry name {name:?}")]
    Decrypt { name: String },

    #[error("encrypted name {name:?} is not valid base64url")]
    InvalidEncoding {
        name: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("decrypted name is not valid UTF-8")]
    NotUtf8,

    /// Empty, `.`/`..`, embedded `/` or NUL, or a reserved name in
    /// plaintext mode.
    #[error("invalid path segment {0:?}")]
    InvalidSegment(String),

    #[error("directory IV at {path} has wrong length {actual}")]
    InvalidDirIv { path: PathBuf, actual: usize },

    #[error("IO error on {path}: {source}")]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

impl NameError {
    fn io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        NameError::Io {
            source,
            path: path.into(),
        }
    }
}

/// Validate a single plaintext path segment.
///
/// In plaintext mode the reserved header/IV names are also rejected, since
/// they would collide with volume metadata on disk. Encrypted names can
/// never collide with them: `.` does not occur in base64url.
pub fn validate_segment(name: &str, mode: FilenameMode) -> Result<(), NameError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(NameError::InvalidSegment(name.to_owned()));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(NameError::InvalidSegment(name.to_owned()));
    }
    if mode == FilenameMode::Plaintext && (name == HEADER_FILE_NAME || name == DIRIV_FILE_NAME) {
        return Err(NameError::InvalidSegment(name.to_owned()));
    }
    Ok(())
}

/// Encrypt one path segment under its parent directory's IV.
pub fn encrypt_segment(
    name: &str,
    dir_iv: &[u8; DIR_IV_LEN],
    key: &MasterKey,
) -> Result<String, NameError> {
    let mut siv = Aes256Siv::new(GenericArray::from_slice(key.name_key()));
    let ciphertext = siv
        .encrypt([dir_iv.as_slice()], name.as_bytes())
        .map_err(|_| NameError::Encrypt {
            name: name.to_owned(),
        })?;
    Ok(URL_SAFE_NO_PAD.encode(ciphertext))
}

/// Decrypt one stored segment under its parent directory's IV.
pub fn decrypt_segment(
    encrypted_name: &str,
    dir_iv: &[u8; DIR_IV_LEN],
    key: &MasterKey,
) -> Result<String, NameError> {
    let decoded =
        URL_SAFE_NO_PAD
            .decode(encrypted_name.as_bytes())
            .map_err(|source| NameError::InvalidEncoding {
                name: encrypted_name.to_owned(),
                source,
            })?;

    let mut siv = Aes256Siv::new(GenericArray::from_slice(key.name_key()));
    let plaintext =
        siv.decrypt([dir_iv.as_slice()], &decoded)
            .map_err(|_| NameError::Decrypt {
                name: encrypted_name.to_owned(),
            })?;

    String::from_utf8(plaintext).map_err(|_| NameError::NotUtf8)
}

/// Read a directory's IV from its `sealfs.diriv` file.
pub fn read_dir_iv(backing_dir: &Path) -> Result<[u8; DIR_IV_LEN], NameError> {
    let path = backing_dir.join(DIRIV_FILE_NAME);
    let bytes = fs::read(&path).map_err(|e| NameError::io(e, &path))?;
    let iv: [u8; DIR_IV_LEN] = bytes.as_slice().try_into().map_err(|_| {
        NameError::InvalidDirIv {
            path,
            actual: bytes.len(),
        }
    })?;
    Ok(iv)
}

/// Create a fresh random IV file in a directory. Fails if one exists.
pub fn write_dir_iv(backing_dir: &Path) -> Result<(), NameError> {
    let path = backing_dir.join(DIRIV_FILE_NAME);
    let mut iv = [0u8; DIR_IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(|e| NameError::io(e, &path))?;
    file.write_all(&iv).map_err(|e| NameError::io(e, &path))?;
    file.sync_all().map_err(|e| NameError::io(e, &path))?;
    trace!(path = %path.display(), "directory IV written");
    Ok(())
}
