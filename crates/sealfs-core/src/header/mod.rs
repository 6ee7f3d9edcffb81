//! The volume header file.
//!
//! Every volume carries a single JSON header, `sealfs.conf`, at its root:
//! format version, creator tag, cipher suite, filename mode, scrypt
//! parameters, the wrapped root key and a structural checksum. The checksum
//! is a plain SHA-256 over the canonical serialization (no key involved) so
//! corruption is detected before any KDF work; authenticity of the key
//! material itself is enforced by the GCM tag on the wrapped root key.
//!
//! The header is written exactly once at creation and rewritten only by
//! [`change_password`], which replaces just the KDF parameters and the
//! wrapped-key section. All writes go through a temp file and rename, so a
//! crash can never leave a header that parses but is incomplete.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use zeroize::Zeroizing;

use crate::crypto::kdf::{self, KdfParams};
use crate::crypto::key_wrap::{unwrap_root_key, wrap_root_key};
use crate::crypto::{CachedKey, Credential, CryptoError, RootKey};

/// Name of the header file inside the volume root.
pub const HEADER_FILE_NAME: &str = "sealfs.conf";

/// On-disk format version this library reads and writes.
pub const FORMAT_VERSION: u16 = 1;

pub(crate) const TMP_SUFFIX: &str = ".tmp";

/// Content cipher used for file blocks.
///
/// Both are AEADs with a 16-byte tag; they differ in nonce width. The
/// extended-nonce suite makes random per-block nonces comfortable even for
/// very large volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherSuite {
    /// AES-256-GCM, 12-byte nonces.
    Aes256Gcm,
    /// XChaCha20-Poly1305, 24-byte nonces.
    XChaCha20Poly1305,
}

impl CipherSuite {
    pub fn as_str(self) -> &'static str {
        match self {
            CipherSuite::Aes256Gcm => "AES256_GCM",
            CipherSuite::XChaCha20Poly1305 => "XCHACHA20_POLY1305",
        }
    }

    /// Nonce length in bytes for content blocks.
    pub fn nonce_len(self) -> usize {
        match self {
            CipherSuite::Aes256Gcm => 12,
            CipherSuite::XChaCha20Poly1305 => 24,
        }
    }
}

impl FromStr for CipherSuite {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AES256_GCM" => Ok(CipherSuite::Aes256Gcm),
            "XCHACHA20_POLY1305" => Ok(CipherSuite::XChaCha20Poly1305),
            _ => Err(HeaderError::UnknownCipherSuite(s.to_owned())),
        }
    }
}

impl fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether directory-entry names are encrypted or stored as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameMode {
    Encrypted,
    Plaintext,
}

impl FilenameMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FilenameMode::Encrypted => "ENCRYPTED",
            FilenameMode::Plaintext => "PLAINTEXT",
        }
    }
}

impl FromStr for FilenameMode {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENCRYPTED" => Ok(FilenameMode::Encrypted),
            "PLAINTEXT" => Ok(FilenameMode::Plaintext),
            _ => Err(HeaderError::UnknownFilenameMode(s.to_owned())),
        }
    }
}

impl fmt::Display for FilenameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for volume creation.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub cipher_suite: CipherSuite,
    pub filename_mode: FilenameMode,
    /// scrypt cost as log2 of the iteration count.
    pub kdf_log_n: u8,
    /// Free-form tool identifier recorded in the header. Informational only.
    pub creator: String,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            cipher_suite: CipherSuite::Aes256Gcm,
            filename_mode: FilenameMode::Encrypted,
            kdf_log_n: kdf::DEFAULT_LOG_N,
            creator: concat!("sealfs ", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("a volume already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("target directory {0} is not empty")]
    DirectoryNotEmpty(PathBuf),

    #[error("unsupported volume format version {0}")]
    UnsupportedVersion(u16),

    #[error("volume header checksum mismatch - header corrupted or truncated")]
    ChecksumMismatch,

    #[error("unknown cipher suite {0:?}")]
    UnknownCipherSuite(String),

    #[error("unknown filename mode {0:?}")]
    UnknownFilenameMode(String),

    #[error("malformed volume header: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("IO error on {path}: {source}")]
    Io {
        #[source]
        source: io::Error,
        path: PathBuf,
    },
}

impl HeaderError {
    fn io(source: io::Error, path: impl Into<PathBuf>) -> Self {
        HeaderError::Io {
            source,
            path: path.into(),
        }
    }
}

/// Serialized form of the header. Field order is the canonical order the
/// checksum is computed over.
#[serde_as]
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HeaderFile {
    version: u16,
    creator: String,
    cipher_suite: String,
    filename_mode: String,
    kdf: KdfParams,
    #[serde_as(as = "Base64")]
    wrapped_root_key: Vec<u8>,
    #[serde_as(as = "Base64")]
    checksum: Vec<u8>,
}

impl HeaderFile {
    fn compute_checksum(&self) -> Result<Vec<u8>, HeaderError> {
        let mut unsummed = self.clone();
        unsummed.checksum = Vec::new();
        let canonical = serde_json::to_vec(&unsummed)?;
        let digest = ring::digest::digest(&ring::digest::SHA256, &canonical);
        Ok(digest.as_ref().to_vec())
    }
}

/// A validated, loaded volume header.
pub struct VolumeHeader {
    cipher_suite: CipherSuite,
    filename_mode: FilenameMode,
    creator: String,
    kdf: KdfParams,
    wrapped_root_key: Vec<u8>,
}

impl VolumeHeader {
    /// Path of the header file inside a volume root.
    pub fn path_in(root: &Path) -> PathBuf {
        root.join(HEADER_FILE_NAME)
    }

    /// Create a new header at `root` with a fresh random root key wrapped
    /// under `passphrase`.
    ///
    /// Fails with [`HeaderError::AlreadyExists`] /
    /// [`HeaderError::DirectoryNotEmpty`] when `root` already holds
    /// anything; creates `root` itself if missing.
    #[instrument(level = "info", skip(passphrase, options), fields(root = %root.display()))]
    pub fn create(
        root: &Path,
        passphrase: &str,
        options: &CreateOptions,
    ) -> Result<Self, HeaderError> {
        let header_path = Self::path_in(root);
        if header_path.exists() {
            return Err(HeaderError::AlreadyExists(root.to_path_buf()));
        }
        if root.exists() {
            let mut entries =
                fs::read_dir(root).map_err(|e| HeaderError::io(e, root.to_path_buf()))?;
            if entries.next().is_some() {
                return Err(HeaderError::DirectoryNotEmpty(root.to_path_buf()));
            }
        } else {
            fs::create_dir_all(root).map_err(|e| HeaderError::io(e, root.to_path_buf()))?;
        }

        let kdf = KdfParams::generate(options.kdf_log_n);
        let kek = kdf::derive_kek(passphrase, &kdf)?;
        let root_key = RootKey::random();
        let wrapped_root_key = wrap_root_key(&root_key, &kek)?;

        let mut raw = HeaderFile {
            version: FORMAT_VERSION,
            creator: options.creator.clone(),
            cipher_suite: options.cipher_suite.as_str().to_owned(),
            filename_mode: options.filename_mode.as_str().to_owned(),
            kdf,
            wrapped_root_key,
            checksum: Vec::new(),
        };
        raw.checksum = raw.compute_checksum()?;
        write_atomically(root, &raw)?;

        info!(
            cipher_suite = %options.cipher_suite,
            filename_mode = %options.filename_mode,
            log_n = options.kdf_log_n,
            "volume header created"
        );

        Ok(Self {
            cipher_suite: options.cipher_suite,
            filename_mode: options.filename_mode,
            creator: options.creator.clone(),
            kdf: raw.kdf,
            wrapped_root_key: raw.wrapped_root_key,
        })
    }

    /// Load and validate the header of an existing volume.
    ///
    /// No credential is needed; this only proves structural integrity,
    /// not authenticity of the key material.
    #[instrument(level = "debug", fields(root = %root.display()))]
    pub fn load(root: &Path) -> Result<Self, HeaderError> {
        let path = Self::path_in(root);
        let bytes = fs::read(&path).map_err(|e| HeaderError::io(e, &path))?;
        let raw: HeaderFile = serde_json::from_slice(&bytes)?;

        // Version gates everything else: an unknown format must fail hard,
        // never be best-effort parsed.
        if raw.version != FORMAT_VERSION {
            warn!(version = raw.version, "unsupported volume format");
            return Err(HeaderError::UnsupportedVersion(raw.version));
        }
        if raw.compute_checksum()? != raw.checksum {
            warn!("volume header checksum mismatch");
            return Err(HeaderError::ChecksumMismatch);
        }

        let cipher_suite = raw.cipher_suite.parse()?;
        let filename_mode = raw.filename_mode.parse()?;
        debug!(%cipher_suite, %filename_mode, "volume header loaded");

        Ok(Self {
            cipher_suite,
            filename_mode,
            creator: raw.creator,
            kdf: raw.kdf,
            wrapped_root_key: raw.wrapped_root_key,
        })
    }

    /// Unwrap the root key with the given credential.
    ///
    /// Also returns the KEK as a [`CachedKey`] so callers can skip the KDF
    /// next time. Fails with a wrapped [`CryptoError::KeyUnwrapFailed`] on a
    /// wrong credential.
    pub fn unwrap_root_key(
        &self,
        credential: Credential<'_>,
    ) -> Result<(RootKey, CachedKey), HeaderError> {
        let kek = match credential {
            Credential::Passphrase(passphrase) => kdf::derive_kek(passphrase, &self.kdf)?,
            Credential::CachedKey(cached) => Zeroizing::new(*cached.as_bytes()),
        };
        let root_key = unwrap_root_key(&self.wrapped_root_key, &kek)?;
        Ok((root_key, CachedKey::new(kek)))
    }

    pub fn cipher_suite(&self) -> CipherSuite {
        self.cipher_suite
    }

    pub fn filename_mode(&self) -> FilenameMode {
        self.filename_mode
    }

    pub fn creator(&self) -> &str {
        &self.creator
    }

    /// scrypt cost as log2 of the iteration count.
    pub fn kdf_log_n(&self) -> u8 {
        self.kdf.log_n
    }
}

impl fmt::Debug for VolumeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeHeader")
            .field("cipher_suite", &self.cipher_suite)
            .field("filename_mode", &self.filename_mode)
            .field("creator", &self.creator)
            .field("kdf_log_n", &self.kdf.log_n)
            .finish_non_exhaustive()
    }
}

/// Re-key the volume: verify `old_credential`, draw a fresh salt, and
/// rewrite only the KDF parameters and wrapped-key section of the header.
///
/// File content is untouched (the root key does not change), and the
/// rewrite is atomic: a failure leaves the old header in place, so the old
/// credential keeps working.
///
/// Returns the new KEK for caller-side caching.
#[instrument(level = "info", skip(old_credential, new_passphrase), fields(root = %root.display()))]
pub fn change_password(
    root: &Path,
    old_credential: Credential<'_>,
    new_passphrase: &str,
) -> Result<CachedKey, HeaderError> {
    let header = VolumeHeader::load(root)?;
    let (root_key, _) = header.unwrap_root_key(old_credential)?;

    let kdf = KdfParams::generate(header.kdf.log_n);
    let kek = kdf::derive_kek(new_passphrase, &kdf)?;
    let wrapped_root_key = wrap_root_key(&root_key, &kek)?;

    let mut raw = HeaderFile {
        version: FORMAT_VERSION,
        creator: header.creator,
        cipher_suite: header.cipher_suite.as_str().to_owned(),
        filename_mode: header.filename_mode.as_str().to_owned(),
        kdf,
        wrapped_root_key,
        checksum: Vec::new(),
    };
    raw.checksum = raw.compute_checksum()?;
    write_atomically(root, &raw)?;

    info!("volume password changed");
    Ok(CachedKey::new(kek))
}

/// Write the header via `sealfs.conf.tmp` + rename, fsyncing before the
/// rename so a crash leaves either the old or the new header, never a torn
/// one.
fn write_atomically(root: &Path, raw: &HeaderFile) -> Result<(), HeaderError> {
    let final_path = VolumeHeader::path_in(root);
    let tmp_path = root.join(format!("{HEADER_FILE_NAME}{TMP_SUFFIX}"));

    // A stale temp file from a crashed writer must not block us.
    let _ = fs::remove_file(&tmp_path);

    let result = (|| {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .map_err(|e| HeaderError::io(e, &tmp_path))?;
        let mut json = serde_json::to_vec_pretty(raw)?;
        json.push(b'\n');
        file.write_all(&json)
            .map_err(|e| HeaderError::io(e, &tmp_path))?;
        file.sync_all().map_err(|e| HeaderError::io(e, &tmp_path))?;
        drop(file);
        fs::rename(&tmp_path, &final_path).map_err(|e| HeaderError::io(e, &final_path))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
