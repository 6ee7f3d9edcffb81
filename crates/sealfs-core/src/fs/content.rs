//! Content block encryption and layout math.
//!
//! An encrypted file starts with an 18-byte content header (format version
//! plus a random 16-byte file ID), followed by fixed-size blocks. Each
//! block holds up to [`BLOCK_SIZE`] plaintext bytes and is stored as
//! `nonce || ciphertext || tag` with a fresh random nonce; the AEAD
//! associated data binds the block number and the file ID, so blocks cannot
//! be reordered within a file or transplanted between files without
//! failing authentication.
//!
//! A zero-length file is zero bytes on disk; the content header is created
//! lazily on first write, and a header-only file still reads as empty.

use std::path::PathBuf;

use aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::RngCore;
use thiserror::Error;

use crate::crypto::MasterKey;
use crate::header::CipherSuite;

/// Plaintext bytes per content block.
pub const BLOCK_SIZE: usize = 4096;

/// AEAD authentication tag length, identical for both suites.
pub const TAG_LEN: usize = 16;

/// Length of the per-file content header: version (2) + file ID (16).
pub const FILE_HEADER_LEN: usize = 18;

/// Length of the random per-file ID bound into every block's AAD.
pub const FILE_ID_LEN: usize = 16;

/// Content format version stored in each file's header.
pub const CONTENT_FORMAT_VERSION: u16 = 1;

/// Maximum plaintext span served by a single positioned read.
pub const MAX_IO_SIZE: usize = 128 * 1024;

#[derive(Error, Debug)]
pub enum ContentError {
    /// A block failed AEAD authentication. The ciphertext was tampered
    /// with, belongs to another file, or was encrypted under another key.
    #[error("block {block} failed authentication - ciphertext tampered or wrong key")]
    IntegrityViolation { block: u64 },

    /// A trailing block is too short to even carry a nonce and tag,
    /// typically after external truncation of the backing file.
    #[error("incomplete block {block}: {actual} bytes")]
    IncompleteBlock { block: u64, actual: usize },

    #[error("invalid content header: {reason}")]
    InvalidFileHeader { reason: String },

    /// AEAD encryption rejected the input. Does not happen for block-sized
    /// inputs; surfaced instead of panicking.
    #[error("block {block} encryption failed")]
    Encrypt { block: u64 },

    #[error("IO error on {path}: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// The per-session content cipher, built once from the volume's content
/// subkey.
pub(crate) enum ContentCipher {
    Aes256Gcm(Box<Aes256Gcm>),
    XChaCha20Poly1305(Box<XChaCha20Poly1305>),
}

impl ContentCipher {
    pub fn new(suite: CipherSuite, key: &MasterKey) -> Self {
        match suite {
            CipherSuite::Aes256Gcm => ContentCipher::Aes256Gcm(Box::new(Aes256Gcm::new(
                Key::<Aes256Gcm>::from_slice(key.content_key()),
            ))),
            CipherSuite::XChaCha20Poly1305 => {
                ContentCipher::XChaCha20Poly1305(Box::new(XChaCha20Poly1305::new(
                    chacha20poly1305::Key::from_slice(key.content_key()),
                )))
            }
        }
    }

    pub fn suite(&self) -> CipherSuite {
        match self {
            ContentCipher::Aes256Gcm(_) => CipherSuite::Aes256Gcm,
            ContentCipher::XChaCha20Poly1305(_) => CipherSuite::XChaCha20Poly1305,
        }
    }

    /// Encrypt one plaintext block. `plaintext` must be at most
    /// [`BLOCK_SIZE`] bytes; the result is `nonce || ciphertext || tag`.
    pub fn encrypt_block(
        &self,
        block_no: u64,
        file_id: &[u8; FILE_ID_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, ContentError> {
        debug_assert!(plaintext.len() <= BLOCK_SIZE);
        let nonce_len = self.suite().nonce_len();
        let aad = block_aad(block_no, file_id);

        let mut out = vec![0u8; nonce_len];
        rand::rng().fill_bytes(&mut out);

        let payload = Payload {
            msg: plaintext,
            aad: &aad,
        };
        let ciphertext = match self {
            ContentCipher::Aes256Gcm(cipher) => {
                cipher.encrypt(Nonce::from_slice(&out[..nonce_len]), payload)
            }
            ContentCipher::XChaCha20Poly1305(cipher) => {
                cipher.encrypt(XNonce::from_slice(&out[..nonce_len]), payload)
            }
        }
        .map_err(|_| ContentError::Encrypt { block: block_no })?;

        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt one stored block (`nonce || ciphertext || tag`).
    pub fn decrypt_block(
        &self,
        block_no: u64,
        file_id: &[u8; FILE_ID_LEN],
        stored: &[u8],
    ) -> Result<Vec<u8>, ContentError> {
        let nonce_len = self.suite().nonce_len();
        if stored.len() < nonce_len + TAG_LEN {
            return Err(ContentError::IncompleteBlock {
                block: block_no,
                actual: stored.len(),
            });
        }

        let aad = block_aad(block_no, file_id);
        let payload = Payload {
            msg: &stored[nonce_len..],
            aad: &aad,
        };
        match self {
            ContentCipher::Aes256Gcm(cipher) => {
                cipher.decrypt(Nonce::from_slice(&stored[..nonce_len]), payload)
            }
            ContentCipher::XChaCha20Poly1305(cipher) => {
                cipher.decrypt(XNonce::from_slice(&stored[..nonce_len]), payload)
            }
        }
        .map_err(|_| ContentError::IntegrityViolation { block: block_no })
    }
}

/// AAD binding a block to its position and file: block number (u64 BE)
/// followed by the file ID.
fn block_aad(block_no: u64, file_id: &[u8; FILE_ID_LEN]) -> [u8; 8 + FILE_ID_LEN] {
    let mut aad = [0u8; 8 + FILE_ID_LEN];
    aad[..8].copy_from_slice(&block_no.to_be_bytes());
    aad[8..].copy_from_slice(file_id);
    aad
}

/// Offset and size conversions between the logical (plaintext) file and its
/// backing ciphertext, fixed per cipher suite.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockLayout {
    /// Per-block ciphertext overhead: nonce + tag.
    overhead: usize,
}

impl BlockLayout {
    pub fn new(suite: CipherSuite) -> Self {
        Self {
            overhead: suite.nonce_len() + TAG_LEN,
        }
    }

    /// Stored size of a full block.
    pub fn cipher_block_size(&self) -> usize {
        BLOCK_SIZE + self.overhead
    }

    pub fn block_of_plain_off(&self, offset: u64) -> u64 {
        offset / BLOCK_SIZE as u64
    }

    pub fn plain_off_of_block(&self, block_no: u64) -> u64 {
        block_no * BLOCK_SIZE as u64
    }

    pub fn cipher_off_of_block(&self, block_no: u64) -> u64 {
        FILE_HEADER_LEN as u64 + block_no * self.cipher_block_size() as u64
    }

    /// Logical file size for a backing file of `cipher_size` bytes.
    ///
    /// Tolerant of trailing garbage: a dangling partial overhead is
    /// reported as zero extra bytes rather than underflowing; the read path
    /// surfaces the actual corruption.
    pub fn plain_size(&self, cipher_size: u64) -> u64 {
        let Some(body) = cipher_size.checked_sub(FILE_HEADER_LEN as u64) else {
            return 0;
        };
        if body == 0 {
            return 0;
        }
        let cbs = self.cipher_block_size() as u64;
        let blocks = body.div_ceil(cbs);
        body.saturating_sub(blocks * self.overhead as u64)
    }

    /// Backing file size for a logical file of `plain_size` bytes.
    pub fn cipher_size(&self, plain_size: u64) -> u64 {
        if plain_size == 0 {
            return 0;
        }
        let blocks = plain_size.div_ceil(BLOCK_SIZE as u64);
        FILE_HEADER_LEN as u64 + plain_size + blocks * self.overhead as u64
    }
}

/// Build a fresh content header with a random file ID.
pub(crate) fn new_file_header() -> ([u8; FILE_HEADER_LEN], [u8; FILE_ID_LEN]) {
    let mut id = [0u8; FILE_ID_LEN];
    rand::rng().fill_bytes(&mut id);

    let mut header = [0u8; FILE_HEADER_LEN];
    header[..2].copy_from_slice(&CONTENT_FORMAT_VERSION.to_be_bytes());
    header[2..].copy_from_slice(&id);
    (header, id)
}

/// Parse a content header, returning the file ID.
pub(crate) fn parse_file_header(buf: &[u8]) -> Result<[u8; FILE_ID_LEN], ContentError> {
    if buf.len() < FILE_HEADER_LEN {
        return Err(ContentError::InvalidFileHeader {
            reason: format!("expected {FILE_HEADER_LEN} bytes, got {}", buf.len()),
        });
    }
    let version = u16::from_be_bytes([buf[0], buf[1]]);
    if version != CONTENT_FORMAT_VERSION {
        return Err(ContentError::InvalidFileHeader {
            reason: format!("unsupported content format version {version}"),
        });
    }
    let mut id = [0u8; FILE_ID_LEN];
    id.copy_from_slice(&buf[2..FILE_HEADER_LEN]);
    Ok(id)
}
