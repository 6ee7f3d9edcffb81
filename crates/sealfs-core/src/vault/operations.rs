//! Operations on an open volume.
//!
//! A [`Volume`] is one authenticated instance of an encrypted volume: the
//! derived master key, the content cipher, the per-directory IV cache and
//! the table of open file handles. All operations take logical paths rooted
//! at the volume root (`/a/b/c`); resolution walks the path segment by
//! segment through the filename codec.
//!
//! Operations on different volumes are fully independent. Within one
//! volume, each open file is protected by its own lock; a single handle
//! must still be serialized by the caller for overlapping writes, as the
//! engine makes no atomicity promise across them.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

use moka::sync::Cache;
use rand::RngCore;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::crypto::{CachedKey, Credential, CryptoError, MasterKey};
use crate::fs::content::{BlockLayout, ContentCipher, ContentError, MAX_IO_SIZE};
use crate::fs::file::EncryptedFile;
use crate::fs::name::{self, DIR_IV_LEN, DIRIV_FILE_NAME, NameError};
use crate::header::{FilenameMode, HEADER_FILE_NAME, HeaderError, VolumeHeader};
use crate::vault::handles::{FileHandle, HandleTable};

/// Default permission bits for files created through a volume.
pub const FILE_MODE: u32 = 0o660;

/// Default permission bits for directories created through a volume.
pub const DIR_MODE: u32 = 0o770;

const DIR_IV_CACHE_CAPACITY: u64 = 1024;

/// Error taxonomy for all caller-facing volume operations.
///
/// Cryptographic and structural failures are never downgraded to an empty
/// result: a failed credential, a corrupt header and a tampered block each
/// surface as their own kind, distinguishable from "legitimately absent".
#[derive(Error, Debug)]
pub enum VolumeError {
    /// Wrong passphrase or cached key (or a tampered key-wrapping section,
    /// which is cryptographically indistinguishable).
    #[error("incorrect passphrase or cached key")]
    InvalidCredential,

    /// The volume header is structurally bad: unknown format version,
    /// checksum mismatch, or unparseable content.
    #[error("corrupt volume: {reason}")]
    CorruptVolume { reason: String },

    /// A content block failed its authentication tag on read.
    #[error("content block {block} failed authentication - possible tampering")]
    IntegrityViolation { block: u64 },

    #[error("{path:?} already exists")]
    AlreadyExists { path: String },

    #[error("{path:?} not found")]
    NotFound { path: String },

    #[error("{path:?} is not a directory")]
    NotADirectory { path: String },

    /// The session was closed; closed is terminal.
    #[error("session is closed")]
    SessionClosed,

    /// Unknown handle, already-closed handle, or a write on a read handle.
    #[error("invalid file handle {handle}")]
    InvalidHandle { handle: FileHandle },

    /// No free session or file-handle slots.
    #[error("no free {what} slots")]
    AllocationExhausted { what: &'static str },

    /// Empty segment, `.`/`..`, embedded `/` or NUL, or a reserved name in
    /// plaintext mode.
    #[error("invalid name {name:?}")]
    InvalidName { name: String },

    /// Underlying storage failure, wrapped with the causing path.
    #[error("IO error on {path:?}: {source}")]
    IOFailure {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl VolumeError {
    fn io(source: io::Error, path: impl Into<String>) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => VolumeError::NotFound { path },
            io::ErrorKind::NotADirectory => VolumeError::NotADirectory { path },
            _ => VolumeError::IOFailure { path, source },
        }
    }
}

impl From<HeaderError> for VolumeError {
    fn from(e: HeaderError) -> Self {
        match e {
            HeaderError::AlreadyExists(p) | HeaderError::DirectoryNotEmpty(p) => {
                VolumeError::AlreadyExists {
                    path: p.display().to_string(),
                }
            }
            HeaderError::Crypto(CryptoError::KeyUnwrapFailed) => VolumeError::InvalidCredential,
            HeaderError::Io { source, path } => {
                VolumeError::io(source, path.display().to_string())
            }
            other => VolumeError::CorruptVolume {
                reason: other.to_string(),
            },
        }
    }
}

impl From<CryptoError> for VolumeError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::KeyUnwrapFailed => VolumeError::InvalidCredential,
            other => VolumeError::CorruptVolume {
                reason: other.to_string(),
            },
        }
    }
}

impl From<ContentError> for VolumeError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::IntegrityViolation { block } => VolumeError::IntegrityViolation { block },
            ContentError::Io { source, path } => {
                VolumeError::io(source, path.display().to_string())
            }
            other => VolumeError::CorruptVolume {
                reason: other.to_string(),
            },
        }
    }
}

impl From<NameError> for VolumeError {
    fn from(e: NameError) -> Self {
        match e {
            NameError::InvalidSegment(name) => VolumeError::InvalidName { name },
            NameError::Io { source, path } => VolumeError::io(source, path.display().to_string()),
            other => VolumeError::CorruptVolume {
                reason: other.to_string(),
            },
        }
    }
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    RegularFile,
}

/// One decrypted directory entry. Produced transiently by [`Volume::list_dir`].
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Logical (plaintext) size in bytes; zero for directories.
    pub size: u64,
    pub modified: SystemTime,
}

/// Attributes of a single path.
#[derive(Debug, Clone)]
pub struct Attributes {
    pub kind: EntryKind,
    /// Logical (plaintext) size in bytes; zero for directories.
    pub size: u64,
    pub modified: SystemTime,
    /// Unix permission bits; zero on platforms without them.
    pub mode: u32,
}

/// One open, authenticated instance of an encrypted volume.
pub struct Volume {
    root: PathBuf,
    master_key: MasterKey,
    cipher: ContentCipher,
    layout: BlockLayout,
    filename_mode: FilenameMode,
    handles: HandleTable,
    dir_ivs: Cache<String, [u8; DIR_IV_LEN]>,
    closed: AtomicBool,
}

impl Volume {
    /// Open a volume with the given credential.
    ///
    /// Also returns the derived KEK as a [`CachedKey`]; callers that keep
    /// it can skip the KDF cost on later opens.
    #[instrument(level = "info", skip(credential), fields(root = %root.display()))]
    pub fn open(root: &Path, credential: Credential<'_>) -> Result<(Self, CachedKey), VolumeError> {
        let header = VolumeHeader::load(root)?;
        let (root_key, cached) = header.unwrap_root_key(credential)?;
        let master_key = root_key.derive_master_key()?;
        let cipher = ContentCipher::new(header.cipher_suite(), &master_key);
        let layout = BlockLayout::new(header.cipher_suite());

        info!(cipher_suite = %header.cipher_suite(), filename_mode = %header.filename_mode(), "volume opened");
        Ok((
            Self {
                root: root.to_path_buf(),
                master_key,
                cipher,
                layout,
                filename_mode: header.filename_mode(),
                handles: HandleTable::new(),
                dir_ivs: Cache::builder().max_capacity(DIR_IV_CACHE_CAPACITY).build(),
                closed: AtomicBool::new(false),
            },
            cached,
        ))
    }

    /// Mark the volume closed, dropping all open handles and cached state.
    /// Terminal: every later operation fails with [`VolumeError::SessionClosed`].
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.handles.clear();
        self.dir_ivs.invalidate_all();
        debug!(root = %self.root.display(), "volume closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn filename_mode(&self) -> FilenameMode {
        self.filename_mode
    }

    fn check_open(&self) -> Result<(), VolumeError> {
        if self.is_closed() {
            Err(VolumeError::SessionClosed)
        } else {
            Ok(())
        }
    }

    // ==================== path resolution ====================

    /// The directory IV for a resolved directory, through the cache.
    fn dir_iv(&self, logical: &str, backing: &Path) -> Result<[u8; DIR_IV_LEN], VolumeError> {
        if let Some(iv) = self.dir_ivs.get(logical) {
            return Ok(iv);
        }
        match name::read_dir_iv(backing) {
            Ok(iv) => {
                self.dir_ivs.insert(logical.to_owned(), iv);
                Ok(iv)
            }
            Err(NameError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                // Missing IV: distinguish "no such directory" from "walked
                // through a file" from "directory lost its IV".
                if backing.is_dir() {
                    Err(VolumeError::CorruptVolume {
                        reason: format!("directory {logical:?} has no IV file"),
                    })
                } else if backing.exists() {
                    Err(VolumeError::NotADirectory {
                        path: logical.to_owned(),
                    })
                } else {
                    Err(VolumeError::NotFound {
                        path: logical.to_owned(),
                    })
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn encode_segment(
        &self,
        segment: &str,
        logical_dir: &str,
        backing_dir: &Path,
    ) -> Result<String, VolumeError> {
        name::validate_segment(segment, self.filename_mode)?;
        match self.filename_mode {
            FilenameMode::Plaintext => Ok(segment.to_owned()),
            FilenameMode::Encrypted => {
                let iv = self.dir_iv(logical_dir, backing_dir)?;
                Ok(name::encrypt_segment(segment, &iv, &self.master_key)?)
            }
        }
    }

    /// Resolve a logical directory path to its backing path.
    fn resolve_dir(&self, path: &str) -> Result<(PathBuf, String), VolumeError> {
        let mut backing = self.root.clone();
        let mut logical = String::new();
        for segment in split_path(path) {
            let cname = self.encode_segment(segment, &logical, &backing)?;
            logical.push('/');
            logical.push_str(segment);
            backing.push(cname);
        }
        Ok((backing, logical))
    }

    /// Resolve a logical entry path (must not be the root) to the backing
    /// path under its parent directory.
    fn resolve_entry(&self, path: &str) -> Result<PathBuf, VolumeError> {
        let segments = split_path(path);
        let Some((&last, parents)) = segments.split_last() else {
            return Err(VolumeError::InvalidName {
                name: path.to_owned(),
            });
        };

        let mut backing = self.root.clone();
        let mut logical = String::new();
        for &segment in parents {
            let cname = self.encode_segment(segment, &logical, &backing)?;
            logical.push('/');
            logical.push_str(segment);
            backing.push(cname);
        }
        let cname = self.encode_segment(last, &logical, &backing)?;
        Ok(backing.join(cname))
    }

    // ==================== directories ====================

    /// List a directory, decrypting entry names and gathering attributes.
    ///
    /// The returned sequence is fully materialized; ordering follows the
    /// underlying directory iteration and is stable for an unmodified
    /// directory within one call. Entries whose stored name does not
    /// authenticate (foreign files dropped into the ciphertext tree) are
    /// skipped with a warning rather than failing the listing.
    #[instrument(level = "debug", skip(self))]
    pub fn list_dir(&self, path: &str) -> Result<Vec<DirEntry>, VolumeError> {
        self.check_open()?;
        let (backing, logical) = self.resolve_dir(path)?;
        let at_root = logical.is_empty();

        let iv = match self.filename_mode {
            FilenameMode::Encrypted => Some(self.dir_iv(&logical, &backing)?),
            FilenameMode::Plaintext => None,
        };

        let reader = fs::read_dir(&backing).map_err(|e| match e.kind() {
            io::ErrorKind::NotADirectory => VolumeError::NotADirectory {
                path: display_path(path),
            },
            _ => VolumeError::io(e, display_path(path)),
        })?;

        let header_tmp = format!("{HEADER_FILE_NAME}{}", crate::header::TMP_SUFFIX);
        let mut entries = Vec::new();
        for entry in reader {
            let entry = entry.map_err(|e| VolumeError::io(e, display_path(path)))?;
            let stored_name = entry.file_name();
            let Some(stored_name) = stored_name.to_str() else {
                continue;
            };
            if at_root && (stored_name == HEADER_FILE_NAME || stored_name == header_tmp) {
                continue;
            }
            // Also hides IV files parked by an interrupted rmdir.
            if stored_name.starts_with(DIRIV_FILE_NAME) {
                continue;
            }

            let plain_name = match iv {
                Some(ref iv) => {
                    match name::decrypt_segment(stored_name, iv, &self.master_key) {
                        Ok(n) => n,
                        Err(e) => {
                            warn!(name = stored_name, error = %e, "skipping undecryptable entry");
                            continue;
                        }
                    }
                }
                None => stored_name.to_owned(),
            };

            let meta = match entry.metadata() {
                Ok(meta) => meta,
                // Deleted between listing and stat.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(VolumeError::io(e, display_path(path))),
            };
            let kind = if meta.is_dir() {
                EntryKind::Directory
            } else if meta.is_file() {
                EntryKind::RegularFile
            } else {
                continue;
            };
            let size = match kind {
                EntryKind::RegularFile => self.layout.plain_size(meta.len()),
                EntryKind::Directory => 0,
            };
            entries.push(DirEntry {
                name: plain_name,
                kind,
                size,
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }

    /// Attributes of a path: kind, logical size, mtime and mode.
    pub fn get_attrs(&self, path: &str) -> Result<Attributes, VolumeError> {
        self.check_open()?;
        let backing = if split_path(path).is_empty() {
            self.root.clone()
        } else {
            self.resolve_entry(path)?
        };
        let meta = fs::metadata(&backing).map_err(|e| VolumeError::io(e, display_path(path)))?;

        let kind = if meta.is_dir() {
            EntryKind::Directory
        } else {
            EntryKind::RegularFile
        };
        let size = match kind {
            EntryKind::RegularFile => self.layout.plain_size(meta.len()),
            EntryKind::Directory => 0,
        };
        Ok(Attributes {
            kind,
            size,
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            mode: mode_of(&meta),
        })
    }

    /// Whether a path resolves to an existing entry.
    pub fn path_exists(&self, path: &str) -> Result<bool, VolumeError> {
        match self.get_attrs(path) {
            Ok(_) => Ok(true),
            Err(VolumeError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a directory, including its IV file in encrypted-name mode.
    #[instrument(level = "debug", skip(self))]
    pub fn mkdir(&self, path: &str) -> Result<(), VolumeError> {
        self.check_open()?;
        let backing = self.resolve_entry(path)?;
        fs::create_dir(&backing).map_err(|e| {
            if e.kind() == io::ErrorKind::AlreadyExists {
                VolumeError::AlreadyExists {
                    path: display_path(path),
                }
            } else {
                VolumeError::io(e, display_path(path))
            }
        })?;
        set_mode(&backing, DIR_MODE);

        if self.filename_mode == FilenameMode::Encrypted {
            if let Err(e) = name::write_dir_iv(&backing) {
                // A directory without an IV is unusable; undo the mkdir.
                let _ = fs::remove_dir(&backing);
                return Err(e.into());
            }
        }
        Ok(())
    }

    /// Remove an empty directory.
    #[instrument(level = "debug", skip(self))]
    pub fn rmdir(&self, path: &str) -> Result<(), VolumeError> {
        self.check_open()?;
        let backing = self.resolve_entry(path)?;

        let reader = fs::read_dir(&backing).map_err(|e| match e.kind() {
            io::ErrorKind::NotADirectory => VolumeError::NotADirectory {
                path: display_path(path),
            },
            _ => VolumeError::io(e, display_path(path)),
        })?;
        let mut has_iv = false;
        for entry in reader {
            let entry = entry.map_err(|e| VolumeError::io(e, display_path(path)))?;
            if entry.file_name() == DIRIV_FILE_NAME {
                has_iv = true;
            } else {
                return Err(VolumeError::IOFailure {
                    path: display_path(path),
                    source: io::Error::new(io::ErrorKind::DirectoryNotEmpty, "directory not empty"),
                });
            }
        }

        if has_iv {
            // Park the IV file in the parent while removing the directory,
            // and restore it if another entry appeared concurrently.
            let parent = backing.parent().unwrap_or(&self.root).to_path_buf();
            let mut stamp = [0u8; 4];
            rand::rng().fill_bytes(&mut stamp);
            let parked = parent.join(format!("{DIRIV_FILE_NAME}.rm.{}", hex::encode(stamp)));
            fs::rename(backing.join(DIRIV_FILE_NAME), &parked)
                .map_err(|e| VolumeError::io(e, display_path(path)))?;
            match fs::remove_dir(&backing) {
                Ok(()) => {
                    let _ = fs::remove_file(&parked);
                }
                Err(e) => {
                    let _ = fs::rename(&parked, backing.join(DIRIV_FILE_NAME));
                    return Err(VolumeError::io(e, display_path(path)));
                }
            }
        } else {
            fs::remove_dir(&backing).map_err(|e| VolumeError::io(e, display_path(path)))?;
        }

        self.dir_ivs.invalidate_all();
        Ok(())
    }

    /// Remove a regular file.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_file(&self, path: &str) -> Result<(), VolumeError> {
        self.check_open()?;
        let backing = self.resolve_entry(path)?;
        fs::remove_file(&backing).map_err(|e| VolumeError::io(e, display_path(path)))
    }

    /// Rename a file or directory. A directory keeps its own IV, so only
    /// its entry name under the (possibly new) parent is re-encrypted.
    #[instrument(level = "debug", skip(self))]
    pub fn rename(&self, from: &str, to: &str) -> Result<(), VolumeError> {
        self.check_open()?;
        let src = self.resolve_entry(from)?;
        if fs::symlink_metadata(&src).is_err() {
            return Err(VolumeError::NotFound {
                path: display_path(from),
            });
        }
        let dst = self.resolve_entry(to)?;
        fs::rename(&src, &dst).map_err(|e| VolumeError::io(e, display_path(to)))?;
        self.dir_ivs.invalidate_all();
        Ok(())
    }

    // ==================== file handles ====================

    /// Open a file for reading.
    #[instrument(level = "debug", skip(self))]
    pub fn open_read(&self, path: &str) -> Result<FileHandle, VolumeError> {
        self.check_open()?;
        let backing = self.resolve_entry(path)?;
        let file = OpenOptions::new()
            .read(true)
            .open(&backing)
            .map_err(|e| VolumeError::io(e, display_path(path)))?;
        self.handles
            .insert(EncryptedFile::new(file, PathBuf::from(display_path(path)), false))
            .ok_or(VolumeError::AllocationExhausted {
                what: "file handle",
            })
    }

    /// Open a file for read-modify-write, creating it with `mode` bits if
    /// missing. Existing content is kept; truncation is a separate,
    /// explicit operation.
    #[instrument(level = "debug", skip(self))]
    pub fn open_write(&self, path: &str, mode: u32) -> Result<FileHandle, VolumeError> {
        self.check_open()?;
        let backing = self.resolve_entry(path)?;
        let existed = backing.exists();
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        apply_create_mode(&mut options, mode);
        let file = options
            .open(&backing)
            .map_err(|e| VolumeError::io(e, display_path(path)))?;
        if !existed {
            // The open honors the umask; pin freshly created files to the
            // requested bits exactly.
            set_mode(&backing, mode);
        }
        self.handles
            .insert(EncryptedFile::new(file, PathBuf::from(display_path(path)), true))
            .ok_or(VolumeError::AllocationExhausted {
                what: "file handle",
            })
    }

    /// Close a file handle.
    pub fn close_file(&self, handle: FileHandle) -> Result<(), VolumeError> {
        self.check_open()?;
        if self.handles.remove(handle) {
            Ok(())
        } else {
            Err(VolumeError::InvalidHandle { handle })
        }
    }

    /// Read up to `length` bytes at `offset`. Returns fewer bytes at end of
    /// file and caps one call at [`MAX_IO_SIZE`]; an empty result past the
    /// end is not an error.
    pub fn read_at(
        &self,
        handle: FileHandle,
        offset: u64,
        length: usize,
    ) -> Result<Vec<u8>, VolumeError> {
        self.check_open()?;
        let entry = self
            .handles
            .get(handle)
            .ok_or(VolumeError::InvalidHandle { handle })?;
        let mut file = entry.lock().expect("file handle poisoned");
        Ok(file.read_at(&self.cipher, &self.layout, offset, length)?)
    }

    /// Write all of `data` at `offset`. Fails with
    /// [`VolumeError::InvalidHandle`] on a read-only handle.
    pub fn write_at(
        &self,
        handle: FileHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<usize, VolumeError> {
        self.check_open()?;
        let entry = self
            .handles
            .get(handle)
            .ok_or(VolumeError::InvalidHandle { handle })?;
        let mut file = entry.lock().expect("file handle poisoned");
        if !file.is_writable() {
            return Err(VolumeError::InvalidHandle { handle });
        }
        Ok(file.write_at(&self.cipher, &self.layout, offset, data)?)
    }

    /// Set the logical length of the file at `path`, creating it if
    /// missing. Shrinking re-encrypts the final partial block; growing
    /// materializes zero blocks.
    #[instrument(level = "debug", skip(self))]
    pub fn truncate(&self, path: &str, new_len: u64) -> Result<(), VolumeError> {
        let handle = self.open_write(path, FILE_MODE)?;
        let result = (|| {
            let entry = self
                .handles
                .get(handle)
                .ok_or(VolumeError::InvalidHandle { handle })?;
            let mut file = entry.lock().expect("file handle poisoned");
            file.truncate(&self.cipher, &self.layout, new_len)
                .map_err(VolumeError::from)
        })();
        self.handles.remove(handle);
        result
    }

    // ==================== streaming helpers ====================

    /// Import a whole stream into `path`, then cut the file to exactly the
    /// imported length.
    pub fn write_from_reader(
        &self,
        path: &str,
        reader: &mut dyn Read,
    ) -> Result<u64, VolumeError> {
        let handle = self.open_write(path, FILE_MODE)?;
        let result: Result<u64, VolumeError> = (|| {
            let mut offset = 0u64;
            let mut buf = vec![0u8; MAX_IO_SIZE];
            loop {
                let n = reader.read(&mut buf).map_err(|e| VolumeError::IOFailure {
                    path: display_path(path),
                    source: e,
                })?;
                if n == 0 {
                    return Ok(offset);
                }
                self.write_at(handle, offset, &buf[..n])?;
                offset += n as u64;
            }
        })();
        self.handles.remove(handle);
        let written = result?;
        self.truncate(path, written)?;
        Ok(written)
    }

    /// Export the whole file at `path` into a writer.
    pub fn read_to_writer(&self, path: &str, writer: &mut dyn Write) -> Result<u64, VolumeError> {
        let handle = self.open_read(path)?;
        let result = (|| {
            let mut offset = 0u64;
            loop {
                let chunk = self.read_at(handle, offset, MAX_IO_SIZE)?;
                if chunk.is_empty() {
                    return Ok(offset);
                }
                writer.write_all(&chunk).map_err(|e| VolumeError::IOFailure {
                    path: display_path(path),
                    source: e,
                })?;
                offset += chunk.len() as u64;
            }
        })();
        self.handles.remove(handle);
        result
    }

    /// Number of currently open file handles, for diagnostics.
    pub fn open_file_count(&self) -> usize {
        self.handles.open_count()
    }
}

impl std::fmt::Debug for Volume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Volume")
            .field("root", &self.root)
            .field("filename_mode", &self.filename_mode)
            .field("cipher_suite", &self.cipher.suite())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Split a logical path into segments, ignoring empty ones so `/a//b/` and
/// `a/b` resolve identically.
fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalized display form for error messages.
fn display_path(path: &str) -> String {
    let segments = split_path(path);
    if segments.is_empty() {
        "/".to_owned()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(_meta: &fs::Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn apply_create_mode(options: &mut OpenOptions, mode: u32) {
    use std::os::unix::fs::OpenOptionsExt;
    options.mode(mode);
}

#[cfg(not(unix))]
fn apply_create_mode(_options: &mut OpenOptions, _mode: u32) {}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(mode));
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_normalizes() {
        assert!(split_path("").is_empty());
        assert!(split_path("/").is_empty());
        assert!(split_path("///").is_empty());
        assert_eq!(split_path("/a/b"), vec!["a", "b"]);
        assert_eq!(split_path("a//b/"), vec!["a", "b"]);
    }

    #[test]
    fn display_path_normalizes() {
        assert_eq!(display_path(""), "/");
        assert_eq!(display_path("a//b/"), "/a/b");
    }
}
