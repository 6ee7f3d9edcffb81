//! sealfs-core: an encrypted virtual filesystem library.
//!
//! A volume lives in an ordinary host directory. File content is sealed in
//! fixed-size, independently authenticated blocks; directory-entry names
//! are deterministically encrypted per directory (or stored as-is in
//! plaintext-name mode); the passphrase-derived key hierarchy lives only in
//! memory for the lifetime of a session and is zeroed on close.
//!
//! ```no_run
//! use sealfs_core::{CreateOptions, Credential, SessionRegistry, create_volume};
//! use std::path::Path;
//!
//! let root = Path::new("/srv/vault");
//! create_volume(root, "passphrase", &CreateOptions::default())?;
//!
//! let sessions = SessionRegistry::new();
//! let id = sessions.open(root, Credential::Passphrase("passphrase"))?;
//! let volume = sessions.session(id)?;
//!
//! volume.mkdir("/notes")?;
//! let handle = volume.open_write("/notes/todo.txt", sealfs_core::vault::operations::FILE_MODE)?;
//! volume.write_at(handle, 0, b"ship it")?;
//! volume.close_file(handle)?;
//! sessions.close(id);
//! # Ok::<(), sealfs_core::error::VolumeError>(())
//! ```

#![forbid(unsafe_code)]

pub mod crypto;
pub mod error;
pub mod fs;
pub mod header;
pub mod vault;

pub use crypto::{CachedKey, Credential};
pub use header::{CipherSuite, CreateOptions, FilenameMode, change_password};
pub use vault::{SessionId, SessionRegistry, Volume, create_volume};
