//! CLI subcommands.

pub mod cat;
pub mod create;
pub mod get;
pub mod info;
pub mod ls;
pub mod mkdir;
pub mod mv;
pub mod passwd;
pub mod put;
pub mod rm;
pub mod rmdir;
pub mod stat;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use sealfs_core::vault::Volume;
use sealfs_core::{Credential, SessionId, SessionRegistry};

use crate::password::PasswordOptions;

/// A session opened for the duration of one CLI invocation.
///
/// Closing happens in `Drop`, so every exit path wipes the key material.
pub(crate) struct OpenSession {
    registry: SessionRegistry,
    id: SessionId,
    pub volume: Arc<Volume>,
}

impl OpenSession {
    pub fn open(vault: &Path, passwords: &PasswordOptions) -> Result<Self> {
        let passphrase = passwords.obtain("Passphrase: ")?;
        let registry = SessionRegistry::new();
        let id = registry
            .open(vault, Credential::Passphrase(&passphrase))
            .with_context(|| format!("failed to open volume at {}", vault.display()))?;
        let volume = registry.session(id)?;
        Ok(Self {
            registry,
            id,
            volume,
        })
    }
}

impl Drop for OpenSession {
    fn drop(&mut self) {
        self.registry.close(self.id);
    }
}
