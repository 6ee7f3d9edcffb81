//! Session registry.
//!
//! Sessions are open volumes identified by small non-negative integers,
//! unique among currently open sessions and reused after close. The
//! registry is a bounded slot table: allocation takes the lowest free slot,
//! close tombstones it. `is_closed` only inspects slot occupancy, so it can
//! run concurrently with anything, including a racing close, without
//! touching key material.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::{debug, instrument};

use crate::crypto::{CachedKey, Credential};
use crate::vault::operations::{Volume, VolumeError};

/// Maximum number of concurrently open sessions.
pub const MAX_SESSIONS: usize = 256;

/// A small integer identifying one open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u32);

impl SessionId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of open volume sessions.
///
/// Operations on different sessions are fully independent: `session()`
/// clones the `Arc` under a read lock and the registry lock is never held
/// across I/O or cryptography.
pub struct SessionRegistry {
    slots: RwLock<Vec<Option<Arc<Volume>>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
        }
    }

    /// Open a session on the volume at `root`.
    pub fn open(&self, root: &Path, credential: Credential<'_>) -> Result<SessionId, VolumeError> {
        self.open_with_key_cache(root, credential)
            .map(|(session, _)| session)
    }

    /// Open a session, also returning the derived KEK for caller-side
    /// caching (pass it back as [`Credential::CachedKey`] to skip the KDF).
    #[instrument(level = "info", skip(self, credential), fields(root = %root.display()))]
    pub fn open_with_key_cache(
        &self,
        root: &Path,
        credential: Credential<'_>,
    ) -> Result<(SessionId, CachedKey), VolumeError> {
        // KDF and header verification happen before the registry lock is
        // taken, so a slow open never blocks unrelated sessions.
        let (volume, cached) = Volume::open(root, credential)?;
        let volume = Arc::new(volume);

        let mut slots = self.slots.write().expect("session registry poisoned");
        for (i, slot) in slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(volume);
                return Ok((SessionId(i as u32), cached));
            }
        }
        if slots.len() >= MAX_SESSIONS {
            return Err(VolumeError::AllocationExhausted { what: "session" });
        }
        slots.push(Some(volume));
        let session = SessionId((slots.len() - 1) as u32);
        debug!(%session, "session opened");
        Ok((session, cached))
    }

    /// Resolve a session ID to its volume.
    pub fn session(&self, session: SessionId) -> Result<Arc<Volume>, VolumeError> {
        let slots = self.slots.read().expect("session registry poisoned");
        slots
            .get(session.0 as usize)
            .and_then(Clone::clone)
            .ok_or(VolumeError::SessionClosed)
    }

    /// Whether a session ID currently refers to an open session.
    ///
    /// Safe to call concurrently with any other operation, including a
    /// racing `close`; requires no key material.
    pub fn is_closed(&self, session: SessionId) -> bool {
        let slots = self.slots.read().expect("session registry poisoned");
        !matches!(slots.get(session.0 as usize), Some(Some(_)))
    }

    /// Close a session. Terminal and idempotent; returns whether a session
    /// was actually open. Outstanding file handles are invalidated and the
    /// key material is wiped once in-flight operations drain.
    #[instrument(level = "info", skip(self))]
    pub fn close(&self, session: SessionId) -> bool {
        let volume = {
            let mut slots = self.slots.write().expect("session registry poisoned");
            slots.get_mut(session.0 as usize).and_then(Option::take)
        };
        match volume {
            Some(volume) => {
                // Flag first so in-flight operations fail promptly; the
                // master key is zeroed when the last Arc drops.
                volume.close();
                true
            }
            None => false,
        }
    }

    /// Number of currently open sessions.
    pub fn open_count(&self) -> usize {
        let slots = self.slots.read().expect("session registry poisoned");
        slots.iter().filter(|s| s.is_some()).count()
    }
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("open_sessions", &self.open_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Registry mechanics that need no real volume are tested here; the
    // full open/close lifecycle lives in the integration tests.

    #[test]
    fn unknown_ids_read_as_closed() {
        let registry = SessionRegistry::new();
        assert!(registry.is_closed(SessionId(0)));
        assert!(registry.is_closed(SessionId(9999)));
        assert!(matches!(
            registry.session(SessionId(0)),
            Err(VolumeError::SessionClosed)
        ));
    }

    #[test]
    fn close_of_unknown_id_is_a_noop() {
        let registry = SessionRegistry::new();
        assert!(!registry.close(SessionId(3)));
        assert_eq!(registry.open_count(), 0);
    }
}
