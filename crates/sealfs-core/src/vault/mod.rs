//! Volume-level abstractions: sessions, handles and operations.

pub mod creator;
pub mod handles;
pub mod operations;
pub mod session;

pub use creator::create_volume;
pub use handles::{FileHandle, MAX_OPEN_FILES};
pub use operations::{Attributes, DirEntry, EntryKind, Volume, VolumeError};
pub use session::{MAX_SESSIONS, SessionId, SessionRegistry};
