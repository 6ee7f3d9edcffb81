//! Volume creation.

use std::path::Path;

use tracing::{info, instrument};

use crate::fs::name;
use crate::header::{CreateOptions, FilenameMode, VolumeHeader};
use crate::vault::operations::VolumeError;

/// Create a new empty volume at `root`.
///
/// Writes the volume header and, in encrypted-name mode, the root
/// directory's IV file. Fails with [`VolumeError::AlreadyExists`] when
/// `root` already contains anything; creates `root` itself if missing.
///
/// The volume is not opened; call
/// [`SessionRegistry::open`](crate::vault::SessionRegistry::open) (or
/// [`Volume::open`](crate::vault::Volume::open)) afterwards.
#[instrument(level = "info", skip(passphrase, options), fields(root = %root.display()))]
pub fn create_volume(
    root: &Path,
    passphrase: &str,
    options: &CreateOptions,
) -> Result<(), VolumeError> {
    let header = VolumeHeader::create(root, passphrase, options)?;
    if header.filename_mode() == FilenameMode::Encrypted {
        name::write_dir_iv(root)?;
    }
    info!("volume created");
    Ok(())
}
