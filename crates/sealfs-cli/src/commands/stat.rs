//! Stat command - show attributes of a path.

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::Args as ClapArgs;

use sealfs_core::vault::EntryKind;

use super::OpenSession;
use crate::VaultArg;
use crate::password::PasswordOptions;

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub vault: VaultArg,

    /// Path within the volume
    pub path: String,
}

pub fn execute(args: &Args, passwords: &PasswordOptions) -> Result<()> {
    let session = OpenSession::open(&args.vault.vault, passwords)?;
    let attrs = session.volume.get_attrs(&args.path)?;
    let modified: DateTime<Local> = attrs.modified.into();
    let kind = match attrs.kind {
        EntryKind::Directory => "directory",
        EntryKind::RegularFile => "regular file",
    };
    println!("path:      {}", args.path);
    println!("type:      {kind}");
    println!("size:      {}", attrs.size);
    println!("mode:      {:04o}", attrs.mode);
    println!("modified:  {}", modified.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}
