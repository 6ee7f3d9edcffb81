//! Mkdir command - create a directory in the volume.

use anyhow::Result;
use clap::Args as ClapArgs;

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
    session.volume.mkdir(&args.path)?;
    Ok(())
}
