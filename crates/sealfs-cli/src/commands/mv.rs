//! Mv command - rename a file or directory within the volume.

use anyhow::Result;
use clap::Args as ClapArgs;

use super::OpenSession;
use crate::VaultArg;
use crate::password::PasswordOptions;

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub vault: VaultArg,

    /// Current path within the volume
    pub from: String,

    /// New path within the volume
    pub to: String,
}

pub fn execute(args: &Args, passwords: &PasswordOptions) -> Result<()> {
    let session = OpenSession::open(&args.vault.vault, passwords)?;
    session.volume.rename(&args.from, &args.to)?;
    Ok(())
}
