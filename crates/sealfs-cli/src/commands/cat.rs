//! Cat command - print a file to stdout.

use std::io::Write;

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
    let mut stdout = std::io::stdout().lock();
    session.volume.read_to_writer(&args.path, &mut stdout)?;
    stdout.flush()?;
    Ok(())
}
