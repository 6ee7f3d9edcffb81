//! Get command - export a file from the volume to a local path.

use std::fs::File;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use super::OpenSession;
use crate::VaultArg;
use crate::password::PasswordOptions;

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub vault: VaultArg,

    /// Source path within the volume
    pub source: String,

    /// Local destination file
    pub dest: std::path::PathBuf,
}

pub fn execute(args: &Args, passwords: &PasswordOptions) -> Result<()> {
    let session = OpenSession::open(&args.vault.vault, passwords)?;
    let mut dest = File::create(&args.dest)
        .with_context(|| format!("failed to create {}", args.dest.display()))?;
    let read = session.volume.read_to_writer(&args.source, &mut dest)?;
    println!("exported {read} bytes to {}", args.dest.display());
    Ok(())
}
