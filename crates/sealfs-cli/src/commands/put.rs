//! Put command - import a local file into the volume.

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

    /// Local source file
    pub source: std::path::PathBuf,

    /// Destination path within the volume
    pub dest: String,
}

pub fn execute(args: &Args, passwords: &PasswordOptions) -> Result<()> {
    let session = OpenSession::open(&args.vault.vault, passwords)?;
    let mut source = File::open(&args.source)
        .with_context(|| format!("failed to open {}", args.source.display()))?;
    let written = session.volume.write_from_reader(&args.dest, &mut source)?;
    println!("imported {written} bytes to {}", args.dest);
    Ok(())
}
