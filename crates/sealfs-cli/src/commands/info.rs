//! Info command - print header metadata without opening the volume.

use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use sealfs_core::header::VolumeHeader;

use crate::VaultArg;

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub vault: VaultArg,
}

pub fn execute(args: &Args) -> Result<()> {
    let header = VolumeHeader::load(&args.vault.vault)
        .with_context(|| format!("failed to read volume at {}", args.vault.vault.display()))?;
    println!("creator:        {}", header.creator());
    println!("cipher suite:   {}", header.cipher_suite());
    println!("filename mode:  {}", header.filename_mode());
    println!("kdf cost:       2^{}", header.kdf_log_n());
    Ok(())
}
