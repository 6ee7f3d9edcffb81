//! Create command - initialize a new empty volume.

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, ValueEnum};

use sealfs_core::{CipherSuite, CreateOptions, FilenameMode, create_volume};

use crate::VaultArg;
use crate::password::PasswordOptions;

#[derive(ValueEnum, Clone, Copy)]
pub enum CipherChoice {
    Aes256Gcm,
    Xchacha20Poly1305,
}

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub vault: VaultArg,

    /// Store directory-entry names unencrypted (content stays encrypted)
    #[arg(long)]
    pub plaintext_names: bool,

    /// Content cipher suite
    #[arg(long, value_enum, default_value = "aes256-gcm")]
    pub cipher: CipherChoice,

    /// scrypt cost as log2 of the iteration count
    #[arg(long, default_value_t = 16)]
    pub kdf_cost: u8,
}

pub fn execute(args: &Args, passwords: &PasswordOptions) -> Result<()> {
    let passphrase = passwords.obtain_new("New passphrase: ")?;
    let options = CreateOptions {
        cipher_suite: match args.cipher {
            CipherChoice::Aes256Gcm => CipherSuite::Aes256Gcm,
            CipherChoice::Xchacha20Poly1305 => CipherSuite::XChaCha20Poly1305,
        },
        filename_mode: if args.plaintext_names {
            FilenameMode::Plaintext
        } else {
            FilenameMode::Encrypted
        },
        kdf_log_n: args.kdf_cost,
        ..CreateOptions::default()
    };
    create_volume(&args.vault.vault, &passphrase, &options)
        .with_context(|| format!("failed to create volume at {}", args.vault.vault.display()))?;
    println!("volume created at {}", args.vault.vault.display());
    Ok(())
}
