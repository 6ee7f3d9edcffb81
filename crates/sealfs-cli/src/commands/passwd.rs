//! Passwd command - change the volume passphrase.

use std::io::BufRead;

use anyhow::{Context, Result, bail};
use clap::Args as ClapArgs;

use sealfs_core::{Credential, change_password};

use crate::VaultArg;
use crate::password::PasswordOptions;

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub vault: VaultArg,
}

pub fn execute(args: &Args, passwords: &PasswordOptions) -> Result<()> {
    let old = passwords.obtain("Current passphrase: ")?;
    let new = if passwords.password_stdin {
        // Second stdin line carries the new passphrase.
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read new passphrase from stdin")?;
        let new = line.trim_end_matches(['\r', '\n']).to_owned();
        if new.is_empty() {
            bail!("no new passphrase given on stdin");
        }
        new
    } else {
        let first = rpassword::prompt_password("New passphrase: ")
            .context("failed to read passphrase")?;
        let second = rpassword::prompt_password("Repeat new passphrase: ")
            .context("failed to read passphrase")?;
        if first != second {
            bail!("passphrases do not match");
        }
        first
    };

    change_password(&args.vault.vault, Credential::Passphrase(&old), &new)
        .with_context(|| format!("failed to re-key volume at {}", args.vault.vault.display()))?;
    println!("passphrase changed");
    Ok(())
}
