//! Passphrase acquisition for CLI commands.

use std::io::{BufRead, IsTerminal};

use anyhow::{Context, Result, bail};

/// Passphrase sources extracted from global CLI flags.
#[derive(Clone, Default)]
pub struct PasswordOptions {
    pub password: Option<String>,
    pub password_stdin: bool,
}

impl PasswordOptions {
    /// Obtain the passphrase: flag/environment, stdin, or interactive
    /// prompt, in that order of preference.
    pub fn obtain(&self, prompt: &str) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        if self.password_stdin {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("failed to read passphrase from stdin")?;
            return Ok(line.trim_end_matches(['\r', '\n']).to_owned());
        }
        if !std::io::stdin().is_terminal() {
            bail!("no passphrase given and stdin is not a terminal (use --password-stdin)");
        }
        rpassword::prompt_password(prompt).context("failed to read passphrase")
    }

    /// Prompt twice and insist on a match (volume creation, password change).
    pub fn obtain_new(&self, prompt: &str) -> Result<String> {
        if self.password.is_some() || self.password_stdin {
            return self.obtain(prompt);
        }
        let first = rpassword::prompt_password(prompt).context("failed to read passphrase")?;
        let second =
            rpassword::prompt_password("Repeat passphrase: ").context("failed to read passphrase")?;
        if first != second {
            bail!("passphrases do not match");
        }
        Ok(first)
    }
}
