//! List command - list directory contents in a volume.

use anyhow::Result;
use chrono::{DateTime, Local};
use clap::Args as ClapArgs;
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use sealfs_core::vault::EntryKind;

use super::OpenSession;
use crate::VaultArg;
use crate::password::PasswordOptions;

#[derive(ClapArgs, Clone)]
pub struct Args {
    #[command(flatten)]
    pub vault: VaultArg,

    /// Path within the volume (default: root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Show detailed information
    #[arg(short, long)]
    pub long: bool,
}

pub fn execute(args: &Args, passwords: &PasswordOptions) -> Result<()> {
    let session = OpenSession::open(&args.vault.vault, passwords)?;
    let mut entries = session.volume.list_dir(&args.path)?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    if args.long {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(["NAME", "TYPE", "SIZE", "MODIFIED"]);
        for entry in &entries {
            let kind = match entry.kind {
                EntryKind::Directory => "dir",
                EntryKind::RegularFile => "file",
            };
            let modified: DateTime<Local> = entry.modified.into();
            table.add_row([
                entry.name.clone(),
                kind.to_owned(),
                entry.size.to_string(),
                modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            ]);
        }
        println!("{table}");
    } else {
        for entry in &entries {
            match entry.kind {
                EntryKind::Directory => println!("{}/", entry.name),
                EntryKind::RegularFile => println!("{}", entry.name),
            }
        }
    }
    Ok(())
}
