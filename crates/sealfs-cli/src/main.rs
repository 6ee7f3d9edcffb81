#![deny(unsafe_code)]

mod commands;
mod password;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{cat, create, get, info, ls, mkdir, mv, passwd, put, rm, rmdir, stat};
use crate::password::PasswordOptions;

/// Command-line interface for sealfs encrypted volumes
#[derive(Parser)]
#[command(name = "sealfs")]
#[command(author, version)]
#[command(propagate_version = true)]
#[command(after_help = "EXAMPLES:
    # Create a volume
    sealfs create ~/vault

    # List the volume root
    sealfs ls ~/vault /

    # Import and read back a file (pipe passphrase from a secret manager)
    echo \"$SECRET\" | sealfs --password-stdin put ~/vault notes.txt /notes.txt
    echo \"$SECRET\" | sealfs --password-stdin cat ~/vault /notes.txt
")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Volume passphrase (insecure, prefer --password-stdin or SEALFS_PASSWORD)
    #[arg(long, env = "SEALFS_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Read passphrase from stdin (single line)
    #[arg(long, conflicts_with = "password", global = true)]
    password_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty volume
    Create(create::Args),
    /// Show volume header information (no passphrase required)
    Info(info::Args),
    /// List a directory
    Ls(ls::Args),
    /// Print a file to stdout
    Cat(cat::Args),
    /// Import a local file into the volume
    Put(put::Args),
    /// Export a file from the volume to a local path
    Get(get::Args),
    /// Create a directory
    Mkdir(mkdir::Args),
    /// Remove a file
    Rm(rm::Args),
    /// Remove an empty directory
    Rmdir(rmdir::Args),
    /// Rename a file or directory
    Mv(mv::Args),
    /// Show attributes of a path
    Stat(stat::Args),
    /// Change the volume passphrase
    Passwd(passwd::Args),
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let passwords = PasswordOptions {
        password: cli.password.clone(),
        password_stdin: cli.password_stdin,
    };
    match cli.command {
        Commands::Create(args) => create::execute(&args, &passwords),
        Commands::Info(args) => info::execute(&args),
        Commands::Ls(args) => ls::execute(&args, &passwords),
        Commands::Cat(args) => cat::execute(&args, &passwords),
        Commands::Put(args) => put::execute(&args, &passwords),
        Commands::Get(args) => get::execute(&args, &passwords),
        Commands::Mkdir(args) => mkdir::execute(&args, &passwords),
        Commands::Rm(args) => rm::execute(&args, &passwords),
        Commands::Rmdir(args) => rmdir::execute(&args, &passwords),
        Commands::Mv(args) => mv::execute(&args, &passwords),
        Commands::Stat(args) => stat::execute(&args, &passwords),
        Commands::Passwd(args) => passwd::execute(&args, &passwords),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Common first positional argument: the volume directory.
#[derive(clap::Args, Clone)]
pub struct VaultArg {
    /// Path to the volume directory
    pub vault: PathBuf,
}
