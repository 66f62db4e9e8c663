//! Command-line interface.

pub mod completions;
pub mod decrypt;
pub mod encrypt;
pub mod io;
pub mod output;
pub mod rekey;

use clap::{Parser, Subcommand};

/// Leafage - transparent age encryption for YAML documents.
#[derive(Parser)]
#[command(
    name = "leafage",
    about = "Manage age-encrypted values inside YAML documents",
    version
)]
pub struct Cli {
    /// Verbose diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Encrypt a file, or the tagged values of a YAML document stream
    #[command(visible_alias = "e")]
    Encrypt(encrypt::EncryptArgs),

    /// Decrypt a file, or the tagged values of a YAML document stream
    #[command(visible_alias = "d")]
    Decrypt(decrypt::DecryptArgs),

    /// Re-encrypt for a new set of recipients
    Rekey(rekey::RekeyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Execute a command.
pub fn execute(command: Command) -> crate::error::Result<()> {
    use Command::*;

    match command {
        Encrypt(args) => encrypt::execute(args),
        Decrypt(args) => decrypt::execute(args),
        Rekey(args) => rekey::execute(args),
        Completions { shell } => completions::execute(shell),
    }
}
