//! Leafage - transparent age encryption for YAML documents.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use leafage::cli::output;
use leafage::cli::{execute, Cli};
use leafage::error::{CipherError, ConfigError, Error};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env("LEAFAGE_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("leafage=debug")
        } else {
            EnvFilter::new("leafage=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = execute(cli.command) {
        let suggestion = match &e {
            Error::Config(ConfigError::MissingRecipients) => {
                Some("see: leafage encrypt --help")
            }
            Error::Config(ConfigError::BinaryToTerminal) => {
                Some("pipe the output or pass -a/--armor")
            }
            Error::Cipher(CipherError::NoMatchingIdentity) => {
                Some("pass an identity file with -i/--identity")
            }
            _ => None,
        };

        output::error(&e.to_string());
        if let Some(hint) = suggestion {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}
