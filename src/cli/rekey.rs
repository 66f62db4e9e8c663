//! Rekey command: decrypt with the current identities, re-encrypt for the
//! new recipients.
//!
//! Without `-o`, a file input is rewritten in place.

use std::sync::Arc;

use age::armor::Format;
use clap::Args;

use crate::cli::decrypt::gather_identities;
use crate::cli::encrypt::gather_recipients;
use crate::cli::io::{self, OutputTarget, StdinGuard};
use crate::cli::output;
use crate::core::passphrase::{self, PassphraseCache};
use crate::core::{cipher, document};
use crate::error::{ConfigError, Result, YamlError};

#[derive(Args)]
pub struct RekeyArgs {
    /// Decrypt with the identities in the given file (repeatable)
    #[arg(short, long = "identity", value_name = "PATH")]
    pub identities: Vec<String>,

    /// Re-encrypt to the given recipient (repeatable)
    #[arg(short, long = "recipient", value_name = "RECIPIENT")]
    pub recipients: Vec<String>,

    /// Re-encrypt to the recipients listed in the given file (repeatable)
    #[arg(short = 'R', long = "recipient-file", value_name = "PATH")]
    pub recipient_files: Vec<String>,

    /// Re-encrypt to the recipients derived from the identities in the
    /// given file (repeatable)
    #[arg(long = "recipient-identity", value_name = "PATH")]
    pub recipient_identities: Vec<String>,

    /// Re-encrypt with a passphrase instead of recipients
    #[arg(short, long)]
    pub passphrase: bool,

    /// Armor the output (whole-file mode)
    #[arg(short, long)]
    pub armor: bool,

    /// Treat the input as a YAML document stream
    #[arg(short, long)]
    pub yaml: bool,

    /// Strip the !crypto/age markers from the re-encrypted YAML output
    #[arg(long = "yaml-notag")]
    pub yaml_no_tag: bool,

    /// Write the result to the given file instead of rewriting the input
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Input file; `-` or omitted for stdin
    pub input: Option<String>,
}

pub fn execute(args: RekeyArgs) -> Result<()> {
    let has_key_recipients = !args.recipients.is_empty()
        || !args.recipient_files.is_empty()
        || !args.recipient_identities.is_empty();
    if args.passphrase && has_key_recipients {
        return Err(ConfigError::PassphraseConflict("-r/-R/--recipient-identity").into());
    }
    if !args.passphrase && !has_key_recipients {
        return Err(ConfigError::MissingRecipients.into());
    }

    let mut stdin = StdinGuard::new();
    let target = OutputTarget::resolve(args.output.as_deref(), args.input.as_deref(), true)?;

    let cache = Arc::new(PassphraseCache::new());
    let chain = gather_identities(&args.identities, &cache, &mut stdin)?;
    let recipients = if args.passphrase {
        let phrase = passphrase::prompt_for_encryption()?;
        vec![Box::new(age::scrypt::Recipient::new(phrase)) as Box<dyn age::Recipient + Send>]
    } else {
        gather_recipients(
            &args.recipients,
            &args.recipient_files,
            &args.recipient_identities,
            &cache,
            &mut stdin,
        )?
    };

    let data = io::read_input(args.input.as_deref(), &mut stdin)?;

    if args.yaml {
        let input = String::from_utf8(data).map_err(|_| YamlError::NotUtf8)?;
        let outcome = document::rekey_stream(&input, &chain, &recipients, args.yaml_no_tag)?;
        output::report_warnings(&outcome.warnings);
        target.write(outcome.output.as_bytes(), false)
    } else {
        let decrypted = cipher::decrypt(&data, &chain)?;
        let format = if args.armor {
            Format::AsciiArmor
        } else {
            Format::Binary
        };
        let encrypted = cipher::encrypt(&decrypted, &recipients, format)?;
        target.write(&encrypted, !args.armor)
    }
}
