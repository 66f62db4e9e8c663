//! Encrypt command.

use std::sync::Arc;

use age::armor::Format;
use clap::Args;

use crate::cli::io::{self, OutputTarget, StdinGuard};
use crate::cli::output;
use crate::core::identity::{self, KeyIdentity};
use crate::core::passphrase::{self, PassphraseCache};
use crate::core::visitor::VisitorOptions;
use crate::core::{cipher, document, recipient};
use crate::error::{ConfigError, KeyError, Result, YamlError};

#[derive(Args)]
pub struct EncryptArgs {
    /// Encrypt to the given recipient (repeatable)
    #[arg(short, long = "recipient", value_name = "RECIPIENT")]
    pub recipients: Vec<String>,

    /// Encrypt to the recipients listed in the given file (repeatable)
    #[arg(short = 'R', long = "recipient-file", value_name = "PATH")]
    pub recipient_files: Vec<String>,

    /// Encrypt to the recipients derived from the identities in the given
    /// file (repeatable)
    #[arg(long = "recipient-identity", value_name = "PATH")]
    pub recipient_identities: Vec<String>,

    /// Encrypt with a passphrase instead of recipients
    #[arg(short, long)]
    pub passphrase: bool,

    /// Armor the output (whole-file mode)
    #[arg(short, long)]
    pub armor: bool,

    /// Treat the input as a YAML document stream and encrypt its
    /// !crypto/age tagged values
    #[arg(short, long)]
    pub yaml: bool,

    /// Strip the !crypto/age markers from the encrypted YAML output
    #[arg(long = "yaml-notag")]
    pub yaml_no_tag: bool,

    /// Ignore the notag attribute, keeping every marker in the output
    #[arg(long = "yaml-discard-notag")]
    pub yaml_discard_no_tag: bool,

    /// Write the result to the given file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<String>,

    /// Input file; `-` or omitted for stdin
    pub input: Option<String>,
}

pub fn execute(args: EncryptArgs) -> Result<()> {
    if args.yaml_no_tag && args.yaml_discard_no_tag {
        return Err(ConfigError::NoTagConflict.into());
    }
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
    let target = OutputTarget::resolve(args.output.as_deref(), args.input.as_deref(), false)?;

    let recipients = if args.passphrase {
        let phrase = passphrase::prompt_for_encryption()?;
        vec![Box::new(age::scrypt::Recipient::new(phrase)) as Box<dyn age::Recipient + Send>]
    } else {
        let cache = Arc::new(PassphraseCache::new());
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
        let options = VisitorOptions {
            no_decrypt: true,
            force_no_tag: args.yaml_no_tag,
            discard_no_tag: args.yaml_discard_no_tag,
        };
        let outcome = document::transform_stream(&input, &[], &recipients, options)?;
        output::report_warnings(&outcome.warnings);
        target.write(outcome.output.as_bytes(), false)
    } else {
        let format = if args.armor {
            Format::AsciiArmor
        } else {
            Format::Binary
        };
        let encrypted = cipher::encrypt(&data, &recipients, format)?;
        target.write(&encrypted, !args.armor)
    }
}

/// Collect recipients from `-r` strings, `-R` files and
/// `--recipient-identity` identity files, in that order.
pub(crate) fn gather_recipients(
    keys: &[String],
    files: &[String],
    identity_files: &[String],
    cache: &Arc<PassphraseCache>,
    stdin: &mut StdinGuard,
) -> Result<Vec<Box<dyn age::Recipient + Send>>> {
    let mut recipients = Vec::new();

    for key in keys {
        recipients.push(recipient::parse_recipient(key)?);
    }
    for file in files {
        let contents = io::read_named(file, stdin)?;
        let text = std::str::from_utf8(&contents).map_err(|_| {
            KeyError::InvalidRecipient(format!("{}: not valid UTF-8", file))
        })?;
        recipients.extend(recipient::parse_recipients_data(file, text)?);
    }
    for file in identity_files {
        let contents = io::read_named(file, stdin)?;
        let identities: Vec<KeyIdentity> =
            identity::parse_identity_data(file, &contents, cache, true)?;
        recipients.extend(recipient::derive_recipients(&identities)?);
    }

    Ok(recipients)
}
