//! Decrypt command.

use std::sync::Arc;

use clap::Args;

use crate::cli::io::{self, OutputTarget, StdinGuard};
use crate::cli::output;
use crate::core::identity::{self, KeyIdentity};
use crate::core::passphrase::PassphraseCache;
use crate::core::visitor::VisitorOptions;
use crate::core::{cipher, document};
use crate::error::{ConfigError, Result, YamlError};

#[derive(Args)]
pub struct DecryptArgs {
    /// Decrypt with the identities in the given file (repeatable)
    #[arg(short, long = "identity", value_name = "PATH")]
    pub identities: Vec<String>,

    /// Treat the input as a YAML document stream and decrypt its
    /// !crypto/age tagged values
    #[arg(short, long)]
    pub yaml: bool,

    /// Strip the !crypto/age markers from the decrypted YAML output
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

pub fn execute(args: DecryptArgs) -> Result<()> {
    if args.yaml_no_tag && args.yaml_discard_no_tag {
        return Err(ConfigError::NoTagConflict.into());
    }

    let mut stdin = StdinGuard::new();
    let target = OutputTarget::resolve(args.output.as_deref(), args.input.as_deref(), false)?;

    let cache = Arc::new(PassphraseCache::new());
    let chain = gather_identities(&args.identities, &cache, &mut stdin)?;

    let data = io::read_input(args.input.as_deref(), &mut stdin)?;

    if args.yaml {
        let input = String::from_utf8(data).map_err(|_| YamlError::NotUtf8)?;
        let options = VisitorOptions {
            no_decrypt: false,
            force_no_tag: args.yaml_no_tag,
            discard_no_tag: args.yaml_discard_no_tag,
        };
        let outcome = document::transform_stream(&input, &chain, &[], options)?;
        output::report_warnings(&outcome.warnings);
        target.write(outcome.output.as_bytes(), false)
    } else {
        let decrypted = cipher::decrypt(&data, &chain)?;
        target.write(&decrypted, false)
    }
}

/// Build the full identity chain from the `-i` files.
pub(crate) fn gather_identities(
    files: &[String],
    cache: &Arc<PassphraseCache>,
    stdin: &mut StdinGuard,
) -> Result<Vec<KeyIdentity>> {
    let mut explicit = Vec::new();
    for file in files {
        explicit.push((file.clone(), io::read_named(file, stdin)?));
    }
    identity::build_chain(explicit, cache)
}
