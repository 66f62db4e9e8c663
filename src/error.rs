//! Error taxonomy.
//!
//! Fatal and configuration errors abort the run with a non-zero exit code.
//! Node-local errors during a YAML pass are accumulated by the visitor and
//! reported as warnings alongside otherwise-successful output.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Yaml(#[from] YamlError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Encryption/decryption failures.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("armor encoding failed: {0}")]
    ArmorFailed(String),

    #[error("no identity matched any recipient")]
    NoMatchingIdentity,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Identity and recipient key material failures.
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("{path}: invalid identity file: {reason}")]
    InvalidIdentityFile { path: String, reason: String },

    #[error("{0}: identity file is encrypted with age but not with a passphrase")]
    EncryptedWithoutPassphrase(String),

    #[error("{0}: an encrypted identity file may not contain another encrypted identity file")]
    NestedEncryptedIdentity(String),

    #[error("could not read passphrase: {0}")]
    PassphraseRead(String),

    #[error("passphrases didn't match")]
    PassphraseMismatch,

    #[error("a passphrase identity cannot be used as a recipient")]
    PassphraseAsRecipient,

    #[error("cannot derive a recipient from {0}")]
    RecipientDerivation(String),
}

/// YAML document and tag failures.
#[derive(Error, Debug)]
pub enum YamlError {
    #[error("yaml: {0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("input is not valid UTF-8")]
    NotUtf8,
}

/// Conflicting or incomplete options, detected before any input is read.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing recipients: use -r/--recipient, -R/--recipient-file or -p/--passphrase")]
    MissingRecipients,

    #[error("-p/--passphrase can't be combined with {0}")]
    PassphraseConflict(&'static str),

    #[error("--yaml-notag and --yaml-discard-notag can't be used simultaneously")]
    NoTagConflict,

    #[error("output file {0} exists")]
    OutputExists(PathBuf),

    #[error("standard input may only be used once per invocation")]
    StdinReused,

    #[error("refusing to write binary ciphertext to a terminal; use -a/--armor or force with \"-o -\"")]
    BinaryToTerminal,
}
