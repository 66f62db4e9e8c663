//! The identity chain: ordered decryption capabilities tried against every
//! envelope.
//!
//! Chain order is fixed: the lazy passphrase identity first, then
//! best-effort local SSH keys, then explicitly supplied identity files.
//! Unwrapping stops at the first identity that does not decline.

use std::fs;
use std::io::BufReader;
use std::sync::{Arc, Mutex, PoisonError};

use age::secrecy::SecretString;
use age::{scrypt, ssh, x25519, Callbacks, DecryptError, Identity};
use age_core::format::{FileKey, Stanza};
use dialoguer::Password;
use tracing::{debug, warn};

use crate::core::cipher;
use crate::core::passphrase::PassphraseCache;
use crate::error::{CipherError, Error, KeyError, Result};

/// Stanza type of passphrase-protected envelopes.
pub const SCRYPT_STANZA_TAG: &str = "scrypt";

/// A decryption capability. The variant set is closed: new kinds require
/// matching wire-format support anyway.
pub enum KeyIdentity {
    /// Prompts for a passphrase only when a passphrase envelope shows up.
    Passphrase(LazyPassphrase),
    /// A raw `AGE-SECRET-KEY-1...` line.
    X25519(x25519::Identity),
    /// An OpenSSH private key block.
    Ssh(SshIdentity),
    /// An identity file that is itself an age envelope.
    Encrypted(EncryptedIdentityFile),
}

impl Identity for KeyIdentity {
    fn unwrap_stanza(&self, stanza: &Stanza) -> Option<std::result::Result<FileKey, DecryptError>> {
        match self {
            Self::Passphrase(id) => id.unwrap_stanza(stanza),
            Self::X25519(id) => id.unwrap_stanza(stanza),
            Self::Ssh(id) => id.inner.unwrap_stanza(stanza),
            Self::Encrypted(id) => id.unwrap_stanza(stanza),
        }
    }

    fn unwrap_stanzas(
        &self,
        stanzas: &[Stanza],
    ) -> Option<std::result::Result<FileKey, DecryptError>> {
        match self {
            Self::Passphrase(id) => id.unwrap_stanzas(stanzas),
            Self::X25519(id) => id.unwrap_stanzas(stanzas),
            Self::Ssh(id) => id.inner.unwrap_stanzas(stanzas),
            Self::Encrypted(id) => id.unwrap_stanzas(stanzas),
        }
    }
}

/// Assemble the identity chain for one invocation.
///
/// `explicit` carries the already-read contents of `-i` files (name kept for
/// error reporting); reading them is the caller's concern so the `-` stdin
/// sentinel stays in the CLI layer.
pub fn build_chain(
    explicit: Vec<(String, Vec<u8>)>,
    cache: &Arc<PassphraseCache>,
) -> Result<Vec<KeyIdentity>> {
    let mut chain = vec![KeyIdentity::Passphrase(LazyPassphrase::new(cache.clone()))];
    discover_ssh_identities(&mut chain);
    for (name, contents) in explicit {
        chain.extend(parse_identity_data(&name, &contents, cache, true)?);
    }
    Ok(chain)
}

/// Load the default SSH keys if they exist and are well formed.
///
/// Discovery is best-effort: missing or unusable keys are skipped silently.
/// Passphrase-protected keys only prompt if they match a recipient stanza.
pub fn discover_ssh_identities(identities: &mut Vec<KeyIdentity>) {
    let Some(home) = dirs::home_dir() else {
        return;
    };
    for file in ["id_rsa", "id_ed25519"] {
        let path = home.join(".ssh").join(file);
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(_) => continue,
        };
        match parse_ssh_identity(&path.display().to_string(), &contents) {
            Ok(identity) => {
                debug!(path = %path.display(), "discovered SSH identity");
                identities.push(KeyIdentity::Ssh(identity));
            }
            Err(err) => {
                debug!(path = %path.display(), "skipping unusable SSH key: {}", err);
            }
        }
    }
}

/// Parse the contents of one identity file.
///
/// Recognizes, in order: an age envelope (armored or binary, handled as an
/// encrypted identity file), an OpenSSH private key block, and otherwise a
/// line-oriented file of `AGE-SECRET-KEY-1...` entries where blank lines and
/// `#` comments are skipped.
///
/// `allow_encrypted` bounds the encrypted-identity-file recursion to one
/// level: the decrypted content of an encrypted identity file must be a
/// plain identity file.
pub fn parse_identity_data(
    name: &str,
    contents: &[u8],
    cache: &Arc<PassphraseCache>,
    allow_encrypted: bool,
) -> Result<Vec<KeyIdentity>> {
    if contents.starts_with(b"age-encryption.org/")
        || contents.starts_with(cipher::ARMOR_HEADER.as_bytes())
    {
        if !allow_encrypted {
            return Err(KeyError::NestedEncryptedIdentity(name.to_string()).into());
        }
        debug!(file = %name, "identity file is age-encrypted, deferring decryption");
        return Ok(vec![KeyIdentity::Encrypted(EncryptedIdentityFile::new(
            name.to_string(),
            contents.to_vec(),
            cache.clone(),
        ))]);
    }

    if contents.starts_with(b"-----BEGIN") {
        return Ok(vec![KeyIdentity::Ssh(parse_ssh_identity(name, contents)?)]);
    }

    let text = std::str::from_utf8(contents).map_err(|_| KeyError::InvalidIdentityFile {
        path: name.to_string(),
        reason: "not valid UTF-8".to_string(),
    })?;

    let mut identities = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let identity =
            line.parse::<x25519::Identity>()
                .map_err(|e| KeyError::InvalidIdentityFile {
                    path: name.to_string(),
                    reason: format!("line {}: {}", number + 1, e),
                })?;
        identities.push(KeyIdentity::X25519(identity));
    }

    if identities.is_empty() {
        return Err(KeyError::InvalidIdentityFile {
            path: name.to_string(),
            reason: "no identities found".to_string(),
        }
        .into());
    }
    Ok(identities)
}

/// An OpenSSH private key usable as an age identity.
pub struct SshIdentity {
    inner: Box<dyn Identity>,
    /// OpenSSH public key line, kept for recipient derivation.
    public: Option<String>,
    path: String,
}

impl SshIdentity {
    /// The OpenSSH public key line for this key, when the key type supports
    /// recipient derivation.
    pub fn public_line(&self) -> Option<&str> {
        self.public.as_deref()
    }

    /// Where the key was read from.
    pub fn path(&self) -> &str {
        &self.path
    }
}

fn parse_ssh_identity(name: &str, contents: &[u8]) -> Result<SshIdentity> {
    let identity = ssh::Identity::from_buffer(BufReader::new(contents), Some(name.to_string()))
        .map_err(|e| KeyError::InvalidIdentityFile {
            path: name.to_string(),
            reason: e.to_string(),
        })?;

    if matches!(identity, ssh::Identity::Unsupported(_)) {
        return Err(KeyError::InvalidIdentityFile {
            path: name.to_string(),
            reason: "unsupported SSH key type".to_string(),
        }
        .into());
    }

    Ok(SshIdentity {
        inner: Box::new(identity.with_callbacks(UiCallbacks)),
        public: ssh_public_line(contents),
        path: name.to_string(),
    })
}

/// Derive the OpenSSH public key line from a private key. The public half
/// is cleartext even in passphrase-protected keys.
fn ssh_public_line(contents: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(contents).ok()?;
    let key = ssh_key::PrivateKey::from_openssh(text).ok()?;
    key.public_key().to_openssh().ok()
}

/// Terminal callbacks for passphrase-protected SSH keys.
#[derive(Clone)]
struct UiCallbacks;

impl Callbacks for UiCallbacks {
    fn display_message(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn confirm(&self, _message: &str, _yes_string: &str, _no_string: Option<&str>) -> Option<bool> {
        None
    }

    fn request_public_string(&self, _description: &str) -> Option<String> {
        None
    }

    fn request_passphrase(&self, description: &str) -> Option<SecretString> {
        Password::new()
            .with_prompt(description)
            .interact()
            .ok()
            .map(SecretString::from)
    }
}

/// The lazy scrypt identity.
///
/// Never prompts for envelopes without a passphrase stanza. A passphrase
/// stanza mixed with any other stanza is a hard error: passphrase-protected
/// envelopes carry exactly one stanza.
pub struct LazyPassphrase {
    cache: Arc<PassphraseCache>,
}

impl LazyPassphrase {
    pub fn new(cache: Arc<PassphraseCache>) -> Self {
        Self { cache }
    }
}

impl Identity for LazyPassphrase {
    fn unwrap_stanza(&self, stanza: &Stanza) -> Option<std::result::Result<FileKey, DecryptError>> {
        self.unwrap_stanzas(std::slice::from_ref(stanza))
    }

    fn unwrap_stanzas(
        &self,
        stanzas: &[Stanza],
    ) -> Option<std::result::Result<FileKey, DecryptError>> {
        let has_scrypt = stanzas.iter().any(|s| s.tag == SCRYPT_STANZA_TAG);
        if !has_scrypt {
            // Not a passphrase envelope: decline without prompting.
            return None;
        }
        if stanzas.len() != 1 {
            warn!("a passphrase recipient must be the only one");
            return Some(Err(DecryptError::InvalidHeader));
        }

        let phrase = match self.cache.get() {
            Ok(phrase) => phrase,
            Err(err) => {
                warn!("{}", err);
                return Some(Err(DecryptError::KeyDecryptionFailed));
            }
        };
        scrypt::Identity::new(phrase).unwrap_stanzas(stanzas)
    }
}

/// An identity file whose whole content is itself an age envelope.
///
/// Decryption is deferred until the first unwrap attempt (or recipient
/// derivation) and goes through the lazy passphrase identity, so the prompt
/// still fires at most once per run.
pub struct EncryptedIdentityFile {
    name: String,
    contents: Vec<u8>,
    cache: Arc<PassphraseCache>,
    inner: Mutex<Option<Arc<Vec<KeyIdentity>>>>,
}

impl EncryptedIdentityFile {
    fn new(name: String, contents: Vec<u8>, cache: Arc<PassphraseCache>) -> Self {
        Self {
            name,
            contents,
            cache,
            inner: Mutex::new(None),
        }
    }

    /// Decrypt and parse the wrapped identities, memoized per run.
    pub fn identities(&self) -> Result<Arc<Vec<KeyIdentity>>> {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(identities) = slot.as_ref() {
            return Ok(identities.clone());
        }

        debug!(file = %self.name, "decrypting encrypted identity file");
        let chain = [KeyIdentity::Passphrase(LazyPassphrase::new(
            self.cache.clone(),
        ))];
        let plain = match cipher::decrypt(&self.contents, &chain) {
            Ok(plain) => plain,
            Err(Error::Cipher(CipherError::NoMatchingIdentity)) => {
                return Err(KeyError::EncryptedWithoutPassphrase(self.name.clone()).into());
            }
            Err(err) => return Err(err),
        };

        // Once decrypted, the content must be a plain identity file.
        let identities = Arc::new(parse_identity_data(
            &self.name,
            &plain,
            &self.cache,
            false,
        )?);
        *slot = Some(identities.clone());
        Ok(identities)
    }
}

impl Identity for EncryptedIdentityFile {
    fn unwrap_stanza(&self, stanza: &Stanza) -> Option<std::result::Result<FileKey, DecryptError>> {
        self.unwrap_stanzas(std::slice::from_ref(stanza))
    }

    fn unwrap_stanzas(
        &self,
        stanzas: &[Stanza],
    ) -> Option<std::result::Result<FileKey, DecryptError>> {
        let identities = match self.identities() {
            Ok(identities) => identities,
            Err(err) => {
                warn!(file = %self.name, "{}", err);
                return Some(Err(DecryptError::KeyDecryptionFailed));
            }
        };

        for identity in identities.iter() {
            match identity.unwrap_stanzas(stanzas) {
                None => continue,
                result => return result,
            }
        }
        warn!(file = %self.name, "no identity in the encrypted file matched a recipient stanza");
        None
    }
}
