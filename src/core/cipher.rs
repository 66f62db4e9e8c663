//! Armored age encryption plumbing shared by the stream and YAML paths.
//!
//! Everything here goes through trait objects so the same code serves
//! x25519, SSH, scrypt and encrypted-file capabilities.

use std::io::{Read, Write};

use age::armor::{ArmoredReader, ArmoredWriter, Format};
use age::DecryptError;
use tracing::trace;

use crate::core::identity::KeyIdentity;
use crate::error::{CipherError, Result};

/// First line of an armored age file.
pub const ARMOR_HEADER: &str = "-----BEGIN AGE ENCRYPTED FILE-----";

/// Last line of an armored age file.
pub const ARMOR_FOOTER: &str = "-----END AGE ENCRYPTED FILE-----";

/// Whether `data` is a complete armored age file.
///
/// Anything outside the header/footer markers disqualifies the payload from
/// being treated as already-encrypted.
pub fn is_armored(data: &str) -> bool {
    let trimmed = data.trim();
    trimmed.starts_with(ARMOR_HEADER) && trimmed.ends_with(ARMOR_FOOTER)
}

/// Encrypt `plaintext` for `recipients`, armored or binary per `format`.
pub fn encrypt(
    plaintext: &[u8],
    recipients: &[Box<dyn age::Recipient + Send>],
    format: Format,
) -> Result<Vec<u8>> {
    trace!(
        recipients = recipients.len(),
        plaintext_len = plaintext.len(),
        "encrypting"
    );

    let encryptor = age::Encryptor::with_recipients(
        recipients.iter().map(|r| r.as_ref() as &dyn age::Recipient),
    )
    .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(
            ArmoredWriter::wrap_output(&mut encrypted, format).map_err(CipherError::Io)?,
        )
        .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;

    writer.write_all(plaintext).map_err(CipherError::Io)?;
    let armored = writer
        .finish()
        .map_err(|e| CipherError::EncryptionFailed(format!("{}", e)))?;
    armored
        .finish()
        .map_err(|e| CipherError::ArmorFailed(format!("{}", e)))?;

    trace!(ciphertext_len = encrypted.len(), "encrypted");

    Ok(encrypted)
}

/// Encrypt a textual payload to an armored envelope.
pub fn encrypt_armored(
    plaintext: &str,
    recipients: &[Box<dyn age::Recipient + Send>],
) -> Result<String> {
    let encrypted = encrypt(plaintext.as_bytes(), recipients, Format::AsciiArmor)?;
    String::from_utf8(encrypted)
        .map_err(|e| CipherError::ArmorFailed(format!("UTF-8 error: {}", e)).into())
}

/// Decrypt `ciphertext` by trying `identities` in order.
///
/// Armor is detected automatically; binary input passes straight through.
/// The first identity that does not decline wins; an identity returning a
/// hard error aborts immediately.
pub fn decrypt(ciphertext: &[u8], identities: &[KeyIdentity]) -> Result<Vec<u8>> {
    trace!(
        identities = identities.len(),
        ciphertext_len = ciphertext.len(),
        "decrypting"
    );

    let reader = ArmoredReader::new(ciphertext);
    let decryptor = age::Decryptor::new(reader).map_err(decrypt_error)?;

    let mut decrypted = Vec::new();
    let mut reader = decryptor
        .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
        .map_err(decrypt_error)?;
    reader
        .read_to_end(&mut decrypted)
        .map_err(CipherError::Io)?;

    trace!(plaintext_len = decrypted.len(), "decrypted");

    Ok(decrypted)
}

/// Decrypt an armored textual envelope to its textual payload.
pub fn decrypt_armored(ciphertext: &str, identities: &[KeyIdentity]) -> Result<String> {
    let decrypted = decrypt(ciphertext.as_bytes(), identities)?;
    String::from_utf8(decrypted)
        .map_err(|e| CipherError::DecryptionFailed(format!("UTF-8 error: {}", e)).into())
}

fn decrypt_error(err: DecryptError) -> CipherError {
    match err {
        DecryptError::NoMatchingKeys => CipherError::NoMatchingIdentity,
        other => CipherError::DecryptionFailed(format!("{}", other)),
    }
}
