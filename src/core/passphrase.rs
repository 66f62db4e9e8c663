//! Run-scoped passphrase handling.

use std::sync::{Mutex, PoisonError};

use age::secrecy::SecretString;
use dialoguer::Password;
use tracing::debug;

use crate::error::{KeyError, Result};

/// Caches the passphrase for the lifetime of one process run.
///
/// The first caller pays the interactive prompt; every later request reuses
/// the same value, so a run that touches many passphrase-protected envelopes
/// prompts at most once. One instance is created per invocation and shared
/// (behind `Arc`) between the lazy scrypt identity and any encrypted
/// identity files; the inner mutex keeps the prompt-once guarantee even if
/// callers ever run concurrently.
pub struct PassphraseCache {
    cached: Mutex<Option<SecretString>>,
}

impl PassphraseCache {
    /// An empty cache; the first `get` prompts interactively.
    pub fn new() -> Self {
        Self {
            cached: Mutex::new(None),
        }
    }

    /// A cache pre-seeded with a known passphrase; `get` never prompts.
    pub fn preset(passphrase: SecretString) -> Self {
        Self {
            cached: Mutex::new(Some(passphrase)),
        }
    }

    /// Return the cached passphrase, prompting the user on first use.
    pub fn get(&self) -> Result<SecretString> {
        let mut slot = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(phrase) = slot.as_ref() {
            return Ok(phrase.clone());
        }

        debug!("prompting for passphrase");
        let phrase = Password::new()
            .with_prompt("Enter passphrase")
            .interact()
            .map_err(|e| KeyError::PassphraseRead(e.to_string()))?;
        let phrase = SecretString::from(phrase);
        *slot = Some(phrase.clone());
        Ok(phrase)
    }
}

impl Default for PassphraseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Prompt for a new passphrase with confirmation (encryption direction).
///
/// A confirmation mismatch is fatal, matching the contract that a bad
/// confirmation must never silently encrypt.
pub fn prompt_for_encryption() -> Result<SecretString> {
    let phrase = Password::new()
        .with_prompt("Enter passphrase")
        .interact()
        .map_err(|e| KeyError::PassphraseRead(e.to_string()))?;
    let confirm = Password::new()
        .with_prompt("Confirm passphrase")
        .interact()
        .map_err(|e| KeyError::PassphraseRead(e.to_string()))?;

    if phrase != confirm {
        return Err(KeyError::PassphraseMismatch.into());
    }

    Ok(SecretString::from(phrase))
}

#[cfg(test)]
mod tests {
    use age::secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn test_preset_cache_never_prompts() {
        let cache = PassphraseCache::preset(SecretString::from("hunter2".to_string()));
        let first = cache.get().unwrap();
        let second = cache.get().unwrap();
        assert_eq!(first.expose_secret(), "hunter2");
        assert_eq!(second.expose_secret(), "hunter2");
    }
}
