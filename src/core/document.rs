//! Multi-document YAML stream driver.
//!
//! A stream is processed document by document; every document gets its own
//! visitor pass and the results are re-joined with `---` separators.

use serde::Deserialize;
use serde_yaml::{Deserializer, Value};
use tracing::debug;

use crate::core::identity::KeyIdentity;
use crate::core::visitor::{Visitor, VisitorOptions};
use crate::error::{Error, Result, YamlError};

/// Result of a stream transformation: the serialized output plus any
/// node-local errors that did not abort the run.
pub struct Outcome {
    pub output: String,
    pub warnings: Vec<Error>,
}

/// Run one visitor pass over every document in `input`.
///
/// Syntax errors are fatal; node-local cipher errors are collected into the
/// outcome's warnings.
pub fn transform_stream(
    input: &str,
    identities: &[KeyIdentity],
    recipients: &[Box<dyn age::Recipient + Send>],
    options: VisitorOptions,
) -> Result<Outcome> {
    let mut documents = Vec::new();
    let mut warnings = Vec::new();

    for deserializer in Deserializer::from_str(input) {
        let value = Value::deserialize(deserializer).map_err(YamlError::Syntax)?;
        let mut visitor = Visitor::new(identities, recipients, options);
        documents.push(visitor.transform(value));
        warnings.extend(visitor.take_errors());
    }
    debug!(documents = documents.len(), "stream transformed");

    Ok(Outcome {
        output: serialize_stream(&documents)?,
        warnings,
    })
}

/// Re-encrypt a stream for a new set of recipients.
///
/// Two decoupled passes: first decrypt everything the identities can open,
/// then encrypt every still-tagged plaintext node for the new recipients.
/// Envelopes the identities could not open are reported in the warnings and
/// come out unchanged, still encrypted for the old recipients. The `notag`
/// attribute is ignored so no marker is lost across the rewrite.
pub fn rekey_stream(
    input: &str,
    identities: &[KeyIdentity],
    recipients: &[Box<dyn age::Recipient + Send>],
    force_no_tag: bool,
) -> Result<Outcome> {
    let decrypted = transform_stream(
        input,
        identities,
        &[],
        VisitorOptions {
            no_decrypt: false,
            force_no_tag: false,
            discard_no_tag: true,
        },
    )?;

    let mut reencrypted = transform_stream(
        &decrypted.output,
        &[],
        recipients,
        VisitorOptions {
            no_decrypt: true,
            force_no_tag,
            discard_no_tag: true,
        },
    )?;

    let mut warnings = decrypted.warnings;
    warnings.append(&mut reencrypted.warnings);
    Ok(Outcome {
        output: reencrypted.output,
        warnings,
    })
}

/// Serialize documents back to one stream, `---`-separated.
fn serialize_stream(documents: &[Value]) -> Result<String> {
    let mut output = String::new();
    for (index, document) in documents.iter().enumerate() {
        if index > 0 {
            output.push_str("---\n");
        }
        output.push_str(&serde_yaml::to_string(document).map_err(YamlError::Syntax)?);
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use age::x25519;

    use super::*;

    fn keypair() -> (Vec<KeyIdentity>, Vec<Box<dyn age::Recipient + Send>>) {
        let identity = x25519::Identity::generate();
        let recipient: Box<dyn age::Recipient + Send> = Box::new(identity.to_public());
        (vec![KeyIdentity::X25519(identity)], vec![recipient])
    }

    fn encrypt_options() -> VisitorOptions {
        VisitorOptions {
            no_decrypt: true,
            ..VisitorOptions::default()
        }
    }

    #[test]
    fn test_multi_document_roundtrip() {
        let (identities, recipients) = keypair();
        let input = "a: !crypto/age one\n---\nb: !crypto/age two\n";

        let encrypted =
            transform_stream(input, &[], &recipients, encrypt_options()).unwrap();
        assert!(encrypted.warnings.is_empty());
        let separators = encrypted.output.lines().filter(|l| *l == "---").count();
        assert_eq!(separators, 1);
        assert!(!encrypted.output.contains("one"));
        assert!(!encrypted.output.contains("two"));

        let decrypted = transform_stream(
            &encrypted.output,
            &identities,
            &[],
            VisitorOptions::default(),
        )
        .unwrap();
        assert!(decrypted.output.contains("a: !crypto/age one"));
        assert!(decrypted.output.contains("b: !crypto/age two"));
    }

    #[test]
    fn test_empty_stream() {
        let outcome = transform_stream("", &[], &[], encrypt_options()).unwrap();
        assert_eq!(outcome.output, "");
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_syntax_error_is_fatal() {
        let err = transform_stream("a: [unclosed\n", &[], &[], encrypt_options()).err().unwrap();
        assert!(matches!(err, Error::Yaml(YamlError::Syntax(_))));
    }

    #[test]
    fn test_rekey_moves_to_new_recipients() {
        let (old_ids, old_recipients) = keypair();
        let (new_ids, new_recipients) = keypair();
        let input = "secret: !crypto/age s3cr3t\n";

        let encrypted =
            transform_stream(input, &[], &old_recipients, encrypt_options()).unwrap();

        let rekeyed =
            rekey_stream(&encrypted.output, &old_ids, &new_recipients, false).unwrap();
        assert!(rekeyed.warnings.is_empty());
        assert!(!rekeyed.output.contains("s3cr3t"));

        // Only the new identity can open the result.
        let with_new = transform_stream(
            &rekeyed.output,
            &new_ids,
            &[],
            VisitorOptions::default(),
        )
        .unwrap();
        assert!(with_new.warnings.is_empty());
        assert!(with_new.output.contains("s3cr3t"));

        let with_old = transform_stream(
            &rekeyed.output,
            &old_ids,
            &[],
            VisitorOptions::default(),
        )
        .unwrap();
        assert_eq!(with_old.warnings.len(), 1);
        assert!(!with_old.output.contains("s3cr3t"));
    }

    #[test]
    fn test_rekey_keeps_unopenable_envelopes() {
        let (_, stranger_recipients) = keypair();
        let (our_ids, our_recipients) = keypair();
        let (new_ids, new_recipients) = keypair();

        let stranger = transform_stream(
            "theirs: !crypto/age untouchable\n",
            &[],
            &stranger_recipients,
            encrypt_options(),
        )
        .unwrap();
        let ours = transform_stream(
            "ours: !crypto/age movable\n",
            &[],
            &our_recipients,
            encrypt_options(),
        )
        .unwrap();
        let input = format!("{}---\n{}", stranger.output, ours.output);

        let rekeyed = rekey_stream(&input, &our_ids, &new_recipients, false).unwrap();
        // The stranger's envelope could not be opened: reported, kept as-is.
        assert_eq!(rekeyed.warnings.len(), 1);

        let check =
            transform_stream(&rekeyed.output, &new_ids, &[], VisitorOptions::default())
                .unwrap();
        assert!(check.output.contains("movable"));
        assert!(!check.output.contains("untouchable"));
    }

    #[test]
    fn test_rekey_ignores_notag_attribute() {
        let (ids, old_recipients) = keypair();
        let (_, new_recipients) = keypair();

        let input = "secret: !crypto/age:notag s3cr3t\n";
        // Encrypt with the attribute discarded so the marker is still there
        // to drive the rekey.
        let encrypted = transform_stream(
            input,
            &[],
            &old_recipients,
            VisitorOptions {
                no_decrypt: true,
                discard_no_tag: true,
                ..VisitorOptions::default()
            },
        )
        .unwrap();

        let rekeyed = rekey_stream(&encrypted.output, &ids, &new_recipients, false).unwrap();
        assert!(rekeyed.output.contains("!crypto/age:notag"));
    }
}
