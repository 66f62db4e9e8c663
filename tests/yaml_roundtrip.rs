//! Round-trip properties of the YAML transformation.

use age::x25519;
use leafage::core::document::{rekey_stream, transform_stream};
use leafage::core::identity::KeyIdentity;
use leafage::core::visitor::VisitorOptions;

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

fn encrypt(input: &str, recipients: &[Box<dyn age::Recipient + Send>]) -> String {
    let outcome = transform_stream(input, &[], recipients, encrypt_options()).unwrap();
    assert!(outcome.warnings.is_empty());
    outcome.output
}

fn decrypt(input: &str, identities: &[KeyIdentity]) -> String {
    let outcome = transform_stream(input, identities, &[], VisitorOptions::default()).unwrap();
    assert!(outcome.warnings.is_empty());
    outcome.output
}

#[test]
fn test_tagged_scalar_roundtrip() {
    let (identities, recipients) = keypair();
    let input = "user: alice\nsecret: !crypto/age s3cr3t\n";

    let encrypted = encrypt(input, &recipients);
    assert!(encrypted.contains("user: alice"));
    assert!(encrypted.contains("!crypto/age"));
    assert!(encrypted.contains("-----BEGIN AGE ENCRYPTED FILE-----"));
    assert!(!encrypted.contains("s3cr3t"));

    let decrypted = decrypt(&encrypted, &identities);
    assert_eq!(decrypted, input);
}

#[test]
fn test_encrypting_twice_is_identity() {
    let (_, recipients) = keypair();
    let input = "secret: !crypto/age s3cr3t\nother: !crypto/age more\n";

    let once = encrypt(input, &recipients);
    let twice = encrypt(&once, &recipients);
    assert_eq!(once, twice);
}

#[test]
fn test_untagged_documents_pass_through() {
    let (_, recipients) = keypair();
    let input = "a: 1\nb:\n- x\n- y\nc:\n  d: true\n";

    assert_eq!(encrypt(input, &recipients), input);
}

#[test]
fn test_multi_document_stream_keeps_structure() {
    let (identities, recipients) = keypair();
    let input = "first: !crypto/age one\n---\nsecond: plain\n---\nthird: !crypto/age two\n";

    let encrypted = encrypt(input, &recipients);
    let separators = encrypted.lines().filter(|l| *l == "---").count();
    assert_eq!(separators, 2);
    assert!(encrypted.contains("second: plain"));

    let decrypted = decrypt(&encrypted, &identities);
    assert_eq!(decrypted, input);
}

#[test]
fn test_notag_attribute_strips_marker() {
    let (_, recipients) = keypair();
    let input = "secret: !crypto/age:notag s3cr3t\n";

    let encrypted = encrypt(input, &recipients);
    assert!(!encrypted.contains("!crypto/age"));
    assert!(encrypted.contains("-----BEGIN AGE ENCRYPTED FILE-----"));
}

#[test]
fn test_discard_notag_keeps_marker() {
    let (_, recipients) = keypair();
    let input = "secret: !crypto/age:notag s3cr3t\n";

    let options = VisitorOptions {
        no_decrypt: true,
        discard_no_tag: true,
        ..VisitorOptions::default()
    };
    let outcome = transform_stream(input, &[], &recipients, options).unwrap();
    assert!(outcome.output.contains("!crypto/age:notag"));
}

#[test]
fn test_force_notag_strips_every_marker_on_decrypt() {
    let (identities, recipients) = keypair();
    let encrypted = encrypt("secret: !crypto/age s3cr3t\n", &recipients);

    let options = VisitorOptions {
        force_no_tag: true,
        ..VisitorOptions::default()
    };
    let outcome = transform_stream(&encrypted, &identities, &[], options).unwrap();
    assert_eq!(outcome.output, "secret: s3cr3t\n");
}

#[test]
fn test_wrong_identity_reports_and_keeps_ciphertext() {
    let (_, recipients) = keypair();
    let (strangers, _) = keypair();
    let encrypted = encrypt("secret: !crypto/age s3cr3t\n", &recipients);

    let outcome =
        transform_stream(&encrypted, &strangers, &[], VisitorOptions::default()).unwrap();
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.output.contains("-----BEGIN AGE ENCRYPTED FILE-----"));
    assert!(!outcome.output.contains("s3cr3t"));
}

#[test]
fn test_rekey_roundtrip_preserves_plaintext() {
    let (old_ids, old_recipients) = keypair();
    let (new_ids, new_recipients) = keypair();
    let input = "app:\n  token: !crypto/age tok-123\n";

    let encrypted = encrypt(input, &old_recipients);
    let rekeyed = rekey_stream(&encrypted, &old_ids, &new_recipients, false).unwrap();
    assert!(rekeyed.warnings.is_empty());
    assert!(rekeyed.output.contains("!crypto/age"));

    assert_eq!(decrypt(&rekeyed.output, &new_ids), input);
}

#[test]
fn test_nested_and_sequence_values() {
    let (identities, recipients) = keypair();
    let input = "\
database:
  password: !crypto/age hunter2
servers:
- name: a
  key: !crypto/age alpha
- name: b
  key: !crypto/age beta
";

    let encrypted = encrypt(input, &recipients);
    assert!(!encrypted.contains("hunter2"));
    assert!(!encrypted.contains("alpha"));
    assert!(!encrypted.contains("beta"));

    assert_eq!(decrypt(&encrypted, &identities), input);
}
