//! The YAML tree visitor.
//!
//! One visitor performs one directional pass over a document: decrypt
//! (identities, no recipients), encrypt (recipients, `no_decrypt`), or the
//! combined decrypt-then-encrypt used by single-pass re-encryption.
//!
//! Node-local failures never abort the pass. They are accumulated and the
//! offending node is left untouched, so one bad envelope cannot destroy the
//! rest of the document.

use serde_yaml::value::{Tag, TaggedValue};
use serde_yaml::Value;
use tracing::debug;

use crate::core::cipher;
use crate::core::identity::KeyIdentity;
use crate::core::tag::TagAttributes;
use crate::error::{Error, YamlError};

/// Per-pass behavior switches.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisitorOptions {
    /// Leave armored payloads untouched; only encrypt plaintext nodes.
    pub no_decrypt: bool,
    /// Strip the tag marker from every processed node.
    pub force_no_tag: bool,
    /// Ignore the `notag` attribute, keeping tags on freshly encrypted nodes.
    pub discard_no_tag: bool,
}

/// Walks a YAML value and rewrites `!crypto/age` tagged nodes.
pub struct Visitor<'a> {
    identities: &'a [KeyIdentity],
    recipients: &'a [Box<dyn age::Recipient + Send>],
    options: VisitorOptions,
    errors: Vec<Error>,
}

impl<'a> Visitor<'a> {
    pub fn new(
        identities: &'a [KeyIdentity],
        recipients: &'a [Box<dyn age::Recipient + Send>],
        options: VisitorOptions,
    ) -> Self {
        Self {
            identities,
            recipients,
            options,
            errors: Vec::new(),
        }
    }

    /// Errors accumulated so far, draining the visitor.
    pub fn take_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }

    /// Transform one document tree.
    pub fn transform(&mut self, value: Value) -> Value {
        match value {
            Value::Mapping(mapping) => Value::Mapping(
                mapping
                    .into_iter()
                    .map(|(k, v)| (self.transform(k), self.transform(v)))
                    .collect(),
            ),
            Value::Sequence(sequence) => Value::Sequence(
                sequence.into_iter().map(|v| self.transform(v)).collect(),
            ),
            Value::Tagged(tagged) => self.visit_tagged(*tagged),
            other => other,
        }
    }

    fn visit_tagged(&mut self, tagged: TaggedValue) -> Value {
        let marker = marker_of(&tagged.tag);
        let Some(attrs) = TagAttributes::parse(&marker) else {
            // Foreign tag: keep it, still walk its children.
            return Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value: self.transform(tagged.value),
            }));
        };

        for token in &attrs.unknown {
            self.errors
                .push(YamlError::UnknownAttribute(token.clone()).into());
        }

        let mut value = tagged.value;
        if !self.options.no_decrypt {
            value = self.decrypt_node(value);
        }

        let encrypting = !self.recipients.is_empty();
        let (value, fresh) = if encrypting {
            self.encrypt_node(value)
        } else {
            (value, false)
        };

        // The notag attribute only takes effect on a freshly encrypted
        // node; an envelope passed through untouched keeps its marker so
        // the document stays re-processable. The same goes for a node whose
        // decryption failed: the payload is still armored and must keep its
        // marker even under force_no_tag.
        let strip = if encrypting {
            fresh
                && (self.options.force_no_tag
                    || (attrs.no_tag && !self.options.discard_no_tag))
        } else {
            self.options.force_no_tag
                && !matches!(&value, Value::String(s) if cipher::is_armored(s))
        };

        if strip {
            value
        } else {
            Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value,
            }))
        }
    }

    /// Replace an armored scalar with its decrypted value. Plaintext nodes
    /// and non-string nodes pass through.
    fn decrypt_node(&mut self, value: Value) -> Value {
        let Value::String(ciphertext) = &value else {
            return value;
        };
        if !cipher::is_armored(ciphertext) {
            return value;
        }

        let plain = match cipher::decrypt_armored(ciphertext, self.identities) {
            Ok(plain) => plain,
            Err(err) => {
                debug!("leaving node encrypted: {}", err);
                self.errors.push(err);
                return value;
            }
        };
        match serde_yaml::from_str(&plain) {
            Ok(decrypted) => decrypted,
            Err(err) => {
                self.errors.push(YamlError::Syntax(err).into());
                value
            }
        }
    }

    /// Encrypt a plaintext node, returning whether a fresh envelope was
    /// produced. An already-armored scalar passes through untouched, which
    /// makes repeated encryption idempotent.
    fn encrypt_node(&mut self, value: Value) -> (Value, bool) {
        if let Value::String(text) = &value {
            if cipher::is_armored(text) {
                return (value, false);
            }
        }

        let serialized = match serde_yaml::to_string(&value) {
            Ok(serialized) => serialized,
            Err(err) => {
                self.errors.push(YamlError::Syntax(err).into());
                return (value, false);
            }
        };
        match cipher::encrypt_armored(&serialized, self.recipients) {
            Ok(armored) => (Value::String(armored), true),
            Err(err) => {
                self.errors.push(err);
                (value, false)
            }
        }
    }
}

/// Render a tag back to its `!`-prefixed source form.
fn marker_of(tag: &Tag) -> String {
    let rendered = tag.to_string();
    if rendered.starts_with('!') {
        rendered
    } else {
        format!("!{}", rendered)
    }
}
