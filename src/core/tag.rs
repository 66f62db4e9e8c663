//! The `!crypto/age` tag marker and its attributes.

/// Tag that marks a value for encryption/decryption.
pub const TAG: &str = "!crypto/age";

/// Prefix of the tag when an attribute list follows.
pub const TAG_PREFIX: &str = "!crypto/age:";

/// Parsed attribute list of a `!crypto/age:...` marker.
///
/// Attribute tokens are case-insensitive. Legacy style attributes are
/// accepted and discarded; `notag` is semantic; anything else is collected
/// in `unknown` and surfaced as a non-fatal error.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TagAttributes {
    /// Strip the tag marker from the serialized output after encrypting.
    pub no_tag: bool,
    /// Unrecognized attribute tokens.
    pub unknown: Vec<String>,
}

impl TagAttributes {
    /// Parse a tag marker.
    ///
    /// Returns `None` when the marker is not ours at all, in which case the
    /// node must pass through untouched.
    pub fn parse(marker: &str) -> Option<Self> {
        if marker == TAG {
            return Some(Self::default());
        }

        let list = marker.strip_prefix(TAG_PREFIX)?;
        let mut attrs = Self::default();
        for token in list.split(',') {
            match token.to_ascii_lowercase().as_str() {
                // Old style attributes, kept for backward compatibility.
                "doublequoted" | "singlequoted" | "literal" | "folded" | "flow" => {}
                "notag" => attrs.no_tag = true,
                _ => attrs.unknown.push(token.to_string()),
            }
        }
        Some(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_tag() {
        let attrs = TagAttributes::parse(TAG).unwrap();
        assert!(!attrs.no_tag);
        assert!(attrs.unknown.is_empty());
    }

    #[test]
    fn test_foreign_tag() {
        assert_eq!(TagAttributes::parse("!other"), None);
        assert_eq!(TagAttributes::parse("!crypto/agex"), None);
        assert_eq!(TagAttributes::parse("!!str"), None);
    }

    #[test]
    fn test_notag_attribute() {
        let attrs = TagAttributes::parse("!crypto/age:notag").unwrap();
        assert!(attrs.no_tag);
        assert!(attrs.unknown.is_empty());
    }

    #[test]
    fn test_attributes_are_case_insensitive() {
        let attrs = TagAttributes::parse("!crypto/age:NoTag").unwrap();
        assert!(attrs.no_tag);
    }

    #[test]
    fn test_legacy_style_attributes_discarded() {
        let attrs = TagAttributes::parse("!crypto/age:doublequoted,literal,flow").unwrap();
        assert!(!attrs.no_tag);
        assert!(attrs.unknown.is_empty());
    }

    #[test]
    fn test_unknown_attribute_collected() {
        let attrs = TagAttributes::parse("!crypto/age:notag,wat").unwrap();
        assert!(attrs.no_tag);
        assert_eq!(attrs.unknown, vec!["wat".to_string()]);
    }
}
