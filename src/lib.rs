//! Leafage - transparent age encryption for YAML documents.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── encrypt       # encrypt command
//! │   ├── decrypt       # decrypt command
//! │   ├── rekey         # rekey command
//! │   ├── completions   # Shell completions
//! │   ├── io            # stdin/stdout/file plumbing
//! │   └── output        # stderr reporting helpers
//! └── core/             # Core library components
//!     ├── tag           # !crypto/age marker and attributes
//!     ├── cipher        # armored age encryption plumbing
//!     ├── passphrase    # run-scoped passphrase cache
//!     ├── identity      # identity chain: scrypt, SSH, x25519, encrypted files
//!     ├── recipient     # recipient parsing and derivation
//!     ├── visitor       # YAML tree visitor
//!     └── document      # multi-document stream driver
//! ```
//!
//! # Features
//!
//! - Values tagged `!crypto/age` are encrypted and decrypted in place,
//!   leaving the rest of the document untouched
//! - Whole-file mode for non-YAML payloads, armored or binary
//! - Identities: passphrases (prompted at most once per run), local and
//!   explicit SSH keys, x25519 key files, age-encrypted key files
//! - Rekey rewrites a document for a new set of recipients

pub mod cli;
pub mod core;
pub mod error;
