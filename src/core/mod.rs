//! Core library components.

pub mod cipher;
pub mod document;
pub mod identity;
pub mod passphrase;
pub mod recipient;
pub mod tag;
pub mod visitor;
