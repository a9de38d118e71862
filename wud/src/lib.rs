//! Decryption core for encrypted Wii U disc images (WUD/WUX).
//!
//! The crate turns an encrypted disc image - a raw dump, a set of
//! fixed-size dump parts, or a sector-remapped compressed container - into
//! verified plaintext byte ranges. Integrity of everything decrypted from
//! hashed contents is checked against the image's embedded SHA-1 hash tree.
//!
//! | Module | Role |
//! |--------|------|
//! | [`store`]   | raw byte-range readers over the three on-disk layouts |
//! | [`address`] | sector-aligned logical reads over any store |
//! | [`crypto`]  | AES-128-CBC primitive and IV derivation |
//! | [`title`]   | content metadata consumed from the TMD layer |
//! | [`decrypt`] | plain and hash-tree content decryption |
//! | [`copier`]  | window copies and the bounded streaming pipe |
//!
//! Parsing of TMD/ticket binaries and of the on-disc file system table is
//! out of scope; their results enter through [`title::ContentEntry`] and
//! [`title::H3Table`].

pub mod address;
pub mod copier;
pub mod crypto;
pub mod decrypt;
pub mod store;
pub mod title;

mod error;

pub use error::Error;

/// A `Result` alias where the `Err` case is `wud::Error`.
pub type Result<T> = std::result::Result<T, Error>;
