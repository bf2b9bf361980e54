//! Picocrypt - a very small, very simple, yet very secure encryption tool.
//!
//! A resilient password-based file encryption core and CLI that uses:
//! - XChaCha20 for encryption, cascaded with Serpent-CTR in paranoid mode
//! - Argon2id for key derivation, with optional keyfiles
//! - Keyed BLAKE2b-512 (or HMAC-SHA3-512) for stream authentication
//! - Reed-Solomon error correction for the header and, optionally, the body
//! - Zip bundling, volume splitting, and recombination around the
//!   cryptographic pass

pub mod archive;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod file;
pub mod header;
pub mod padding;
pub mod pipeline;
pub mod progress;
pub mod split;
pub mod types;
pub mod ui;
