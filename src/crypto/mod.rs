//! Cryptographic primitives for the volume format.

pub mod kdf;
pub mod stream;

pub use kdf::{KeyMaterial, KeyfileKey, combine_keyfiles, derive_key, random_bytes};
pub use stream::BodyCipher;
