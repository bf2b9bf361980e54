//! Key derivation and keyfile handling.
//!
//! The password goes through Argon2id under one of two fixed profiles (the
//! paranoid profile doubles passes and lanes). Keyfiles are reduced to a
//! 32-byte key either by one running SHA3-256 over all of them in order, or
//! by XORing their individual digests, which makes the combination
//! commutative. The header stores `SHA3-512(argon key)` independent of the
//! keyfiles so a reader can tell a wrong password from wrong keyfiles.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use argon2::Algorithm::Argon2id;
use argon2::Version::V0x13;
use argon2::{Argon2, Params};
use rand::TryRng;
use rand::rngs::SysRng;
use sha3::digest::Digest;
use sha3::{Sha3_256, Sha3_512};
use zeroize::Zeroizing;

use crate::config::{
    ARGON_LANES, ARGON_LANES_PARANOID, ARGON_MEMORY, ARGON_TIME, ARGON_TIME_PARANOID, KEY_HASH_SIZE, KEY_SIZE,
    KEYFILE_HASH_SIZE, SALT_SIZE,
};
use crate::error::Result;

/// The combined keyfile key and its stored hash.
pub struct KeyfileKey {
    /// 32-byte key XORed into the cipher key.
    pub key: Zeroizing<[u8; KEY_SIZE]>,

    /// SHA3-256 of the key, stored in the header for verification.
    pub hash: [u8; KEYFILE_HASH_SIZE],
}

/// Every key an operation derives, wiped on drop.
pub struct KeyMaterial {
    /// The raw Argon2id output.
    pub argon_key: Zeroizing<[u8; KEY_SIZE]>,

    /// SHA3-512 of the Argon2 key, stored in the header.
    pub key_hash: [u8; KEY_HASH_SIZE],

    /// Combined keyfile key, when keyfiles are in play.
    pub keyfile: Option<KeyfileKey>,
}

impl KeyMaterial {
    /// Derives everything from the password, salt, and keyfiles.
    ///
    /// # Errors
    /// Fails when a keyfile cannot be read.
    pub fn derive(password: &str, salt: &[u8; SALT_SIZE], paranoid: bool, keyfiles: &[PathBuf], ordered: bool) -> Result<Self> {
        let argon_key = derive_key(password, salt, paranoid);

        let mut hasher = Sha3_512::new();
        hasher.update(argon_key.as_ref());
        let key_hash: [u8; KEY_HASH_SIZE] = hasher.finalize().into();

        let keyfile = combine_keyfiles(keyfiles, ordered)?;

        Ok(Self { argon_key, key_hash, keyfile })
    }

    /// The final XChaCha20 key: the Argon2 key XORed with the keyfile key
    /// when keyfiles are present.
    #[must_use]
    pub fn cipher_key(&self) -> Zeroizing<[u8; KEY_SIZE]> {
        let mut key = Zeroizing::new(*self.argon_key);
        if let Some(keyfile) = &self.keyfile {
            for (byte, keyfile_byte) in key.iter_mut().zip(keyfile.key.iter()) {
                *byte ^= keyfile_byte;
            }
        }
        key
    }

    /// The header value for the keyfile hash field: all zero when no
    /// keyfiles were supplied.
    #[must_use]
    pub fn keyfile_hash(&self) -> [u8; KEYFILE_HASH_SIZE] {
        self.keyfile.as_ref().map_or([0u8; KEYFILE_HASH_SIZE], |k| k.hash)
    }
}

/// Runs Argon2id under the profile selected by `paranoid`.
#[must_use]
pub fn derive_key(password: &str, salt: &[u8; SALT_SIZE], paranoid: bool) -> Zeroizing<[u8; KEY_SIZE]> {
    let (time, lanes) = if paranoid { (ARGON_TIME_PARANOID, ARGON_LANES_PARANOID) } else { (ARGON_TIME, ARGON_LANES) };

    let params = Params::new(ARGON_MEMORY, time, lanes, Some(KEY_SIZE)).expect("valid Argon2 parameters");
    let argon2 = Argon2::new(Argon2id, V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    argon2.hash_password_into(password.as_bytes(), salt, key.as_mut()).expect("argon2 accepts a 16-byte salt");
    key
}

/// Reduces the keyfiles to one 32-byte key.
///
/// Ordered: one running SHA3-256 over every keyfile's bytes in drop order.
/// Unordered: SHA3-256 each keyfile independently and XOR the digests, so
/// any permutation combines to the same key.
///
/// # Errors
/// Fails when a keyfile cannot be opened or read.
pub fn combine_keyfiles(keyfiles: &[PathBuf], ordered: bool) -> Result<Option<KeyfileKey>> {
    if keyfiles.is_empty() {
        return Ok(None);
    }

    let mut combined = Zeroizing::new([0u8; KEY_SIZE]);
    if ordered {
        let mut hasher = Sha3_256::new();
        for path in keyfiles {
            hash_file_into(path, &mut hasher)?;
        }
        *combined = hasher.finalize().into();
    } else {
        for path in keyfiles {
            let mut hasher = Sha3_256::new();
            hash_file_into(path, &mut hasher)?;
            let digest: [u8; KEY_SIZE] = hasher.finalize().into();
            for (byte, digest_byte) in combined.iter_mut().zip(digest.iter()) {
                *byte ^= digest_byte;
            }
        }
    }

    let mut hasher = Sha3_256::new();
    hasher.update(combined.as_ref());
    let hash: [u8; KEYFILE_HASH_SIZE] = hasher.finalize().into();

    Ok(Some(KeyfileKey { key: combined, hash }))
}

fn hash_file_into(path: &Path, hasher: &mut Sha3_256) -> Result<()> {
    let mut file = File::open(path)?;
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(())
}

/// Fills an array with bytes from the operating system's CSPRNG.
#[must_use]
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    SysRng.try_fill_bytes(&mut bytes).expect("os rng available");
    bytes
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn keyfile(dir: &std::path::Path, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_unordered_combination_is_commutative() {
        let dir = tempdir().unwrap();
        let k1 = keyfile(dir.path(), "k1", b"first keyfile");
        let k2 = keyfile(dir.path(), "k2", b"second keyfile");

        let forward = combine_keyfiles(&[k1.clone(), k2.clone()], false).unwrap().unwrap();
        let backward = combine_keyfiles(&[k2, k1], false).unwrap().unwrap();

        assert_eq!(forward.key.as_ref(), backward.key.as_ref());
        assert_eq!(forward.hash, backward.hash);
    }

    #[test]
    fn test_ordered_combination_is_not_commutative() {
        let dir = tempdir().unwrap();
        let k1 = keyfile(dir.path(), "k1", b"first keyfile");
        let k2 = keyfile(dir.path(), "k2", b"second keyfile");

        let forward = combine_keyfiles(&[k1.clone(), k2.clone()], true).unwrap().unwrap();
        let backward = combine_keyfiles(&[k2, k1], true).unwrap().unwrap();

        assert_ne!(forward.hash, backward.hash);
    }

    #[test]
    fn test_no_keyfiles_means_no_key() {
        assert!(combine_keyfiles(&[], true).unwrap().is_none());
        assert!(combine_keyfiles(&[], false).unwrap().is_none());
    }

    #[test]
    fn test_missing_keyfile_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(combine_keyfiles(&[missing], false).is_err());
    }

    #[test]
    fn test_random_bytes_differ() {
        let a: [u8; 32] = random_bytes();
        let b: [u8; 32] = random_bytes();
        assert_ne!(a, b);
    }
}
