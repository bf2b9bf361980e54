//! Streaming cipher and body authentication.
//!
//! XChaCha20 is the primary cipher, keyed directly with the cipher key and
//! the header nonce. HKDF-SHA3-256 expands the cipher key into two subkeys:
//! the first 32 bytes key the body MAC, the next 32 key the Serpent cascade.
//! That order is load-bearing; both sides must consume the HKDF stream
//! identically.
//!
//! The MAC always covers the XChaCha20 output stream in file order: on
//! encryption it is updated after the ChaCha pass and before any
//! Reed-Solomon expansion, on decryption after Reed-Solomon repair and
//! before the ChaCha pass. Paranoid mode swaps keyed BLAKE2b-512 for
//! HMAC-SHA3-512 and adds Serpent-CTR around the plaintext side.

use blake2::Blake2bMac512;
use chacha20::XChaCha20;
use chacha20::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use serpent::Serpent;
use sha3::{Sha3_256, Sha3_512};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::{HKDF_SALT_SIZE, KEY_SIZE, MAC_SIZE, NONCE_SIZE, SERPENT_SALT_SIZE};

type SerpentCtr = Ctr128BE<Serpent>;

/// The body MAC: keyed BLAKE2b-512 normally, HMAC-SHA3-512 when paranoid.
enum BodyMac {
    Blake2(Box<Blake2bMac512>),
    HmacSha3(Box<Hmac<Sha3_512>>),
}

impl BodyMac {
    fn new(paranoid: bool, subkey: &[u8]) -> Self {
        if paranoid {
            Self::HmacSha3(Box::new(Hmac::new_from_slice(subkey).expect("hmac accepts any key length")))
        } else {
            Self::Blake2(Box::new(Blake2bMac512::new_from_slice(subkey).expect("blake2b accepts a 32-byte key")))
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake2(mac) => mac.update(data),
            Self::HmacSha3(mac) => mac.update(data),
        }
    }

    fn finalize(self) -> [u8; MAC_SIZE] {
        match self {
            Self::Blake2(mac) => mac.finalize().into_bytes().into(),
            Self::HmacSha3(mac) => mac.finalize().into_bytes().into(),
        }
    }
}

/// Stateful cipher over the body chunk stream.
///
/// One instance per operation; chunks must be fed in file order because the
/// cipher keystreams and the MAC all advance with the data.
pub struct BodyCipher {
    chacha: XChaCha20,
    serpent: Option<SerpentCtr>,
    mac: BodyMac,
}

impl BodyCipher {
    /// Builds the cipher stack from the cipher key and header values.
    #[must_use]
    pub fn new(
        cipher_key: &[u8; KEY_SIZE],
        nonce: &[u8; NONCE_SIZE],
        hkdf_salt: &[u8; HKDF_SALT_SIZE],
        serpent_salt: &[u8; SERPENT_SALT_SIZE],
        paranoid: bool,
    ) -> Self {
        // First 32 bytes of the HKDF stream key the MAC, the next 32 the
        // Serpent cascade.
        let mut okm = Zeroizing::new([0u8; 2 * KEY_SIZE]);
        Hkdf::<Sha3_256>::new(Some(hkdf_salt), cipher_key).expand(&[], okm.as_mut()).expect("64 bytes is a valid hkdf output length");

        let mac = BodyMac::new(paranoid, &okm[..KEY_SIZE]);
        let serpent = paranoid.then(|| SerpentCtr::new_from_slices(&okm[KEY_SIZE..], serpent_salt).expect("valid serpent key and iv"));
        let chacha = XChaCha20::new(cipher_key.into(), nonce.into());

        Self { chacha, serpent, mac }
    }

    /// Encrypts one plaintext chunk in place and absorbs the resulting
    /// XChaCha20 ciphertext into the MAC.
    pub fn encrypt_chunk(&mut self, chunk: &mut [u8]) {
        if let Some(serpent) = &mut self.serpent {
            serpent.apply_keystream(chunk);
        }
        self.chacha.apply_keystream(chunk);
        self.mac.update(chunk);
    }

    /// Absorbs one XChaCha20 ciphertext chunk into the MAC and decrypts it
    /// in place.
    pub fn decrypt_chunk(&mut self, chunk: &mut [u8]) {
        self.mac.update(chunk);
        self.chacha.apply_keystream(chunk);
        if let Some(serpent) = &mut self.serpent {
            serpent.apply_keystream(chunk);
        }
    }

    /// Finalizes the MAC over everything fed so far.
    #[must_use]
    pub fn finalize(self) -> [u8; MAC_SIZE] {
        self.mac.finalize()
    }

    /// Finalizes and compares against the stored MAC in constant time.
    #[must_use]
    pub fn verify(self, expected: &[u8; MAC_SIZE]) -> bool {
        let computed = self.finalize();
        bool::from(computed[..].ct_eq(&expected[..]))
    }
}
