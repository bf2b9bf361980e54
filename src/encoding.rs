//! Reed-Solomon error correction codecs.
//!
//! The volume format uses seven fixed code shapes: six for header fields
//! (each expanded to three times its plain size) and one short-parity shape
//! (128/136) for body blocks. All codecs are systematic over GF(2^8): the
//! encoded form is the plain bytes followed by parity, and decoding corrects
//! up to `(total - data) / 2` byte errors at unknown positions.
//!
//! The codecs are built once at startup and shared, mirroring the fixed
//! shape set of the format.

use std::sync::LazyLock;

use reed_solomon::{Decoder, Encoder};

/// A fixed-shape Reed-Solomon encoder/decoder pair.
pub struct RsCodec {
    data_len: usize,
    total_len: usize,
    encoder: Encoder,
    decoder: Decoder,
}

impl RsCodec {
    /// Builds the codec for `data_len` plain bytes expanded to `total_len`
    /// bytes on disk.
    #[must_use]
    fn new(data_len: usize, total_len: usize) -> Self {
        let parity_len = total_len - data_len;
        Self { data_len, total_len, encoder: Encoder::new(parity_len), decoder: Decoder::new(parity_len) }
    }

    /// Plain size of this shape.
    #[inline]
    #[must_use]
    pub const fn data_len(&self) -> usize {
        self.data_len
    }

    /// On-disk size of this shape.
    #[inline]
    #[must_use]
    pub const fn total_len(&self) -> usize {
        self.total_len
    }

    /// Encodes exactly `data_len` bytes into `total_len` bytes.
    ///
    /// # Panics
    /// Panics if `data` is not exactly `data_len` bytes; callers always pass
    /// fixed-size fields or blocks.
    #[must_use]
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        assert_eq!(data.len(), self.data_len, "rs encode input length mismatch");
        self.encoder.encode(data).to_vec()
    }

    /// Decodes `total_len` bytes back to `data_len` bytes.
    ///
    /// Corrects up to `(total_len - data_len) / 2` byte errors. When the
    /// input is unrecoverable, returns the best-effort truncation
    /// `bytes[..data_len]` together with `true`; the caller decides whether
    /// that is fatal or the operation continues under the keep flag.
    ///
    /// # Panics
    /// Panics if `bytes` is not exactly `total_len` bytes.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> (Vec<u8>, bool) {
        assert_eq!(bytes.len(), self.total_len, "rs decode input length mismatch");
        match self.decoder.correct(bytes, None) {
            Ok(recovered) => (recovered.data().to_vec(), false),
            Err(_) => (bytes[..self.data_len].to_vec(), true),
        }
    }
}

/// 1/3 shape protecting individual metadata bytes.
pub static RS1: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(1, 3));

/// 5/15 shape for the version, metadata length, and flag fields.
pub static RS5: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(5, 15));

/// 16/48 shape for the Argon2 salt and the Serpent salt.
pub static RS16: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(16, 48));

/// 24/72 shape for the XChaCha20 nonce.
pub static RS24: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(24, 72));

/// 32/96 shape for the HKDF salt and the keyfile hash.
pub static RS32: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(32, 96));

/// 64/192 shape for the key hash and the data MAC.
pub static RS64: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(64, 192));

/// 128/136 shape for body blocks.
pub static RS128: LazyLock<RsCodec> = LazyLock::new(|| RsCodec::new(128, 136));

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 13) as u8).collect()
    }

    #[test]
    fn test_roundtrip_all_shapes() {
        for codec in [&*RS1, &*RS5, &*RS16, &*RS24, &*RS32, &*RS64, &*RS128] {
            let data = sample(codec.data_len());
            let encoded = codec.encode(&data);
            assert_eq!(encoded.len(), codec.total_len());
            assert_eq!(&encoded[..codec.data_len()], &data[..]);

            let (decoded, damaged) = codec.decode(&encoded);
            assert!(!damaged);
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn test_corrects_up_to_half_parity_errors() {
        for codec in [&*RS5, &*RS16, &*RS24, &*RS32, &*RS64, &*RS128] {
            let data = sample(codec.data_len());
            let mut encoded = codec.encode(&data);

            let max_errors = (codec.total_len() - codec.data_len()) / 2;
            for i in 0..max_errors {
                encoded[i * 2] ^= 0xa5;
            }

            let (decoded, damaged) = codec.decode(&encoded);
            assert!(!damaged, "shape {}/{} failed", codec.data_len(), codec.total_len());
            assert_eq!(decoded, data);
        }
    }

    #[test]
    fn test_single_metadata_byte_error() {
        let encoded = RS1.encode(&[b'x']);
        for i in 0..3 {
            let mut corrupted = encoded.clone();
            corrupted[i] ^= 0x01;
            let (decoded, damaged) = RS1.decode(&corrupted);
            assert!(!damaged);
            assert_eq!(decoded, vec![b'x']);
        }
    }

    #[test]
    fn test_unrecoverable_returns_truncation() {
        let data = sample(RS16.data_len());
        let mut encoded = RS16.encode(&data);
        for byte in encoded.iter_mut() {
            *byte ^= 0x5a;
        }

        let (decoded, damaged) = RS16.decode(&encoded);
        assert!(damaged);
        assert_eq!(decoded, encoded[..16].to_vec());
    }

    #[test]
    fn test_body_block_truncation_is_128() {
        let data = sample(128);
        let mut encoded = RS128.encode(&data);
        // 8 parity bytes correct at most 4 errors; 20 is beyond recovery.
        for i in 0..20 {
            encoded[i * 6] = encoded[i * 6].wrapping_add(1 + i as u8);
        }

        let (decoded, damaged) = RS128.decode(&encoded);
        assert!(damaged);
        assert_eq!(decoded.len(), 128);
    }
}
