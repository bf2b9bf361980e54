//! PKCS#7 padding to 128-byte blocks.
//!
//! Used only to condition the tail of the final body chunk before its
//! Reed-Solomon pass; the stream cipher itself imposes no length constraint,
//! so this is not a cryptographic padding. Input that is already aligned
//! (including an empty tail) gains a full block, which keeps the scheme
//! unambiguously reversible.

use crate::config::RS_BLOCK_SIZE;

/// Pads `data` to the next multiple of 128 bytes.
///
/// An aligned or empty input is extended by a full 128-byte block.
#[must_use]
pub fn pad(data: &[u8]) -> Vec<u8> {
    let pad_len = RS_BLOCK_SIZE - data.len() % RS_BLOCK_SIZE;
    #[allow(clippy::cast_possible_truncation)]
    let pad_byte = pad_len as u8;
    let mut padded = Vec::with_capacity(data.len() + pad_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + pad_len, pad_byte);
    padded
}

/// Strips the padding applied by [`pad`].
///
/// The final byte names the padding length. A corrupted tail can carry any
/// value here; out-of-range lengths are clamped instead of panicking,
/// leaving the damage for the MAC check (or the keep flag) to report.
#[must_use]
pub fn unpad(data: &[u8]) -> Vec<u8> {
    let Some(&last) = data.last() else {
        return Vec::new();
    };
    let pad_len = (last as usize).clamp(1, RS_BLOCK_SIZE).min(data.len());
    data[..data.len() - pad_len].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_unpad_roundtrip() {
        for len in [0usize, 1, 64, 127, 128, 129, 255, 256] {
            let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let padded = pad(&data);
            assert_eq!(padded.len() % RS_BLOCK_SIZE, 0);
            assert!(!padded.is_empty());
            assert_eq!(unpad(&padded), data);
        }
    }

    #[test]
    fn test_pad_empty_is_full_block() {
        let padded = pad(&[]);
        assert_eq!(padded.len(), RS_BLOCK_SIZE);
        assert!(padded.iter().all(|&b| b as usize == RS_BLOCK_SIZE));
    }

    #[test]
    fn test_pad_aligned_adds_block() {
        let data = [0u8; RS_BLOCK_SIZE];
        let padded = pad(&data);
        assert_eq!(padded.len(), 2 * RS_BLOCK_SIZE);
        assert_eq!(padded[RS_BLOCK_SIZE], RS_BLOCK_SIZE as u8);
    }

    #[test]
    fn test_unpad_tolerates_garbage_length() {
        // 0 is out of range for a 128-byte block; treat it as one byte.
        let mut block = vec![7u8; RS_BLOCK_SIZE];
        block[RS_BLOCK_SIZE - 1] = 0;
        assert_eq!(unpad(&block).len(), RS_BLOCK_SIZE - 1);

        assert_eq!(unpad(&[]), Vec::<u8>::new());
    }
}
