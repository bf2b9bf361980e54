//! Common type definitions for the encryption core.
//!
//! The original tool kept its operation state in dozens of process-wide
//! variables; here a single [`Job`] value carries everything one operation
//! needs, and the core returns a [`Report`] instead of mutating shared state.

use std::fmt::{Display, Formatter, Result};
use std::path::PathBuf;

/// Represents the type of operation to perform.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Mode {
    /// Encrypt the input, producing a `.pcv` volume.
    Encrypt,

    /// Decrypt a `.pcv` volume (or a split set of one).
    Decrypt,
}

impl Mode {
    /// Returns a human-readable label for the mode.
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Encrypt => "Encrypt",
            Self::Decrypt => "Decrypt",
        }
    }
}

impl Display for Mode {
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(self.label())
    }
}

/// Unit for the split-output chunk size.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SplitUnit {
    KiB,
    MiB,
    GiB,
}

impl SplitUnit {
    /// Number of bytes in one unit.
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            Self::KiB => 1024,
            Self::MiB => 1_048_576,
            Self::GiB => 1_073_741_824,
        }
    }
}

/// Requested splitting of the encrypted output into numbered parts.
#[derive(Clone, Copy, Debug)]
pub struct SplitSpec {
    /// Chunk size in `unit`s. Must be non-zero.
    pub size: u64,

    /// Unit the size is expressed in.
    pub unit: SplitUnit,
}

impl SplitSpec {
    /// The part size in bytes.
    #[inline]
    #[must_use]
    pub const fn chunk_bytes(&self) -> u64 {
        self.size * self.unit.bytes()
    }
}

/// Everything a single encrypt or decrypt operation needs, by value.
#[derive(Clone, Debug)]
pub struct Job {
    /// Whether to encrypt or decrypt.
    pub mode: Mode,

    /// The dropped input paths. Decryption takes exactly one.
    pub sources: Vec<PathBuf>,

    /// Output override; `None` derives the default from the sources.
    pub output: Option<PathBuf>,

    /// The password, UTF-8 exactly as supplied.
    pub password: String,

    /// Keyfiles mixed into the cipher key, in drop order.
    pub keyfiles: Vec<PathBuf>,

    /// Free-text metadata stored (Reed-Solomon protected, unencrypted)
    /// in the volume header. Encrypt only.
    pub metadata: String,

    /// Paranoid mode: Serpent cascade, HMAC-SHA3, stronger Argon2.
    pub paranoid: bool,

    /// Reed-Solomon encode the body for error correction.
    pub reed_solomon: bool,

    /// Whether keyfiles must be supplied in their original order.
    pub keyfile_order_matters: bool,

    /// Deflate the intermediate zip instead of storing it.
    pub compress: bool,

    /// Keep the decrypted output even if it is corrupted or modified.
    pub keep: bool,

    /// Delete the inputs after a successful operation.
    pub delete_when_done: bool,

    /// Split the encrypted output into fixed-size parts.
    pub split: Option<SplitSpec>,
}

impl Job {
    /// Creates a job with the given mode and sources and everything else off.
    #[must_use]
    pub fn new(mode: Mode, sources: Vec<PathBuf>) -> Self {
        Self {
            mode,
            sources,
            output: None,
            password: String::new(),
            keyfiles: Vec::new(),
            metadata: String::new(),
            paranoid: false,
            reed_solomon: false,
            keyfile_order_matters: false,
            compress: false,
            keep: false,
            delete_when_done: false,
            split: None,
        }
    }
}

/// Outcome of a completed operation.
#[derive(Clone, Debug)]
pub struct Report {
    /// Path of the produced output (the `.0` part when split).
    pub output: PathBuf,

    /// True when corruption was detected but the user chose to keep the
    /// output anyway; the caller should surface a warning, not success.
    pub kept: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_chunk_bytes() {
        let spec = SplitSpec { size: 4, unit: SplitUnit::MiB };
        assert_eq!(spec.chunk_bytes(), 4 * 1_048_576);

        let spec = SplitSpec { size: 2, unit: SplitUnit::KiB };
        assert_eq!(spec.chunk_bytes(), 2048);
    }

    #[test]
    fn test_mode_labels() {
        assert_eq!(Mode::Encrypt.label(), "Encrypt");
        assert_eq!(Mode::Decrypt.to_string(), "Decrypt");
    }
}
