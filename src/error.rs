//! Error kinds for the encryption core.
//!
//! One sum type covers everything `pipeline::run` can report, so the caller
//! can match on outcomes instead of parsing strings. The CLI maps each kind
//! to a stable process exit code.

use std::io;

use thiserror::Error;

fn keyfile_message(order_matters: &bool) -> &'static str {
    if *order_matters { "incorrect keyfiles and/or order" } else { "incorrect keyfiles" }
}

/// Exit code for a successful operation.
pub const EXIT_OK: u8 = 0;
/// Exit code when the user cancelled the operation.
pub const EXIT_CANCELLED: u8 = 1;
/// Exit code for a wrong password or wrong keyfiles.
pub const EXIT_AUTH: u8 = 2;
/// Exit code for an unrecoverable header (or a non-volume input).
pub const EXIT_HEADER: u8 = 3;
/// Exit code for an unrecoverable body or a failed MAC check.
pub const EXIT_BODY: u8 = 4;
/// Exit code for operating-system I/O failures.
pub const EXIT_IO: u8 = 5;
/// Exit code when the input exceeds the 256 GiB cipher limit.
pub const EXIT_TOO_LARGE: u8 = 6;

/// Everything that can go wrong during an encrypt or decrypt operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The operating system refused a read, write, seek, or remove.
    #[error("access denied by operating system: {0}")]
    Io(#[from] io::Error),

    /// The volume was produced by an older build with a different format.
    #[error("please use Picocrypt {0} to decrypt this file")]
    UnsupportedVersion(&'static str),

    /// The first bytes of the input do not look like a volume at all.
    #[error("this doesn't seem to be a Picocrypt volume")]
    NotAVolume,

    /// One or more Reed-Solomon protected header fields were unrecoverable.
    #[error("the header is corrupt and the input file cannot be decrypted")]
    HeaderCorrupt,

    /// The stored key hash does not match the derived key.
    #[error("the provided password is incorrect")]
    WrongPassword,

    /// The stored keyfile hash does not match the combined keyfiles.
    #[error("{}", keyfile_message(.order_matters))]
    WrongKeyfile {
        /// Whether the volume requires keyfiles in their original order.
        order_matters: bool,
    },

    /// A Reed-Solomon body block was unrecoverable.
    #[error("the input file is too corrupted to decrypt")]
    BodyCorrupt,

    /// The final MAC over the ciphertext stream did not match.
    #[error("the input file is either corrupted or intentionally modified")]
    AuthFailure,

    /// The total plaintext exceeds XChaCha20's 256 GiB message limit.
    #[error("total size is larger than 256 GiB, XChaCha20's limit")]
    TooLarge,

    /// The user cancelled the operation.
    #[error("operation cancelled by user")]
    Cancelled,
}

impl Error {
    /// Returns the process exit code for this error kind.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Io(_) => EXIT_IO,
            Self::UnsupportedVersion(_) | Self::NotAVolume | Self::HeaderCorrupt => EXIT_HEADER,
            Self::WrongPassword | Self::WrongKeyfile { .. } => EXIT_AUTH,
            Self::BodyCorrupt | Self::AuthFailure => EXIT_BODY,
            Self::TooLarge => EXIT_TOO_LARGE,
            Self::Cancelled => EXIT_CANCELLED,
        }
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Cancelled.exit_code(), EXIT_CANCELLED);
        assert_eq!(Error::WrongPassword.exit_code(), EXIT_AUTH);
        assert_eq!(Error::WrongKeyfile { order_matters: true }.exit_code(), EXIT_AUTH);
        assert_eq!(Error::HeaderCorrupt.exit_code(), EXIT_HEADER);
        assert_eq!(Error::AuthFailure.exit_code(), EXIT_BODY);
        assert_eq!(Error::TooLarge.exit_code(), EXIT_TOO_LARGE);
    }

    #[test]
    fn test_keyfile_messages() {
        assert_eq!(Error::WrongKeyfile { order_matters: false }.to_string(), "incorrect keyfiles");
        assert_eq!(Error::WrongKeyfile { order_matters: true }.to_string(), "incorrect keyfiles and/or order");
    }
}
