//! Application configuration and cryptographic constants.
//!
//! These constants are the single source of truth for the volume format:
//! field lengths, Reed-Solomon shapes, chunk geometry, and the Argon2id
//! parameter profiles. Changing any of them changes the on-disk format.

/// The application name used in user-facing output and prompts.
pub const APP_NAME: &str = "Picocrypt";

/// The version string written into every volume header.
///
/// Exactly five ASCII bytes matching `v<digit>.<digit><digit>`. Readers use
/// this field to refuse volumes produced by incompatible older builds.
pub const VERSION: &str = "v1.23";

/// The file extension identifying an encrypted volume.
pub const VOLUME_EXTENSION: &str = ".pcv";

/// File name of the intermediate zip used to bundle multi-file inputs.
pub const BUNDLE_NAME: &str = "Encrypted.zip";

/// Plaintext chunk size for the streaming cipher, in bytes (1 MiB).
pub const CHUNK_SIZE: usize = 1_048_576;

/// On-disk chunk size when the body is Reed-Solomon encoded.
///
/// Each 1 MiB chunk is split into 8192 blocks of 128 bytes, and every block
/// expands to 136 bytes: 8192 * 136 = 1,114,112.
pub const RS_CHUNK_SIZE: usize = 1_114_112;

/// Block size for body Reed-Solomon encoding and its PKCS7 conditioning.
pub const RS_BLOCK_SIZE: usize = 128;

/// On-disk size of one Reed-Solomon encoded body block.
pub const RS_BLOCK_ENCODED_SIZE: usize = 136;

/// Threshold on `total % CHUNK_SIZE` at and above which the final chunk,
/// once padded, fills a complete on-disk chunk and the padded flag must be
/// set so the reader knows to unpad it.
///
/// 1,048,448 = `CHUNK_SIZE` - `RS_BLOCK_SIZE`.
pub const PADDED_THRESHOLD: u64 = 1_048_448;

/// Maximum total plaintext size, in bytes (256 GiB, XChaCha20's limit).
pub const MAX_INPUT_SIZE: u64 = 256 * 1_073_741_824;

/// Argon2id memory cost in KiB (1 GiB), shared by both profiles.
pub const ARGON_MEMORY: u32 = 1_048_576;

/// Argon2id time cost for the normal profile.
pub const ARGON_TIME: u32 = 4;

/// Argon2id parallelism for the normal profile.
pub const ARGON_LANES: u32 = 4;

/// Argon2id time cost for the paranoid profile.
pub const ARGON_TIME_PARANOID: u32 = 8;

/// Argon2id parallelism for the paranoid profile.
pub const ARGON_LANES_PARANOID: u32 = 8;

/// Length of the derived master key in bytes (XChaCha20 key size).
pub const KEY_SIZE: usize = 32;

/// Length of the Argon2id salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Length of the HKDF salt in bytes.
pub const HKDF_SALT_SIZE: usize = 32;

/// Length of the Serpent-CTR initialization vector in bytes.
pub const SERPENT_SALT_SIZE: usize = 16;

/// Length of the XChaCha20 nonce in bytes.
pub const NONCE_SIZE: usize = 24;

/// Length of the SHA3-512 key hash in bytes.
pub const KEY_HASH_SIZE: usize = 64;

/// Length of the SHA3-256 keyfile hash in bytes.
pub const KEYFILE_HASH_SIZE: usize = 32;

/// Length of the body MAC (keyed BLAKE2b-512 or HMAC-SHA3-512) in bytes.
pub const MAC_SIZE: usize = 64;

/// Maximum length of the free-text metadata field, limited by its
/// five-digit length header.
pub const MAX_METADATA_SIZE: usize = 99_999;
