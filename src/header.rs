//! Volume header serialization and parsing.
//!
//! Every volume starts with a fixed-layout preamble in which each field is
//! independently Reed-Solomon expanded, so a damaged disk sector can take
//! out parity without taking out the volume. The layout (on-disk sizes):
//!
//! | field           | plain | on disk |
//! |-----------------|-------|---------|
//! | version         | 5     | 15      |
//! | metadata length | 5     | 15      |
//! | metadata        | L     | 3·L     |
//! | flags           | 5     | 15      |
//! | salt            | 16    | 48      |
//! | hkdf salt       | 32    | 96      |
//! | serpent salt    | 16    | 48      |
//! | nonce           | 24    | 72      |
//! | key hash        | 64    | 192     |
//! | keyfile hash    | 32    | 96      |
//! | data MAC        | 64    | 192     |
//!
//! Total 789 + 3·L bytes. The last three fields are written as zeroed
//! placeholders during encryption and backfilled once the body has been
//! streamed, so the writer never buffers the ciphertext.
//!
//! Parsing folds every field's decode result into a single damage flag; the
//! caller decides whether damage is fatal (it is, unless the user opted into
//! keeping corrupted output).

use std::io::{ErrorKind, Read, Write};

use crate::config::{
    HKDF_SALT_SIZE, KEY_HASH_SIZE, KEYFILE_HASH_SIZE, MAC_SIZE, NONCE_SIZE, SALT_SIZE, SERPENT_SALT_SIZE, VERSION,
};
use crate::encoding::{RS1, RS5, RS16, RS24, RS32, RS64, RsCodec};
use crate::error::{Error, Result};

/// Byte offset of the key hash field, where encryption seeks back to
/// backfill the digests.
const DIGESTS_OFFSET: u64 = 309;

/// Fixed preamble overhead excluding the expanded metadata.
const FIXED_OVERHEAD: u64 = 789;

/// The five advanced-option flags stored in the header.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct Flags {
    /// Serpent cascade, HMAC-SHA3 MAC, stronger Argon2 profile.
    pub paranoid: bool,

    /// The volume requires one or more keyfiles.
    pub keyfile: bool,

    /// Keyfiles must be supplied in their original order.
    pub keyfile_order_matters: bool,

    /// The body is Reed-Solomon encoded.
    pub reed_solomon: bool,

    /// The final plaintext chunk fills a complete on-disk chunk and its
    /// tail block must be unpadded on read.
    pub padded: bool,
}

impl Flags {
    fn to_bytes(self) -> [u8; 5] {
        [
            u8::from(self.paranoid),
            u8::from(self.keyfile),
            u8::from(self.keyfile_order_matters),
            u8::from(self.reed_solomon),
            u8::from(self.padded),
        ]
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            paranoid: bytes[0] == 1,
            keyfile: bytes[1] == 1,
            keyfile_order_matters: bytes[2] == 1,
            reed_solomon: bytes[3] == 1,
            padded: bytes[4] == 1,
        }
    }
}

/// A fully parsed (or about-to-be-written) volume preamble.
#[derive(Clone, Debug)]
pub struct Header {
    /// Free-text metadata, stored unencrypted.
    pub metadata: Vec<u8>,

    /// Advanced-option flags.
    pub flags: Flags,

    /// Argon2id salt.
    pub salt: [u8; SALT_SIZE],

    /// HKDF-SHA3 salt for subkey derivation.
    pub hkdf_salt: [u8; HKDF_SALT_SIZE],

    /// Serpent-CTR initialization vector.
    pub serpent_salt: [u8; SERPENT_SALT_SIZE],

    /// XChaCha20 nonce.
    pub nonce: [u8; NONCE_SIZE],

    /// SHA3-512 of the Argon2 key (keyfile-independent).
    pub key_hash: [u8; KEY_HASH_SIZE],

    /// SHA3-256 of the combined keyfile key, all zero without keyfiles.
    pub keyfile_hash: [u8; KEYFILE_HASH_SIZE],

    /// MAC over the XChaCha20 ciphertext stream.
    pub data_mac: [u8; MAC_SIZE],
}

/// Result of parsing a header: the fields plus whether any Reed-Solomon
/// protected field was unrecoverable.
pub struct ParsedHeader {
    pub header: Header,
    pub damaged: bool,
}

/// The cheap pre-password peek at a volume: version, metadata, and flags.
///
/// This is what a host shows the user before asking for credentials:
/// the metadata text and whether keyfiles are required.
#[derive(Clone, Debug)]
pub struct VolumeInfo {
    /// Decoded version string, e.g. `v1.23`.
    pub version: String,

    /// Metadata text, or a fixed placeholder when unrecoverable.
    pub metadata: String,

    /// Advanced-option flags.
    pub flags: Flags,
}

/// Placeholder shown when the metadata field cannot be recovered.
pub const METADATA_CORRUPTED: &str = "Metadata is corrupted.";

impl Header {
    /// Total preamble size on disk for a given metadata length.
    #[inline]
    #[must_use]
    pub fn on_disk_len(metadata_len: usize) -> u64 {
        FIXED_OVERHEAD + 3 * metadata_len as u64
    }

    /// Seek offset of the digest placeholders (key hash, keyfile hash,
    /// data MAC) for a given metadata length.
    #[inline]
    #[must_use]
    pub fn digests_offset(metadata_len: usize) -> u64 {
        DIGESTS_OFFSET + 3 * metadata_len as u64
    }

    /// Writes the preamble with zeroed digest placeholders.
    ///
    /// # Errors
    /// Propagates writer failures.
    pub fn write_preamble<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&RS5.encode(VERSION.as_bytes()))?;

        let length_digits = format!("{:05}", self.metadata.len());
        writer.write_all(&RS5.encode(length_digits.as_bytes()))?;
        for byte in &self.metadata {
            writer.write_all(&RS1.encode(&[*byte]))?;
        }

        writer.write_all(&RS5.encode(&self.flags.to_bytes()))?;
        writer.write_all(&RS16.encode(&self.salt))?;
        writer.write_all(&RS32.encode(&self.hkdf_salt))?;
        writer.write_all(&RS16.encode(&self.serpent_salt))?;
        writer.write_all(&RS24.encode(&self.nonce))?;

        // Digest placeholders, backfilled by write_digests after the body.
        writer.write_all(&[0u8; 192])?;
        writer.write_all(&[0u8; 96])?;
        writer.write_all(&[0u8; 192])?;

        Ok(())
    }

    /// Backfills the three digest fields. The writer must already be
    /// positioned at [`Header::digests_offset`].
    ///
    /// # Errors
    /// Propagates writer failures.
    pub fn write_digests<W: Write>(
        writer: &mut W,
        key_hash: &[u8; KEY_HASH_SIZE],
        keyfile_hash: &[u8; KEYFILE_HASH_SIZE],
        data_mac: &[u8; MAC_SIZE],
    ) -> Result<()> {
        writer.write_all(&RS64.encode(key_hash))?;
        writer.write_all(&RS32.encode(keyfile_hash))?;
        writer.write_all(&RS64.encode(data_mac))?;
        Ok(())
    }

    /// Parses a complete preamble from `reader`.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedVersion`] or [`Error::NotAVolume`] per
    /// the version refusal rules, [`Error::HeaderCorrupt`] when the metadata
    /// length is undecodable (every later offset depends on it), and I/O
    /// errors from the reader. Recoverable-field damage is reported through
    /// [`ParsedHeader::damaged`], not as an error.
    pub fn read<R: Read>(reader: &mut R) -> Result<ParsedHeader> {
        let prelude = Prelude::read(reader)?;
        let mut damaged = prelude.damaged;

        let salt = read_field(reader, &RS16, &mut damaged)?;
        let hkdf_salt = read_field(reader, &RS32, &mut damaged)?;
        let serpent_salt = read_field(reader, &RS16, &mut damaged)?;
        let nonce = read_field(reader, &RS24, &mut damaged)?;
        let key_hash = read_field(reader, &RS64, &mut damaged)?;
        let keyfile_hash = read_field(reader, &RS32, &mut damaged)?;
        let data_mac = read_field(reader, &RS64, &mut damaged)?;

        Ok(ParsedHeader {
            header: Header {
                metadata: prelude.metadata,
                flags: prelude.flags,
                salt,
                hkdf_salt,
                serpent_salt,
                nonce,
                key_hash,
                keyfile_hash,
                data_mac,
            },
            damaged,
        })
    }

    /// Peeks at a volume's version, metadata, and flags without reading the
    /// cryptographic fields.
    ///
    /// # Errors
    /// Same refusal rules as [`Header::read`].
    pub fn inspect<R: Read>(reader: &mut R) -> Result<VolumeInfo> {
        let prelude = Prelude::read(reader)?;

        let metadata = if prelude.metadata_damaged {
            METADATA_CORRUPTED.to_owned()
        } else {
            String::from_utf8_lossy(&prelude.metadata).into_owned()
        };

        Ok(VolumeInfo { version: String::from_utf8_lossy(&prelude.version).into_owned(), metadata, flags: prelude.flags })
    }
}

/// The leading variable-offset part of the preamble: version, metadata
/// length, metadata, and flags.
struct Prelude {
    version: [u8; 5],
    metadata: Vec<u8>,
    metadata_damaged: bool,
    flags: Flags,
    damaged: bool,
}

impl Prelude {
    fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut version_block = [0u8; 15];
        if let Err(e) = reader.read_exact(&mut version_block) {
            // A file shorter than the version field is not a volume.
            return Err(if e.kind() == ErrorKind::UnexpectedEof { Error::NotAVolume } else { Error::Io(e) });
        }

        // v1.13 predates the Reed-Solomon header and is recognizable from
        // its raw prefix alone.
        if &version_block[..5] == b"v1.13" {
            return Err(Error::UnsupportedVersion("v1.13"));
        }

        let (version, version_damaged) = RS5.decode(&version_block);
        let mut damaged = version_damaged;
        if version_damaged {
            // Undecodable parity leaves the raw prefix; if even that does
            // not look like a version string, this is not a volume.
            if !is_version(&version) {
                return Err(Error::NotAVolume);
            }
        } else {
            match &version[..] {
                b"v1.13" => return Err(Error::UnsupportedVersion("v1.13")),
                b"v1.14" | b"v1.15" | b"v1.16" => return Err(Error::UnsupportedVersion("v1.16")),
                b"v1.17" | b"v1.18" | b"v1.19" | b"v1.20" | b"v1.21" => return Err(Error::UnsupportedVersion("v1.21")),
                v if is_version(v) => {}
                _ => return Err(Error::NotAVolume),
            }
        }

        let mut length_block = [0u8; 15];
        reader.read_exact(&mut length_block).map_err(truncated)?;
        let (length_digits, length_damaged) = RS5.decode(&length_block);
        damaged |= length_damaged;

        // Every later field offset depends on this value; five ASCII digits
        // or the header is unusable no matter what the user opted into.
        let metadata_len = parse_length(&length_digits).ok_or(Error::HeaderCorrupt)?;

        let mut metadata = Vec::with_capacity(metadata_len);
        let mut metadata_damaged = false;
        let mut encoded_byte = [0u8; 3];
        for _ in 0..metadata_len {
            reader.read_exact(&mut encoded_byte).map_err(truncated)?;
            let (byte, bad) = RS1.decode(&encoded_byte);
            metadata_damaged |= bad;
            metadata.push(byte[0]);
        }
        damaged |= metadata_damaged;

        let mut flags_block = [0u8; 15];
        reader.read_exact(&mut flags_block).map_err(truncated)?;
        let (flag_bytes, flags_damaged) = RS5.decode(&flags_block);
        damaged |= flags_damaged;

        let mut version_out = [0u8; 5];
        version_out.copy_from_slice(&version);

        Ok(Self { version: version_out, metadata, metadata_damaged, flags: Flags::from_bytes(&flag_bytes), damaged })
    }
}

/// Reads one fixed-size field, decoding it and folding damage into the
/// running flag.
fn read_field<R: Read, const N: usize>(reader: &mut R, codec: &RsCodec, damaged: &mut bool) -> Result<[u8; N]> {
    let mut block = vec![0u8; codec.total_len()];
    reader.read_exact(&mut block).map_err(truncated)?;
    let (data, bad) = codec.decode(&block);
    *damaged |= bad;

    let mut out = [0u8; N];
    out.copy_from_slice(&data);
    Ok(out)
}

/// A header that ends mid-field is unrecoverable, not merely absent.
fn truncated(e: std::io::Error) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof { Error::HeaderCorrupt } else { Error::Io(e) }
}

fn is_version(bytes: &[u8]) -> bool {
    bytes.len() == 5
        && bytes[0] == b'v'
        && bytes[1].is_ascii_digit()
        && bytes[2] == b'.'
        && bytes[3].is_ascii_digit()
        && bytes[4].is_ascii_digit()
}

fn parse_length(digits: &[u8]) -> Option<usize> {
    if digits.len() != 5 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut value = 0usize;
    for &d in digits {
        value = value * 10 + usize::from(d - b'0');
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample_header(metadata: &[u8]) -> Header {
        Header {
            metadata: metadata.to_vec(),
            flags: Flags { paranoid: true, keyfile: false, keyfile_order_matters: false, reed_solomon: true, padded: false },
            salt: [1u8; SALT_SIZE],
            hkdf_salt: [2u8; HKDF_SALT_SIZE],
            serpent_salt: [3u8; SERPENT_SALT_SIZE],
            nonce: [4u8; NONCE_SIZE],
            key_hash: [5u8; KEY_HASH_SIZE],
            keyfile_hash: [6u8; KEYFILE_HASH_SIZE],
            data_mac: [7u8; MAC_SIZE],
        }
    }

    fn serialize(header: &Header) -> Vec<u8> {
        let mut bytes = Vec::new();
        header.write_preamble(&mut bytes).unwrap();
        // Backfill the digests the way the pipeline does after streaming.
        let offset = Header::digests_offset(header.metadata.len()) as usize;
        let mut digests = Vec::new();
        Header::write_digests(&mut digests, &header.key_hash, &header.keyfile_hash, &header.data_mac).unwrap();
        bytes[offset..].copy_from_slice(&digests);
        bytes
    }

    #[test]
    fn test_roundtrip() {
        let header = sample_header(b"backup 2024-06-01");
        let bytes = serialize(&header);
        assert_eq!(bytes.len() as u64, Header::on_disk_len(header.metadata.len()));

        let parsed = Header::read(&mut Cursor::new(&bytes)).unwrap();
        assert!(!parsed.damaged);
        assert_eq!(parsed.header.metadata, header.metadata);
        assert_eq!(parsed.header.flags, header.flags);
        assert_eq!(parsed.header.salt, header.salt);
        assert_eq!(parsed.header.hkdf_salt, header.hkdf_salt);
        assert_eq!(parsed.header.serpent_salt, header.serpent_salt);
        assert_eq!(parsed.header.nonce, header.nonce);
        assert_eq!(parsed.header.key_hash, header.key_hash);
        assert_eq!(parsed.header.keyfile_hash, header.keyfile_hash);
        assert_eq!(parsed.header.data_mac, header.data_mac);
    }

    #[test]
    fn test_empty_metadata_overhead_is_789() {
        let header = sample_header(b"");
        let bytes = serialize(&header);
        assert_eq!(bytes.len(), 789);
        assert_eq!(Header::digests_offset(0), 309);
    }

    #[test]
    fn test_salt_single_byte_error_recovers() {
        let header = sample_header(b"");
        let mut bytes = serialize(&header);
        // First byte of the salt's encoded block (after three 15-byte fields).
        bytes[45] ^= 0x01;

        let parsed = Header::read(&mut Cursor::new(&bytes)).unwrap();
        assert!(!parsed.damaged);
        assert_eq!(parsed.header.salt, header.salt);
    }

    #[test]
    fn test_destroyed_field_reports_damage() {
        let header = sample_header(b"");
        let mut bytes = serialize(&header);
        for byte in &mut bytes[45..93] {
            *byte ^= 0xff;
        }

        let parsed = Header::read(&mut Cursor::new(&bytes)).unwrap();
        assert!(parsed.damaged);
    }

    #[test]
    fn test_version_refusals() {
        let make = |version: &str| {
            let header = sample_header(b"");
            let mut bytes = serialize(&header);
            bytes[..15].copy_from_slice(&RS5.encode(version.as_bytes()));
            bytes
        };

        for (version, build) in [("v1.14", "v1.16"), ("v1.15", "v1.16"), ("v1.16", "v1.16"), ("v1.17", "v1.21"), ("v1.21", "v1.21")] {
            match Header::read(&mut Cursor::new(make(version))) {
                Err(Error::UnsupportedVersion(b)) => assert_eq!(b, build),
                other => panic!("expected refusal for {version}, got {other:?}", other = other.err()),
            }
        }

        // Raw v1.13 prefix, no Reed-Solomon expansion at all.
        let mut raw = vec![0u8; 100];
        raw[..5].copy_from_slice(b"v1.13");
        assert!(matches!(Header::read(&mut Cursor::new(raw)), Err(Error::UnsupportedVersion("v1.13"))));

        assert!(matches!(Header::read(&mut Cursor::new(make("hello"))), Err(Error::NotAVolume)));
    }

    #[test]
    fn test_future_minor_version_accepted() {
        let header = sample_header(b"");
        let mut bytes = serialize(&header);
        bytes[..15].copy_from_slice(&RS5.encode(b"v1.99"));
        assert!(Header::read(&mut Cursor::new(bytes)).is_ok());
    }

    #[test]
    fn test_tiny_file_is_not_a_volume() {
        assert!(matches!(Header::read(&mut Cursor::new(b"pcv".to_vec())), Err(Error::NotAVolume)));
    }

    #[test]
    fn test_inspect_reads_metadata_and_flags() {
        let header = sample_header("vacation photos".as_bytes());
        let bytes = serialize(&header);

        let info = Header::inspect(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(info.version, VERSION);
        assert_eq!(info.metadata, "vacation photos");
        assert!(info.flags.paranoid);
        assert!(info.flags.reed_solomon);
        assert!(!info.flags.keyfile);
    }

    #[test]
    fn test_inspect_corrupted_metadata_placeholder() {
        let header = sample_header(b"abc");
        let mut bytes = serialize(&header);

        // Splice in a 3-byte word the 1/3 codec provably cannot repair.
        let unrecoverable = (0u32..1 << 24)
            .map(|w| [(w >> 16) as u8, (w >> 8) as u8, w as u8])
            .find(|candidate| RS1.decode(candidate).1)
            .expect("an undecodable 3-byte word exists");
        bytes[33..36].copy_from_slice(&unrecoverable);

        let info = Header::inspect(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(info.metadata, METADATA_CORRUPTED);
    }
}
