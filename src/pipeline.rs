//! Operation pipeline: drives one encrypt or decrypt job end to end.
//!
//! The pipeline is deliberately single-threaded and synchronous. One `run`
//! call owns its job, walks three phases (staging via bundle or recombine,
//! the streaming cryptographic pass, and the post phase of digest backfill,
//! splitting, and cleanup), and publishes progress through the caller's sink.
//! Cancellation is polled between chunks and phases; a cancelled or failed
//! operation removes its partial outputs and intermediates but never the
//! sources.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use subtle::ConstantTimeEq;
use tracing::debug;

use crate::archive;
use crate::config::{
    CHUNK_SIZE, MAX_INPUT_SIZE, MAX_METADATA_SIZE, PADDED_THRESHOLD, RS_BLOCK_ENCODED_SIZE, RS_BLOCK_SIZE,
    RS_CHUNK_SIZE,
};
use crate::crypto::kdf::KeyMaterial;
use crate::crypto::random_bytes;
use crate::crypto::stream::BodyCipher;
use crate::encoding::RS128;
use crate::error::{Error, Result};
use crate::file::{self, DecryptInput, EncryptInput};
use crate::header::{Flags, Header};
use crate::padding;
use crate::progress::{CancelToken, ProgressSink, RateMeter};
use crate::split;
use crate::types::{Job, Mode, Report};

/// Runs one operation to completion.
///
/// # Errors
/// Any of the error kinds in [`crate::error::Error`]; partial outputs are
/// removed before an error is returned.
pub fn run(job: &Job, sink: &dyn ProgressSink, cancel: &CancelToken) -> Result<Report> {
    match job.mode {
        Mode::Encrypt => encrypt(job, sink, cancel),
        Mode::Decrypt => decrypt(job, sink, cancel),
    }
}

fn encrypt(job: &Job, sink: &dyn ProgressSink, cancel: &CancelToken) -> Result<Report> {
    if job.metadata.len() > MAX_METADATA_SIZE {
        return Err(Error::Io(io::Error::new(ErrorKind::InvalidInput, "metadata exceeds 99,999 bytes")));
    }

    let staged = file::stage_encrypt(&job.sources)?;
    let output = match &job.output {
        Some(requested) => file::normalize_encrypt_output(requested, &staged),
        None => file::default_encrypt_output(&staged),
    };

    if let EncryptInput::Bundle { zip, root, files } = &staged {
        sink.status(if job.compress { "Compressing files..." } else { "Combining files..." });
        debug!(files = files.len(), zip = %zip.display(), "bundling inputs");
        if let Err(e) = archive::write_bundle(zip, root, files, job.compress, sink, cancel) {
            remove_quiet(zip);
            return Err(e);
        }
    }

    let input = staged.path().to_path_buf();
    let bundled = matches!(&staged, EncryptInput::Bundle { .. });

    let streamed = encrypt_stream(job, &input, &output, sink, cancel);

    // The intermediate zip never outlives the operation.
    if bundled {
        remove_quiet(&input);
    }
    streamed?;

    let mut produced = output.clone();
    if let Some(spec) = &job.split {
        sink.status("Splitting file...");
        match split::split_volume(&output, spec.chunk_bytes().max(1), sink, cancel) {
            Ok(parts) => {
                fs::remove_file(&output)?;
                produced = parts.into_iter().next().unwrap_or(produced);
            }
            Err(e) => {
                remove_quiet(&output);
                return Err(e);
            }
        }
    }

    if job.delete_when_done {
        sink.status("Deleting files...");
        file::remove_sources(&job.sources)?;
    }

    sink.progress(1.0, "");
    Ok(Report { output: produced, kept: false })
}

/// The main cryptographic pass of an encryption: header, key derivation,
/// chunk loop, digest backfill. Removes the output it created on failure.
fn encrypt_stream(job: &Job, input: &Path, output: &Path, sink: &dyn ProgressSink, cancel: &CancelToken) -> Result<()> {
    let total = fs::metadata(input)?.len();
    if total > MAX_INPUT_SIZE {
        return Err(Error::TooLarge);
    }

    sink.status("Generating values...");
    let header = Header {
        metadata: job.metadata.clone().into_bytes(),
        flags: Flags {
            paranoid: job.paranoid,
            keyfile: !job.keyfiles.is_empty(),
            keyfile_order_matters: job.keyfile_order_matters,
            reed_solomon: job.reed_solomon,
            padded: total % CHUNK_SIZE as u64 >= PADDED_THRESHOLD,
        },
        salt: random_bytes(),
        hkdf_salt: random_bytes(),
        serpent_salt: random_bytes(),
        nonce: random_bytes(),
        key_hash: [0u8; 64],
        keyfile_hash: [0u8; 32],
        data_mac: [0u8; 64],
    };

    let mut out_file = File::create(output)?;
    let result = encrypt_body(job, input, &mut out_file, &header, total, sink, cancel);
    if result.is_err() {
        drop(out_file);
        remove_quiet(output);
    }
    result
}

fn encrypt_body(
    job: &Job,
    input: &Path,
    out_file: &mut File,
    header: &Header,
    total: u64,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<()> {
    let mut writer = BufWriter::new(&mut *out_file);
    header.write_preamble(&mut writer)?;

    sink.status("Deriving key...");
    debug!(total, paranoid = job.paranoid, reed_solomon = job.reed_solomon, "deriving encryption key");
    let keys = KeyMaterial::derive(&job.password, &header.salt, job.paranoid, &job.keyfiles, job.keyfile_order_matters)?;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let cipher_key = keys.cipher_key();
    let mut cipher = BodyCipher::new(&cipher_key, &header.nonce, &header.hkdf_salt, &header.serpent_salt, job.paranoid);

    let mut reader = BufReader::new(File::open(input)?);
    let meter = RateMeter::new(total);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut done = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let read = read_full(&mut reader, &mut buffer)?;
        if read == 0 {
            break;
        }

        cipher.encrypt_chunk(&mut buffer[..read]);
        if job.reed_solomon {
            writer.write_all(&rs_encode_chunk(&buffer[..read]))?;
        } else {
            writer.write_all(&buffer[..read])?;
        }

        done += read as u64;
        let fraction = meter.fraction(done);
        sink.progress(fraction, &format!("{:.2}%", f64::from(fraction) * 100.0));
        sink.status(&meter.status(done));

        if read < CHUNK_SIZE {
            break;
        }
    }

    // The digests can only be known once the whole body has streamed.
    writer.flush()?;
    drop(writer);
    out_file.seek(SeekFrom::Start(Header::digests_offset(header.metadata.len())))?;
    Header::write_digests(out_file, &keys.key_hash, &keys.keyfile_hash(), &cipher.finalize())?;

    Ok(())
}

fn decrypt(job: &Job, sink: &dyn ProgressSink, cancel: &CancelToken) -> Result<Report> {
    let [source] = job.sources.as_slice() else {
        return Err(Error::Io(io::Error::new(ErrorKind::InvalidInput, "decryption takes exactly one input")));
    };

    let staged = file::stage_decrypt(source)?;
    let (input, recombined) = match &staged {
        DecryptInput::Volume(path) => (path.clone(), false),
        DecryptInput::Split { base } => {
            sink.status("Recombining file...");
            debug!(base = %base.display(), parts = split::count_parts(base), "recombining split volume");
            split::recombine_volume(base, sink, cancel)?;
            (base.clone(), true)
        }
    };

    let output = match &job.output {
        Some(requested) => file::normalize_decrypt_output(requested, &input),
        None => file::default_decrypt_output(&staged),
    };

    let streamed = decrypt_stream(job, &input, &output, sink, cancel);

    // The recombination target never outlives the operation.
    if recombined {
        remove_quiet(&input);
    }
    let kept = streamed?;

    if job.delete_when_done {
        sink.status("Deleting files...");
        if recombined {
            split::remove_parts(&input)?;
        } else {
            fs::remove_file(&input)?;
        }
    }

    sink.progress(1.0, "");
    Ok(Report { output, kept })
}

/// The main cryptographic pass of a decryption. Returns whether corruption
/// was detected and kept at the user's request. Removes the output it
/// created on failure; credential and header refusals happen before any
/// output exists.
fn decrypt_stream(job: &Job, input: &Path, output: &Path, sink: &dyn ProgressSink, cancel: &CancelToken) -> Result<bool> {
    let mut kept = false;

    let mut reader = BufReader::new(File::open(input)?);
    let parsed = Header::read(&mut reader)?;
    if parsed.damaged {
        if job.keep {
            kept = true;
        } else {
            return Err(Error::HeaderCorrupt);
        }
    }
    let header = parsed.header;
    let flags = header.flags;

    let total = fs::metadata(input)?.len().saturating_sub(Header::on_disk_len(header.metadata.len()));
    let plaintext_estimate = if flags.reed_solomon {
        total / RS_BLOCK_ENCODED_SIZE as u64 * RS_BLOCK_SIZE as u64
    } else {
        total
    };
    if plaintext_estimate > MAX_INPUT_SIZE {
        return Err(Error::TooLarge);
    }

    sink.status("Deriving key...");
    debug!(total, paranoid = flags.paranoid, reed_solomon = flags.reed_solomon, "deriving decryption key");
    // Keyfiles only participate when the volume asks for them.
    let keyfiles: &[PathBuf] = if flags.keyfile { &job.keyfiles } else { &[] };
    let keys = KeyMaterial::derive(&job.password, &header.salt, flags.paranoid, keyfiles, flags.keyfile_order_matters)?;
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    // Wrong credentials are fatal even under the keep flag.
    if !bool::from(keys.key_hash[..].ct_eq(&header.key_hash[..])) {
        return Err(Error::WrongPassword);
    }
    if flags.keyfile {
        let supplied = keys.keyfile.as_ref().map_or([0u8; 32], |k| k.hash);
        if !bool::from(supplied[..].ct_eq(&header.keyfile_hash[..])) {
            return Err(Error::WrongKeyfile { order_matters: flags.keyfile_order_matters });
        }
    }

    let cipher_key = keys.cipher_key();
    let cipher = BodyCipher::new(&cipher_key, &header.nonce, &header.hkdf_salt, &header.serpent_salt, flags.paranoid);

    let mut out_file = File::create(output)?;
    let result = decrypt_body(job, &mut reader, &mut out_file, &header, cipher, total, kept, sink, cancel);
    if result.is_err() {
        drop(out_file);
        remove_quiet(output);
    }
    result
}

#[allow(clippy::too_many_arguments)]
fn decrypt_body(
    job: &Job,
    reader: &mut BufReader<File>,
    out_file: &mut File,
    header: &Header,
    mut cipher: BodyCipher,
    total: u64,
    mut kept: bool,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<bool> {
    let flags = header.flags;
    let mut writer = BufWriter::new(out_file);
    let chunk_len = if flags.reed_solomon { RS_CHUNK_SIZE } else { CHUNK_SIZE };
    let meter = RateMeter::new(total);
    let mut buffer = vec![0u8; chunk_len];
    let mut done = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let read = read_full(&mut *reader, &mut buffer)?;
        if read == 0 {
            break;
        }

        let final_chunk = done + read as u64 >= total;
        let mut data = if flags.reed_solomon {
            let (decoded, damaged) = rs_decode_chunk(&buffer[..read], final_chunk && flags.padded);
            if damaged {
                if job.keep {
                    kept = true;
                } else {
                    return Err(Error::BodyCorrupt);
                }
            }
            decoded
        } else {
            buffer[..read].to_vec()
        };

        cipher.decrypt_chunk(&mut data);
        writer.write_all(&data)?;

        done += read as u64;
        let fraction = meter.fraction(done);
        sink.progress(fraction, &format!("{:.2}%", f64::from(fraction) * 100.0));
        sink.status(&meter.status(done));

        if read < chunk_len {
            break;
        }
    }
    writer.flush()?;

    if !cipher.verify(&header.data_mac) {
        if job.keep {
            kept = true;
        } else {
            return Err(Error::AuthFailure);
        }
    }

    Ok(kept)
}

/// Reed-Solomon encodes one post-cipher chunk block by block. A short final
/// chunk gets its tail PKCS7-padded to a whole block, even when the tail is
/// empty, so decoding can always unpad unconditionally.
fn rs_encode_chunk(chunk: &[u8]) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(chunk.len() / RS_BLOCK_SIZE * RS_BLOCK_ENCODED_SIZE + RS_BLOCK_ENCODED_SIZE);

    if chunk.len() == CHUNK_SIZE {
        for block in chunk.chunks_exact(RS_BLOCK_SIZE) {
            encoded.extend_from_slice(&RS128.encode(block));
        }
        return encoded;
    }

    let full_blocks = chunk.len() / RS_BLOCK_SIZE;
    for block in chunk[..full_blocks * RS_BLOCK_SIZE].chunks_exact(RS_BLOCK_SIZE) {
        encoded.extend_from_slice(&RS128.encode(block));
    }
    encoded.extend_from_slice(&RS128.encode(&padding::pad(&chunk[full_blocks * RS_BLOCK_SIZE..])));
    encoded
}

/// Reed-Solomon decodes one on-disk chunk. A full-size chunk unpads its
/// tail block only when `unpad_tail` says the writer padded it; a short
/// chunk always unpads its tail. Returns the data and whether any block
/// (or a truncated trailing fragment) was unrecoverable.
fn rs_decode_chunk(encoded: &[u8], unpad_tail: bool) -> (Vec<u8>, bool) {
    let mut damaged = encoded.len() % RS_BLOCK_ENCODED_SIZE != 0;
    let usable = encoded.len() - encoded.len() % RS_BLOCK_ENCODED_SIZE;
    let blocks = usable / RS_BLOCK_ENCODED_SIZE;
    let full_size = encoded.len() == RS_CHUNK_SIZE;

    let mut data = Vec::with_capacity(blocks * RS_BLOCK_SIZE);
    for (index, block) in encoded[..usable].chunks_exact(RS_BLOCK_ENCODED_SIZE).enumerate() {
        let (decoded, bad) = RS128.decode(block);
        damaged |= bad;

        let is_tail = index == blocks - 1;
        if is_tail && (!full_size || unpad_tail) {
            data.extend_from_slice(&padding::unpad(&decoded));
        } else {
            data.extend_from_slice(&decoded);
        }
    }

    (data, damaged)
}

/// Reads until `buf` is full or the stream ends, retrying interrupted
/// reads; a short read mid-stream is never mistaken for EOF.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn remove_quiet(path: &Path) {
    let _ = fs::remove_file(path);
}
