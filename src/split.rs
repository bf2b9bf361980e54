//! Split-volume emission and recombination.
//!
//! An encrypted volume can be broken into numbered parts `out.0, out.1, …`
//! of a fixed size for transport, and a dropped part is recombined into the
//! monolithic volume before decryption. Naming is strictly sequential; the
//! set ends at the first missing index.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::CHUNK_SIZE;
use crate::error::{Error, Result};
use crate::progress::{CancelToken, ProgressSink};

/// Path of part `index` of the split set rooted at `base`.
#[must_use]
pub fn part_path(base: &Path, index: u64) -> PathBuf {
    let mut path = base.as_os_str().to_owned();
    path.push(format!(".{index}"));
    PathBuf::from(path)
}

/// Number of consecutive parts present on disk, starting at `.0`.
#[must_use]
pub fn count_parts(base: &Path) -> u64 {
    let mut total = 0;
    while part_path(base, total).exists() {
        total += 1;
    }
    total
}

/// Splits `path` into parts of exactly `chunk_size` bytes (the last may be
/// shorter). The monolithic file is left in place; the caller removes it
/// after a successful split.
///
/// On failure or cancellation every part written so far is removed.
///
/// # Errors
/// Propagates I/O failures and [`Error::Cancelled`].
pub fn split_volume(path: &Path, chunk_size: u64, sink: &dyn ProgressSink, cancel: &CancelToken) -> Result<Vec<PathBuf>> {
    let size = fs::metadata(path)?.len();
    let chunks = size.div_ceil(chunk_size).max(1);

    let mut reader = BufReader::new(File::open(path)?);
    let mut parts: Vec<PathBuf> = Vec::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    let result: Result<()> = (|| {
        for index in 0..chunks {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let part = part_path(path, index);
            let mut writer = BufWriter::new(File::create(&part)?);
            parts.push(part);

            let mut written = 0u64;
            while written < chunk_size {
                let want = usize::try_from((chunk_size - written).min(CHUNK_SIZE as u64)).expect("bounded by CHUNK_SIZE");
                let read = reader.read(&mut buffer[..want])?;
                if read == 0 {
                    break;
                }
                writer.write_all(&buffer[..read])?;
                written += read as u64;
            }
            writer.flush()?;

            #[allow(clippy::cast_precision_loss)]
            sink.progress((index + 1) as f32 / chunks as f32, &format!("{}/{chunks}", index + 1));
        }
        Ok(())
    })();

    if let Err(e) = result {
        for part in &parts {
            let _ = fs::remove_file(part);
        }
        return Err(e);
    }

    Ok(parts)
}

/// Concatenates the split set rooted at `base` back into `base` itself.
///
/// On failure or cancellation the partial recombination target is removed;
/// the parts are never touched.
///
/// # Errors
/// Propagates I/O failures and [`Error::Cancelled`].
pub fn recombine_volume(base: &Path, sink: &dyn ProgressSink, cancel: &CancelToken) -> Result<()> {
    let total = count_parts(base);
    if total == 0 {
        return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, format!("no parts found for {}", base.display()))));
    }

    let mut writer = BufWriter::new(File::create(base)?);

    let result: Result<()> = (|| {
        for index in 0..total {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let mut reader = BufReader::new(File::open(part_path(base, index))?);
            std::io::copy(&mut reader, &mut writer)?;

            #[allow(clippy::cast_precision_loss)]
            sink.progress(index as f32 / total as f32, &format!("{index}/{total}"));
        }
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = fs::remove_file(base);
        return Err(e);
    }

    Ok(())
}

/// Removes every part of the split set rooted at `base`.
///
/// # Errors
/// Propagates removal failures.
pub fn remove_parts(base: &Path) -> Result<()> {
    for index in 0..count_parts(base) {
        fs::remove_file(part_path(base, index))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::progress::NullSink;

    #[test]
    fn test_split_and_recombine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volume.pcv");
        let data: Vec<u8> = (0..10_240u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        let parts = split_volume(&path, 3 * 1024, &NullSink, &CancelToken::new()).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(fs::metadata(&parts[0]).unwrap().len(), 3 * 1024);
        assert_eq!(fs::metadata(&parts[3]).unwrap().len(), 1024);
        assert_eq!(count_parts(&path), 4);

        fs::remove_file(&path).unwrap();
        recombine_volume(&path, &NullSink, &CancelToken::new()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), data);

        remove_parts(&path).unwrap();
        assert_eq!(count_parts(&path), 0);
    }

    #[test]
    fn test_split_cancellation_removes_parts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volume.pcv");
        fs::write(&path, vec![0u8; 4096]).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();

        assert!(matches!(split_volume(&path, 1024, &NullSink, &cancel), Err(Error::Cancelled)));
        assert_eq!(count_parts(&path), 0);
        assert!(path.exists());
    }

    #[test]
    fn test_recombine_missing_parts() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("volume.pcv");
        assert!(recombine_volume(&base, &NullSink, &CancelToken::new()).is_err());
    }

    #[test]
    fn test_empty_file_still_splits_into_one_part() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("volume.pcv");
        fs::write(&path, b"").unwrap();

        let parts = split_volume(&path, 1024, &NullSink, &CancelToken::new()).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(fs::metadata(&parts[0]).unwrap().len(), 0);
    }
}
