//! Intermediate zip bundling for multi-file inputs.
//!
//! More than one input (or any folder) is first gathered into a plain zip
//! (stored, not compressed, unless the user asked for compression) so the
//! cryptographic pass always sees a single file. Archived names are slash
//! separated and relative to the common root directory.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use zip::CompressionMethod;
use zip::result::ZipError;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::{Error, Result};
use crate::progress::{CancelToken, ProgressSink};

/// Writes the intermediate bundle at `zip_path`.
///
/// Progress is reported per file. Cancellation is honored between files;
/// the caller removes the partial bundle.
///
/// # Errors
/// Propagates I/O and archive failures, and [`Error::Cancelled`].
pub fn write_bundle(
    zip_path: &Path,
    root: &Path,
    files: &[PathBuf],
    compress: bool,
    sink: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<()> {
    let method = if compress { CompressionMethod::Deflated } else { CompressionMethod::Stored };
    let options = SimpleFileOptions::default().compression_method(method).large_file(true);

    let mut writer = ZipWriter::new(File::create(zip_path)?);

    #[allow(clippy::cast_precision_loss)]
    let count = files.len() as f32;
    for (index, path) in files.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        #[allow(clippy::cast_precision_loss)]
        sink.progress(index as f32 / count, &format!("{index}/{}", files.len()));

        // The bundle itself can be discovered when it lands inside a
        // dropped folder; never archive it into itself.
        if path == zip_path {
            continue;
        }

        writer.start_file(archive_name(path, root), options).map_err(zip_error)?;
        let mut input = File::open(path)?;
        io::copy(&mut input, &mut writer)?;
    }

    writer.finish().map_err(zip_error)?;
    Ok(())
}

/// Slash-separated archive name for `path`, relative to `root`. A file
/// outside the root falls back to its bare file name.
fn archive_name(path: &Path, root: &Path) -> String {
    let relative = match path.strip_prefix(root) {
        Ok(relative) => relative.to_path_buf(),
        Err(_) => PathBuf::from(path.file_name().unwrap_or(path.as_os_str())),
    };
    relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect::<Vec<_>>().join("/")
}

fn zip_error(error: ZipError) -> Error {
    match error {
        ZipError::Io(io) => Error::Io(io),
        other => Error::Io(io::Error::other(other)),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::progress::NullSink;

    #[test]
    fn test_bundle_preserves_relative_paths() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("docs/sub")).unwrap();
        fs::write(root.join("docs/a.txt"), b"alpha").unwrap();
        fs::write(root.join("docs/sub/b.txt"), b"beta").unwrap();

        let zip_path = root.join("Encrypted.zip");
        let files = vec![root.join("docs/a.txt"), root.join("docs/sub/b.txt")];
        write_bundle(&zip_path, root, &files, false, &NullSink, &CancelToken::new()).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len()).map(|i| archive.by_index(i).unwrap().name().to_owned()).collect();
        assert_eq!(names, vec!["docs/a.txt", "docs/sub/b.txt"]);

        let mut content = String::new();
        io::Read::read_to_string(&mut archive.by_name("docs/a.txt").unwrap(), &mut content).unwrap();
        assert_eq!(content, "alpha");
    }

    #[test]
    fn test_bundle_deflate_roundtrip() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        let payload = vec![b'z'; 10_000];
        fs::write(root.join("big.txt"), &payload).unwrap();

        let zip_path = root.join("Encrypted.zip");
        write_bundle(&zip_path, root, &[root.join("big.txt")], true, &NullSink, &CancelToken::new()).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut restored = Vec::new();
        io::Read::read_to_end(&mut archive.by_name("big.txt").unwrap(), &mut restored).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_bundle_cancellation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();

        let result = write_bundle(&dir.path().join("Encrypted.zip"), dir.path(), &[dir.path().join("a.txt")], false, &NullSink, &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
