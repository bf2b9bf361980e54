//! Input classification, output path derivation, and volume peeking.
//!
//! This is the filesystem surface around the cryptographic core: it decides
//! what a set of dropped paths means (one file, a bundle, a volume, a split
//! set), derives the default output names, enforces the `.pcv` / `.zip.pcv`
//! suffix policy on manual overrides, and deletes sources when asked.

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{BUNDLE_NAME, VOLUME_EXTENSION};
use crate::error::{Error, Result};
use crate::header::{Header, VolumeInfo};

/// What an encryption operation actually reads.
#[derive(Clone, Debug)]
pub enum EncryptInput {
    /// A single regular file, encrypted as-is.
    Single(PathBuf),

    /// Multiple files and/or folders, bundled into an intermediate zip.
    Bundle {
        /// Path of the intermediate zip, `dir(first)/Encrypted.zip`.
        zip: PathBuf,

        /// Root the archived names are made relative to.
        root: PathBuf,

        /// Every regular file to archive, folders already expanded.
        files: Vec<PathBuf>,
    },
}

impl EncryptInput {
    /// The file the cryptographic pass reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Single(path) => path,
            Self::Bundle { zip, .. } => zip,
        }
    }
}

/// What a decryption operation actually reads.
#[derive(Clone, Debug)]
pub enum DecryptInput {
    /// A monolithic volume.
    Volume(PathBuf),

    /// A split set `base.pcv.0, base.pcv.1, …` recombined into `base.pcv`
    /// before parsing.
    Split {
        /// The recombination target, ending in `.pcv`.
        base: PathBuf,
    },
}

/// Classifies encryption sources and expands folders.
///
/// A single regular file is encrypted directly; anything else (a folder, or
/// several items) goes through the intermediate zip.
///
/// # Errors
/// Fails when the source list is empty or a source cannot be inspected.
pub fn stage_encrypt(sources: &[PathBuf]) -> Result<EncryptInput> {
    let [first, ..] = sources else {
        return Err(Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, "no input files")));
    };

    if sources.len() == 1 && fs::metadata(first)?.is_file() {
        return Ok(EncryptInput::Single(first.clone()));
    }

    // The archived names are relative to the first folder's parent, or the
    // first file's parent when only files were dropped.
    let mut root = parent_of(first);
    for source in sources {
        if fs::metadata(source)?.is_dir() {
            root = parent_of(source);
            break;
        }
    }

    let mut files = Vec::new();
    for source in sources {
        if fs::metadata(source)?.is_dir() {
            for entry in WalkDir::new(source) {
                let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e)))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(source.clone());
        }
    }

    Ok(EncryptInput::Bundle { zip: parent_of(first).join(BUNDLE_NAME), root, files })
}

/// Classifies a decryption source as a monolithic volume or a split set.
///
/// # Errors
/// Returns [`Error::NotAVolume`] when the name carries neither the volume
/// extension nor a split-part suffix.
pub fn stage_decrypt(source: &Path) -> Result<DecryptInput> {
    if let Some(base) = split_base(source) {
        return Ok(DecryptInput::Split { base });
    }
    if file_name(source).ends_with(VOLUME_EXTENSION) {
        return Ok(DecryptInput::Volume(source.to_path_buf()));
    }
    Err(Error::NotAVolume)
}

/// True when the name looks like one part of a split volume: it contains
/// `.pcv.` and ends with a decimal digit.
#[must_use]
pub fn is_split_part(path: &Path) -> bool {
    let name = file_name(path);
    name.contains(".pcv.") && name.ends_with(|c: char| c.is_ascii_digit())
}

/// For a split part `base.pcv.N`, the recombination target `base.pcv`.
#[must_use]
pub fn split_base(path: &Path) -> Option<PathBuf> {
    if !is_split_part(path) {
        return None;
    }
    let name = file_name(path);
    let end = name.find(".pcv")? + VOLUME_EXTENSION.len();
    Some(parent_of(path).join(&name[..end]))
}

/// Default output for an encryption input: `X.pcv`, or
/// `dir(first)/Encrypted.zip.pcv` for bundles.
#[must_use]
pub fn default_encrypt_output(input: &EncryptInput) -> PathBuf {
    let mut name = input.path().as_os_str().to_owned();
    name.push(VOLUME_EXTENSION);
    PathBuf::from(name)
}

/// Default output for a decryption input: the volume name without `.pcv`.
#[must_use]
pub fn default_decrypt_output(input: &DecryptInput) -> PathBuf {
    let volume = match input {
        DecryptInput::Volume(path) => path.clone(),
        DecryptInput::Split { base } => base.clone(),
    };
    let name = file_name(&volume);
    let stripped = name.strip_suffix(VOLUME_EXTENSION).unwrap_or(&name).to_owned();
    parent_of(&volume).join(stripped)
}

/// Applies the suffix policy to a manually chosen encryption output:
/// bundles always end `.zip.pcv`, single files keep their extension chain
/// and gain `.pcv`.
#[must_use]
pub fn normalize_encrypt_output(requested: &Path, input: &EncryptInput) -> PathBuf {
    let name = file_name(requested);

    let normalized = match input {
        EncryptInput::Bundle { .. } => {
            let trimmed = name.strip_suffix(".zip.pcv").or_else(|| name.strip_suffix(VOLUME_EXTENSION)).unwrap_or(&name);
            format!("{trimmed}.zip.pcv")
        }
        EncryptInput::Single(source) => {
            let trimmed = name.strip_suffix(VOLUME_EXTENSION).unwrap_or(&name);
            let mut normalized = if trimmed.contains('.') {
                trimmed.to_owned()
            } else {
                format!("{trimmed}{}", extension_chain(source))
            };
            if !normalized.ends_with(VOLUME_EXTENSION) {
                normalized.push_str(VOLUME_EXTENSION);
            }
            normalized
        }
    };

    parent_of(requested).join(normalized)
}

/// Applies the suffix policy to a manually chosen decryption output: the
/// original extension chain is restored from the volume's name.
#[must_use]
pub fn normalize_decrypt_output(requested: &Path, volume: &Path) -> PathBuf {
    let name = file_name(requested);
    let stem = name.split('.').next().unwrap_or(&name);

    let volume_name = file_name(volume);
    let suffix = if volume_name.ends_with(".zip.pcv") {
        ".zip".to_owned()
    } else {
        let original = volume_name.strip_suffix(VOLUME_EXTENSION).unwrap_or(&volume_name);
        extension_chain(Path::new(original))
    };

    parent_of(requested).join(format!("{stem}{suffix}"))
}

/// Peeks at a volume's header for pre-password hints. For a split set the
/// preamble is read from part `.0`.
///
/// # Errors
/// Propagates open failures and the header refusal rules.
pub fn inspect_volume(source: &Path) -> Result<VolumeInfo> {
    let path = match split_base(source) {
        Some(base) => {
            let mut part = base.into_os_string();
            part.push(".0");
            PathBuf::from(part)
        }
        None => source.to_path_buf(),
    };

    let mut reader = BufReader::new(File::open(&path)?);
    Header::inspect(&mut reader)
}

/// Removes original inputs after a successful encryption.
///
/// # Errors
/// Propagates the first removal failure.
pub fn remove_sources(sources: &[PathBuf]) -> Result<()> {
    for source in sources {
        if fs::metadata(source)?.is_dir() {
            fs::remove_dir_all(source)?;
        } else {
            fs::remove_file(source)?;
        }
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

fn parent_of(path: &Path) -> PathBuf {
    path.parent().map_or_else(PathBuf::new, Path::to_path_buf)
}

/// The extension chain of a file name, from its first dot: `a.tar.gz`
/// yields `.tar.gz`.
fn extension_chain(path: &Path) -> String {
    let name = file_name(path);
    name.find('.').map(|i| name[i..].to_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_single_file_stages_directly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("report.txt");
        fs::write(&path, b"data").unwrap();

        match stage_encrypt(std::slice::from_ref(&path)).unwrap() {
            EncryptInput::Single(staged) => assert_eq!(staged, path),
            other => panic!("expected single input, got {other:?}"),
        }
    }

    #[test]
    fn test_folder_stages_as_bundle() {
        let dir = tempdir().unwrap();
        let folder = dir.path().join("photos");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("a.jpg"), b"a").unwrap();
        fs::write(folder.join("b.jpg"), b"b").unwrap();

        match stage_encrypt(&[folder.clone()]).unwrap() {
            EncryptInput::Bundle { zip, root, files } => {
                assert_eq!(zip, dir.path().join(BUNDLE_NAME));
                assert_eq!(root, dir.path());
                assert_eq!(files.len(), 2);
            }
            other => panic!("expected bundle, got {other:?}"),
        }
    }

    #[test]
    fn test_split_part_detection() {
        assert!(is_split_part(Path::new("/tmp/backup.pcv.0")));
        assert!(is_split_part(Path::new("backup.pcv.12")));
        assert!(!is_split_part(Path::new("backup.pcv")));
        assert!(!is_split_part(Path::new("backup.pcv.part")));
        assert!(!is_split_part(Path::new("backup.zip")));

        assert_eq!(split_base(Path::new("/tmp/backup.pcv.3")), Some(PathBuf::from("/tmp/backup.pcv")));
        assert_eq!(split_base(Path::new("backup.zip")), None);
    }

    #[test]
    fn test_output_derivation() {
        let single = EncryptInput::Single(PathBuf::from("/data/notes.txt"));
        assert_eq!(default_encrypt_output(&single), PathBuf::from("/data/notes.txt.pcv"));

        let volume = stage_decrypt(Path::new("/data/notes.txt.pcv")).unwrap();
        assert_eq!(default_decrypt_output(&volume), PathBuf::from("/data/notes.txt"));

        let split = stage_decrypt(Path::new("/data/notes.txt.pcv.4")).unwrap();
        assert_eq!(default_decrypt_output(&split), PathBuf::from("/data/notes.txt"));

        assert!(matches!(stage_decrypt(Path::new("/data/notes.txt")), Err(Error::NotAVolume)));
    }

    #[test]
    fn test_normalize_encrypt_output() {
        let single = EncryptInput::Single(PathBuf::from("/data/archive.tar.gz"));
        assert_eq!(normalize_encrypt_output(Path::new("/out/backup"), &single), PathBuf::from("/out/backup.tar.gz.pcv"));
        assert_eq!(normalize_encrypt_output(Path::new("/out/backup.tar.gz.pcv"), &single), PathBuf::from("/out/backup.tar.gz.pcv"));

        let bundle = EncryptInput::Bundle { zip: PathBuf::from("/data/Encrypted.zip"), root: PathBuf::from("/data"), files: vec![] };
        assert_eq!(normalize_encrypt_output(Path::new("/out/stuff"), &bundle), PathBuf::from("/out/stuff.zip.pcv"));
        assert_eq!(normalize_encrypt_output(Path::new("/out/stuff.zip.pcv"), &bundle), PathBuf::from("/out/stuff.zip.pcv"));
    }

    #[test]
    fn test_normalize_decrypt_output() {
        assert_eq!(
            normalize_decrypt_output(Path::new("/out/restored"), Path::new("/data/archive.tar.gz.pcv")),
            PathBuf::from("/out/restored.tar.gz")
        );
        assert_eq!(
            normalize_decrypt_output(Path::new("/out/restored.bin"), Path::new("/data/Encrypted.zip.pcv")),
            PathBuf::from("/out/restored.zip")
        );
    }
}
