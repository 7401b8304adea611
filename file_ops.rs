//! High-level file encryption and decryption.
//!
//! This module provides [`encrypt_file`] and [`decrypt_file`], the caller-facing
//! operations, and the file safety rules around them:
//!
//! - Encryption writes `<source>.genc`, truncating any file of that exact name
//! - Decryption copies a pre-existing destination to `<dest>.bak` first
//! - Output is flushed and fsynced before success is reported
//! - A failed operation removes its partially written destination

use crate::error::{GencError, Result};
use crate::format::{read_header, Header, EXTENSION, IO_BUFFER_SIZE};
use crate::kdf::{derive_key, generate_salt};
use crate::streaming::{StreamCipher, StreamStats, TruncationPolicy};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    /// Remove the source file after a successful encryption
    pub delete_origin: bool,
}

impl EncryptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delete_origin(mut self, delete_origin: bool) -> Self {
        self.delete_origin = delete_origin;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    /// Destination path; defaults to the source with `.genc` stripped
    pub out_path: Option<PathBuf>,
    pub truncation: TruncationPolicy,
}

impl DecryptOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_out_path(mut self, out_path: impl Into<PathBuf>) -> Self {
        self.out_path = Some(out_path.into());
        self
    }

    pub fn with_truncation(mut self, truncation: TruncationPolicy) -> Self {
        self.truncation = truncation;
        self
    }
}

#[derive(Debug, Clone)]
pub struct EncryptSummary {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bytes: u64,
    pub chunks: u64,
    pub origin_removed: bool,
}

#[derive(Debug, Clone)]
pub struct DecryptSummary {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Copy of the file that previously occupied `destination`
    pub backup: Option<PathBuf>,
    pub bytes: u64,
    pub chunks: u64,
    pub truncated: bool,
}

/// `<path>.genc`; the suffix is appended, never substituted for an extension
pub fn encrypted_path(path: &Path) -> PathBuf {
    append_suffix(path, EXTENSION)
}

pub fn backup_path(path: &Path) -> PathBuf {
    append_suffix(path, "bak")
}

/// Default decryption target: `path` without its trailing `.genc`.
/// Paths without the suffix come back unchanged.
pub fn default_destination(path: &Path) -> PathBuf {
    if path.extension() == Some(OsStr::new(EXTENSION)) {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Encrypt `path` into `<path>.genc` under a key derived from `passphrase`.
///
/// With `delete_origin`, a failure to remove the source is returned as
/// [`GencError::RemoveOriginFailed`] after the container is already durable.
pub fn encrypt_file(
    passphrase: &str,
    path: impl AsRef<Path>,
    opts: &EncryptOptions,
) -> Result<EncryptSummary> {
    let source = path.as_ref();
    let destination = encrypted_path(source);
    debug!(file = %source.display(), delete_origin = opts.delete_origin, "encrypting file");

    let header = Header::new(generate_salt()?);
    let key = derive_key(passphrase.as_bytes(), &header.salt)?;
    let cipher = StreamCipher::new(&key)?;

    let input = File::open(source).map_err(|e| GencError::Open {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::with_capacity(IO_BUFFER_SIZE, input);

    let (output, file) = PartialOutput::create(&destination)?;
    let stats = write_synced(file, |writer| {
        cipher.encrypt_stream(&header, &mut reader, writer)
    })?;
    output.commit();
    drop(reader);

    info!(
        file = %source.display(),
        destination = %destination.display(),
        bytes = stats.bytes,
        chunks = stats.chunks,
        "file encrypted successfully"
    );

    if opts.delete_origin {
        fs::remove_file(source).map_err(|e| {
            warn!(file = %source.display(), error = %e, "failed to remove original file");
            GencError::RemoveOriginFailed {
                path: source.to_path_buf(),
                source: e,
            }
        })?;
        debug!(file = %source.display(), "original file removed");
    }

    Ok(EncryptSummary {
        source: source.to_path_buf(),
        destination,
        bytes: stats.bytes,
        chunks: stats.chunks,
        origin_removed: opts.delete_origin,
    })
}

/// Decrypt a genc container at `path`.
///
/// The header is validated and the key derived before anything is written,
/// so a foreign file never produces output or a backup.
pub fn decrypt_file(
    passphrase: &str,
    path: impl AsRef<Path>,
    opts: &DecryptOptions,
) -> Result<DecryptSummary> {
    let source = path.as_ref();
    let destination = opts
        .out_path
        .clone()
        .unwrap_or_else(|| default_destination(source));
    debug!(file = %source.display(), destination = %destination.display(), "decrypting file");

    if is_same_file(source, &destination) {
        return Err(GencError::DestinationIsSource(destination));
    }

    let input = File::open(source).map_err(|e| GencError::Open {
        path: source.to_path_buf(),
        source: e,
    })?;
    let mut reader = BufReader::with_capacity(IO_BUFFER_SIZE, input);

    let header = read_header(&mut reader)?;
    let key = derive_key(passphrase.as_bytes(), &header.salt)?;
    let cipher = StreamCipher::new(&key)?;

    let backup = backup_existing(&destination)?;

    let (output, file) = PartialOutput::create(&destination)?;
    let stats: StreamStats = write_synced(file, |writer| {
        cipher.decrypt_stream(&mut reader, writer, opts.truncation)
    })?;
    output.commit();

    info!(
        file = %source.display(),
        destination = %destination.display(),
        bytes = stats.bytes,
        chunks = stats.chunks,
        truncated = stats.truncated,
        "file decrypted successfully"
    );

    Ok(DecryptSummary {
        source: source.to_path_buf(),
        destination,
        backup,
        bytes: stats.bytes,
        chunks: stats.chunks,
        truncated: stats.truncated,
    })
}

/// Copy an existing `destination` aside before it gets truncated
fn backup_existing(destination: &Path) -> Result<Option<PathBuf>> {
    match fs::metadata(destination) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        _ => {}
    }

    let backup = backup_path(destination);
    warn!(
        file = %destination.display(),
        backup = %backup.display(),
        "output file already exists, creating backup"
    );

    // fs::copy carries the permission bits over
    fs::copy(destination, &backup).map_err(|e| GencError::BackupFailed {
        path: destination.to_path_buf(),
        backup: backup.clone(),
        source: e,
    })?;

    Ok(Some(backup))
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Buffer writes to `file`, then flush and fsync it
fn write_synced<F>(file: File, body: F) -> Result<StreamStats>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<StreamStats>,
{
    let mut writer = BufWriter::with_capacity(IO_BUFFER_SIZE, file);
    let stats = body(&mut writer)?;
    let file = writer
        .into_inner()
        .map_err(|e| GencError::Write(e.into_error()))?;
    file.sync_all().map_err(GencError::Sync)?;
    Ok(stats)
}

/// Destination file that is deleted on drop unless committed
struct PartialOutput {
    path: PathBuf,
    committed: bool,
}

impl PartialOutput {
    fn create(path: &Path) -> Result<(Self, File)> {
        let file = File::create(path).map_err(|e| GencError::Create {
            path: path.to_path_buf(),
            source: e,
        })?;
        let guard = Self {
            path: path.to_path_buf(),
            committed: false,
        };
        Ok((guard, file))
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => warn!(file = %self.path.display(), "removed partial output"),
            Err(e) => error!(
                file = %self.path.display(),
                error = %e,
                "failed to remove partial output"
            ),
        }
    }
}
