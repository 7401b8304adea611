use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by genc encrypt/decrypt operations
#[derive(Debug, Error)]
pub enum GencError {
    /// OS random source failed while generating the salt
    #[error("failed to generate salt: {0}")]
    SaltGeneration(rand_core::Error),

    /// OS random source failed while generating a chunk nonce
    #[error("failed to generate random nonce: {0}")]
    NonceGeneration(rand_core::Error),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("failed to create cipher: {0}")]
    CipherInit(String),

    /// Header buffer shorter than the fixed header size
    #[error("header too short: need {need} bytes, got {got}")]
    HeaderTooShort { need: usize, got: usize },

    /// First four bytes are not the genc magic
    #[error("invalid magic: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    /// Chunk frame buffer shorter than the fixed frame size
    #[error("buffer too small: need {need} bytes, got {got}")]
    BufferTooSmall { need: usize, got: usize },

    #[error("chunk too large to encode as uint32: {len} bytes")]
    ChunkTooLarge { len: usize },

    /// Container ends partway through a chunk (strict mode only)
    #[error("container truncated inside chunk {chunk}")]
    Truncated { chunk: u64 },

    /// Chunk failed authentication. Tampering, corruption and a wrong
    /// passphrase are indistinguishable here.
    #[error("decryption failed: chunk {chunk} could not be authenticated")]
    AuthenticationFailed { chunk: u64 },

    #[error("failed to open file {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("failed to create file {path:?}: {source}")]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to write file header: {0}")]
    HeaderWrite(io::Error),

    #[error("failed to read file header: {0}")]
    HeaderRead(io::Error),

    #[error("read failed: {0}")]
    Read(io::Error),

    #[error("write failed: {0}")]
    Write(io::Error),

    #[error("failed to sync output file: {0}")]
    Sync(io::Error),

    /// Copying the pre-existing destination aside failed; destination untouched
    #[error("failed to back up {path:?} to {backup:?}: {source}")]
    BackupFailed {
        path: PathBuf,
        backup: PathBuf,
        source: io::Error,
    },

    #[error("output path {0:?} is the input file itself")]
    DestinationIsSource(PathBuf),

    /// Encryption succeeded but the original file could not be removed
    #[error("failed to remove original file {path:?}: {source}")]
    RemoveOriginFailed { path: PathBuf, source: io::Error },
}

impl GencError {
    /// Whether the operation that returned this error failed.
    ///
    /// `RemoveOriginFailed` is reported after the container has been written
    /// and synced, so the encryption itself stands.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::RemoveOriginFailed { .. })
    }
}

pub type Result<T> = std::result::Result<T, GencError>;
