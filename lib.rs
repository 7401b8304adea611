//! # genc - Passphrase-based file encryption
//!
//! genc encrypts a single file into a streaming container: an Argon2id-derived
//! key and AES-256-GCM over independently authenticated 1 MiB chunks.
//!
//! ## Features
//!
//! - **Argon2id**: Memory-hard key derivation (64 MiB, fresh salt per file)
//! - **AES-256-GCM**: Every chunk sealed under its own random nonce
//! - **Streaming**: Files are processed block by block, never loaded whole
//! - **File Safety**: Backups before overwrite, partial output removed on failure
//!
//! ## Quick Start
//!
//! ```no_run
//! use genc::{decrypt_file, encrypt_file, DecryptOptions, EncryptOptions};
//!
//! fn main() -> Result<(), genc::GencError> {
//!     // Writes secret.txt.genc
//!     encrypt_file("correct-horse-battery", "secret.txt", &EncryptOptions::new())?;
//!
//!     // Writes secret.txt, backing up any existing file to secret.txt.bak
//!     decrypt_file("correct-horse-battery", "secret.txt.genc", &DecryptOptions::new())?;
//!     Ok(())
//! }
//! ```
//!
//! ## File Format
//!
//! ```text
//! [magic:4 "genc"][salt:16]
//! [nonce:12][length:4 BE][ciphertext+tag] ... repeated until EOF
//! ```

pub mod config;
pub mod error;
pub mod file_ops;
pub mod format;
pub mod kdf;
pub mod streaming;

// Re-export common types for convenience
pub use error::{GencError, Result};
pub use file_ops::{
    decrypt_file, encrypt_file, DecryptOptions, DecryptSummary, EncryptOptions, EncryptSummary,
};
pub use streaming::{StreamStats, TruncationPolicy};
