//! Passphrase key derivation and salt generation.
//!
//! Keys come from Argon2id with fixed parameters. The container does not
//! record them, so changing any constant here makes existing files
//! undecryptable.
//!
//! ## Security Features
//!
//! - Derived keys are zeroized on drop (via `Zeroize`)
//! - Salts come from the OS CSPRNG (`OsRng`)

use crate::error::{GencError, Result};
use crate::format::SALT_LEN;
use argon2::{Algorithm, Argon2, Params, Version};
use rand_core::{OsRng, RngCore};
use std::fmt;
use std::thread;
use tracing::debug;
use zeroize::Zeroize;

pub const KEY_LEN: usize = 32;

/// Argon2id memory cost in KiB (64 MiB)
pub const MEMORY_COST_KIB: u32 = 64 * 1024;
pub const TIME_COST: u32 = 1;
pub const MAX_LANES: u32 = 4;

/// 256-bit key derived for a single encrypt/decrypt call; never persisted.
pub struct DerivedKey {
    key_bytes: [u8; KEY_LEN],
}

impl DerivedKey {
    pub fn from_bytes(key_bytes: [u8; KEY_LEN]) -> Self {
        Self { key_bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.key_bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.key_bytes.zeroize();
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("key_bytes", &"[REDACTED]")
            .finish()
    }
}

/// Lane count: available parallelism capped at [`MAX_LANES`]
pub fn lanes() -> u32 {
    let cores = thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores as u32).clamp(1, MAX_LANES)
}

/// Derive the 32-byte key for `passphrase` and `salt` with Argon2id.
///
/// Passphrase length policy belongs to the caller.
pub fn derive_key(passphrase: &[u8], salt: &[u8; SALT_LEN]) -> Result<DerivedKey> {
    let lanes = lanes();
    debug!(memory_kib = MEMORY_COST_KIB, iterations = TIME_COST, lanes, "deriving key");

    let params = Params::new(MEMORY_COST_KIB, TIME_COST, lanes, Some(KEY_LEN))
        .map_err(|e| GencError::KeyDerivation(format!("invalid Argon2id params: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key_bytes = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase, salt, &mut key_bytes)
        .map_err(|e| GencError::KeyDerivation(e.to_string()))?;

    Ok(DerivedKey { key_bytes })
}

pub fn generate_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(GencError::SaltGeneration)?;
    Ok(salt)
}
