//! Container layout and the header/chunk codecs.
//!
//! ```text
//! Header (20 bytes):
//! [magic:4 "genc"][salt:16]
//!
//! Each chunk:
//! [nonce:12][length:4 big-endian][ciphertext+tag:length]
//! ```
//!
//! Codecs here are purely structural; authentication happens in
//! [`crate::streaming`].

use crate::error::{GencError, Result};
use std::io::Read;

pub const MAGIC: [u8; 4] = *b"genc";

/// File name suffix appended to encrypted files
pub const EXTENSION: &str = "genc";

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const HEADER_LEN: usize = MAGIC.len() + SALT_LEN;
pub const CHUNK_HEADER_LEN: usize = NONCE_LEN + 4;

/// Plaintext block size (1 MiB)
pub const CHUNK_SIZE: usize = 1 << 20;

/// Capacity of the buffered reader/writer around files (64 KiB)
pub const IO_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub salt: [u8; SALT_LEN],
}

impl Header {
    pub fn new(salt: [u8; SALT_LEN]) -> Self {
        Self { salt }
    }

    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[..4].copy_from_slice(&MAGIC);
        buf[4..].copy_from_slice(&self.salt);
        buf
    }

    /// Decode a header, checking only length and magic; any salt is accepted.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_LEN {
            return Err(GencError::HeaderTooShort {
                need: HEADER_LEN,
                got: buf.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&buf[..4]);
        if magic != MAGIC {
            return Err(GencError::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&buf[4..HEADER_LEN]);
        Ok(Self { salt })
    }
}

/// Read exactly one header from the start of a container
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let mut buf = [0u8; HEADER_LEN];
    reader.read_exact(&mut buf).map_err(GencError::HeaderRead)?;
    Header::decode(&buf)
}

/// Frame preceding each ciphertext block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext length in bytes, tag included
    pub len: u32,
}

impl ChunkHeader {
    pub fn new(nonce: [u8; NONCE_LEN], len: u32) -> Self {
        Self { nonce, len }
    }

    pub fn encode(&self) -> [u8; CHUNK_HEADER_LEN] {
        let mut buf = [0u8; CHUNK_HEADER_LEN];
        buf[..NONCE_LEN].copy_from_slice(&self.nonce);
        buf[NONCE_LEN..].copy_from_slice(&self.len.to_be_bytes());
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < CHUNK_HEADER_LEN {
            return Err(GencError::BufferTooSmall {
                need: CHUNK_HEADER_LEN,
                got: buf.len(),
            });
        }

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&buf[..NONCE_LEN]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&buf[NONCE_LEN..CHUNK_HEADER_LEN]);

        Ok(Self {
            nonce,
            len: u32::from_be_bytes(len),
        })
    }
}
